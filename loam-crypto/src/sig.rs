//! ECDSA signatures and the authentication hash they cover.

use std::{fmt, str::FromStr};

use num_bigint::BigUint;

use crate::{
    sha256::{self, Hash},
    Error,
};

/// Domain separator for a client proving its identity to a server.
pub const CLIENT_AUTH_MAGIC: &[u8] = b" Authenticate ";

/// Domain separator for a server proving its identity back to a client
/// during the proxy handshake.
pub const SERVER_AUTH_MAGIC: &[u8] = b" AuthenticateServer ";

/// The hash signed during the authentication handshake:
/// `SHA-256(user || magic || timestamp)`.
///
/// The magic string separates the two signing directions; a signature
/// minted for one direction can never verify in the other, even over the
/// same user and timestamp.
pub fn auth_hash(user: &str, magic: &[u8], timestamp: &str) -> Hash {
    sha256::digest_many(&[user.as_bytes(), magic, timestamp.as_bytes()])
}

/// An ECDSA signature: the pair `(r, s)`, serialized as two decimal strings
/// separated by a single space.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature {
    pub r: BigUint,
    pub s: BigUint,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.r, self.s)
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let r_text = parts.next().ok_or(Error::BadSignature)?;
        let s_text = parts.next().ok_or(Error::BadSignature)?;
        if parts.next().is_some() {
            return Err(Error::BadSignature);
        }
        Ok(Self {
            r: parse_decimal(r_text)?,
            s: parse_decimal(s_text)?,
        })
    }
}

/// Parse one non-negative decimal big integer, as carried in the wire
/// 4-tuple positions 3 and 4.
pub fn parse_decimal(text: &str) -> Result<BigUint, Error> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::BadSignature);
    }
    BigUint::parse_bytes(text.as_bytes(), 10).ok_or(Error::BadSignature)
}

#[cfg(test)]
mod test {
    use proptest::{prop_assert, prop_assert_eq, proptest};

    use super::*;
    use crate::{key::Curve, rng::SysRng, Factotum};

    #[test]
    fn display_from_str_round_trip_prop() {
        proptest!(|(r in proptest::arbitrary::any::<u128>(), s in proptest::arbitrary::any::<u128>())| {
            let sig = Signature {
                r: BigUint::from(r),
                s: BigUint::from(s),
            };
            prop_assert_eq!(Signature::from_str(&sig.to_string()).unwrap(), sig);
        });
    }

    #[test]
    fn sign_verify_arbitrary_payloads() {
        let mut rng = SysRng::new();
        let factotum = Factotum::generate(Curve::P256, &mut rng);
        let config = proptest::test_runner::Config::with_cases(32);
        proptest!(config, |(user in "[a-z]{1,16}@[a-z]{1,16}\\.com", stamp in "[ -~]{0,40}")| {
            let hash = auth_hash(&user, CLIENT_AUTH_MAGIC, &stamp);
            let sig = factotum.sign(hash.as_slice()).unwrap();
            prop_assert!(factotum.public_key().verify(hash.as_slice(), &sig));

            // The other direction never accepts the same payload.
            let server_hash = auth_hash(&user, SERVER_AUTH_MAGIC, &stamp);
            prop_assert!(!factotum.public_key().verify(server_hash.as_slice(), &sig));
        });
    }

    #[test]
    fn display_from_str_round_trip() {
        let sig = Signature {
            r: BigUint::from(123456789u64),
            s: BigUint::from(987654321u64),
        };
        let text = sig.to_string();
        assert_eq!(text, "123456789 987654321");
        assert_eq!(Signature::from_str(&text).unwrap(), sig);
    }

    #[test]
    fn from_str_rejects_bad_shapes() {
        assert!(Signature::from_str("").is_err());
        assert!(Signature::from_str("123").is_err());
        assert!(Signature::from_str("123 456 789").is_err());
        assert!(Signature::from_str("12a 456").is_err());
        assert!(Signature::from_str("-12 456").is_err());
    }

    #[test]
    fn sign_verify_round_trip_all_curves() {
        let mut rng = SysRng::new();
        for curve in Curve::ALL {
            let factotum = Factotum::generate(curve, &mut rng);
            let hash = auth_hash("ann@example.com", CLIENT_AUTH_MAGIC, "Mon Jan  2 15:04:05 2006");
            let sig = factotum.sign(hash.as_slice()).unwrap();
            assert!(
                factotum.public_key().verify(hash.as_slice(), &sig),
                "round trip failed on {curve}"
            );
        }
    }

    #[test]
    fn magic_strings_separate_directions() {
        let mut rng = SysRng::new();
        let factotum = Factotum::generate(Curve::P256, &mut rng);
        let user = "ann@example.com";
        let timestamp = "Mon Jan  2 15:04:05 2006";

        let client_hash = auth_hash(user, CLIENT_AUTH_MAGIC, timestamp);
        let server_hash = auth_hash(user, SERVER_AUTH_MAGIC, timestamp);
        assert_ne!(client_hash, server_hash);

        let client_sig = factotum.sign(client_hash.as_slice()).unwrap();
        assert!(factotum.public_key().verify(client_hash.as_slice(), &client_sig));
        // A client-direction signature must not verify as a server proof,
        // and vice versa.
        assert!(!factotum.public_key().verify(server_hash.as_slice(), &client_sig));

        let server_sig = factotum.sign(server_hash.as_slice()).unwrap();
        assert!(factotum.public_key().verify(server_hash.as_slice(), &server_sig));
        assert!(!factotum.public_key().verify(client_hash.as_slice(), &server_sig));
    }

    #[test]
    fn signatures_are_hedged() {
        let mut rng = SysRng::new();
        let factotum = Factotum::generate(Curve::P256, &mut rng);
        let hash = auth_hash("bob@example.com", CLIENT_AUTH_MAGIC, "Mon Jan  2 15:04:05 2006");
        let sig1 = factotum.sign(hash.as_slice()).unwrap();
        let sig2 = factotum.sign(hash.as_slice()).unwrap();
        // Nonces are randomized, so two signatures over the same input must
        // differ while both verifying.
        assert_ne!(sig1, sig2);
        assert!(factotum.public_key().verify(hash.as_slice(), &sig1));
        assert!(factotum.public_key().verify(hash.as_slice(), &sig2));
    }

    #[test]
    fn verify_rejects_wrong_key_and_tampering() {
        let mut rng = SysRng::new();
        let signer = Factotum::generate(Curve::P384, &mut rng);
        let other = Factotum::generate(Curve::P384, &mut rng);
        let hash = auth_hash("carol@example.com", CLIENT_AUTH_MAGIC, "Mon Jan  2 15:04:05 2006");

        let sig = signer.sign(hash.as_slice()).unwrap();
        assert!(!other.public_key().verify(hash.as_slice(), &sig));

        let tampered = Signature {
            r: sig.r.clone() + 1u8,
            s: sig.s.clone(),
        };
        assert!(!signer.public_key().verify(hash.as_slice(), &tampered));
    }
}
