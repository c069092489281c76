//! The process-local signer.
//!
//! A [`Factotum`] is the only component permitted to hold a private key. It
//! is constructed once from the key-pair text files, validated eagerly, and
//! then shared immutably; signing needs no locking.

use std::fmt;

use num_bigint::BigUint;

use crate::{
    curve_ops::{decimal_to_field, ops_p256, ops_p384, ops_p521},
    key::{biguint_to_field, Curve, PublicKey, VerifierKind},
    rng::SysRng,
    sha256::Hash,
    sig::Signature,
    Error,
};

enum SignerKind {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
    P521(p521::ecdsa::SigningKey),
}

/// Holds one private key and signs on behalf of its owner. The private
/// scalar never leaves this type: there is no accessor for it and the
/// [`fmt::Debug`] impl redacts it.
pub struct Factotum {
    public: PublicKey,
    signer: SignerKind,
}

impl Factotum {
    /// Construct from the public-key text blob and the private key (a single
    /// decimal scalar). Fails unless the scalar is in range for the named
    /// curve and `d·G` equals the claimed public point.
    pub fn new(public_text: &str, private_text: &str) -> Result<Self, Error> {
        let public = PublicKey::parse(public_text)?;
        let size = public.curve().field_size();
        let d = decimal_to_field(private_text, size).ok_or(Error::BadScalar)?;

        let signer = match public.curve() {
            Curve::P256 => ops_p256::signing_key(&d).map(SignerKind::P256),
            Curve::P384 => ops_p384::signing_key(&d).map(SignerKind::P384),
            Curve::P521 => ops_p521::signing_key(&d).map(SignerKind::P521),
        }
        .ok_or(Error::BadScalar)?;

        if derived_verifier(&signer) != public.kind {
            return Err(Error::MismatchedKeyPair);
        }
        Ok(Self { public, signer })
    }

    /// Sample a fresh key pair on the given curve. Used when provisioning a
    /// new identity, and liberally in tests.
    pub fn generate(curve: Curve, rng: &mut SysRng) -> Self {
        let signer = match curve {
            Curve::P256 => SignerKind::P256(p256::ecdsa::SigningKey::random(rng)),
            Curve::P384 => SignerKind::P384(p384::ecdsa::SigningKey::random(rng)),
            Curve::P521 => SignerKind::P521(p521::ecdsa::SigningKey::random(rng)),
        };
        let public = PublicKey {
            curve,
            kind: derived_verifier(&signer),
        };
        Self { public, signer }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The canonical public-key text blob.
    pub fn public_key_text(&self) -> String {
        self.public.to_text()
    }

    /// SHA-256 fingerprint of the public-key text. Safe to log.
    pub fn public_key_hash(&self) -> Hash {
        self.public.fingerprint()
    }

    /// Sign an opaque hash. The nonce is hedged with the system CSPRNG, so
    /// repeated calls over the same hash yield distinct signatures.
    pub fn sign(&self, hash: &[u8]) -> Result<Signature, Error> {
        let mut rng = SysRng::new();
        let (r, s) = match &self.signer {
            SignerKind::P256(sk) => ops_p256::sign(sk, &mut rng, hash),
            SignerKind::P384(sk) => ops_p384::sign(sk, &mut rng, hash),
            SignerKind::P521(sk) => ops_p521::sign(sk, &mut rng, hash),
        }
        .ok_or(Error::SigningFailed)?;
        Ok(Signature { r, s })
    }

    /// Multiply the point `(x, y)` by this factotum's private scalar.
    /// Consumed by packing code outside the authentication path; it lives
    /// here so the scalar stays contained.
    pub fn scalar_mult(&self, x: &BigUint, y: &BigUint) -> Result<(BigUint, BigUint), Error> {
        let size = self.public.curve().field_size();
        let x = biguint_to_field(x, size).ok_or(Error::BadPoint)?;
        let y = biguint_to_field(y, size).ok_or(Error::BadPoint)?;
        match &self.signer {
            SignerKind::P256(sk) => ops_p256::scalar_mult(sk, &x, &y),
            SignerKind::P384(sk) => ops_p384::scalar_mult(sk, &x, &y),
            SignerKind::P521(sk) => ops_p521::scalar_mult(sk, &x, &y),
        }
        .ok_or(Error::BadPoint)
    }
}

fn derived_verifier(signer: &SignerKind) -> VerifierKind {
    match signer {
        SignerKind::P256(sk) => VerifierKind::P256(*sk.verifying_key()),
        SignerKind::P384(sk) => VerifierKind::P384(*sk.verifying_key()),
        SignerKind::P521(sk) => VerifierKind::P521(p521::ecdsa::VerifyingKey::from(sk)),
    }
}

impl fmt::Debug for Factotum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factotum")
            .field("public", &self.public)
            .field("secret", &"..")
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sig::{auth_hash, CLIENT_AUTH_MAGIC};

    /// Extract the decimal scalar from a signing key so tests can exercise
    /// the text constructor without fixture files.
    fn scalar_text(factotum: &Factotum) -> String {
        match &factotum.signer {
            SignerKind::P256(sk) => BigUint::from_bytes_be(&sk.to_bytes()).to_string(),
            SignerKind::P384(sk) => BigUint::from_bytes_be(&sk.to_bytes()).to_string(),
            SignerKind::P521(sk) => BigUint::from_bytes_be(&sk.to_bytes()).to_string(),
        }
    }

    #[test]
    fn new_validates_and_round_trips() {
        let mut rng = SysRng::new();
        for curve in Curve::ALL {
            let generated = Factotum::generate(curve, &mut rng);
            let public_text = generated.public_key_text();
            let private_text = scalar_text(&generated);

            let loaded = Factotum::new(&public_text, &private_text).unwrap();
            assert_eq!(loaded.public_key(), generated.public_key());

            let hash = auth_hash("ann@example.com", CLIENT_AUTH_MAGIC, "Mon Jan  2 15:04:05 2006");
            let sig = loaded.sign(hash.as_slice()).unwrap();
            assert!(generated.public_key().verify(hash.as_slice(), &sig));
        }
    }

    #[test]
    fn new_rejects_mismatched_pair() {
        let mut rng = SysRng::new();
        let one = Factotum::generate(Curve::P256, &mut rng);
        let two = Factotum::generate(Curve::P256, &mut rng);

        let err = Factotum::new(&one.public_key_text(), &scalar_text(&two)).unwrap_err();
        assert!(matches!(err, Error::MismatchedKeyPair));
    }

    #[test]
    fn new_rejects_out_of_range_scalars() {
        let mut rng = SysRng::new();
        let factotum = Factotum::generate(Curve::P256, &mut rng);
        let public_text = factotum.public_key_text();

        assert!(matches!(
            Factotum::new(&public_text, "0").unwrap_err(),
            Error::BadScalar
        ));
        assert!(matches!(
            Factotum::new(&public_text, "not-a-scalar").unwrap_err(),
            Error::BadScalar
        ));
    }

    #[test]
    fn scalar_mult_matches_public_key_on_generator_base() {
        // d·(e·G) == e·(d·G): multiplying the other party's public point by
        // our scalar commutes, which is the property packing relies on.
        let mut rng = SysRng::new();
        let ours = Factotum::generate(Curve::P256, &mut rng);
        let theirs = Factotum::generate(Curve::P256, &mut rng);

        let (tx, ty) = theirs.public_key().coordinates();
        let shared_ab = ours.scalar_mult(&tx, &ty).unwrap();

        let (ox, oy) = ours.public_key().coordinates();
        let shared_ba = theirs.scalar_mult(&ox, &oy).unwrap();

        assert_eq!(shared_ab, shared_ba);
    }

    #[test]
    fn scalar_mult_rejects_off_curve_operand() {
        let mut rng = SysRng::new();
        let factotum = Factotum::generate(Curve::P256, &mut rng);
        let (x, y) = factotum.public_key().coordinates();
        let err = factotum.scalar_mult(&x, &(y + 1u8)).unwrap_err();
        assert!(matches!(err, Error::BadPoint));
    }

    #[test]
    fn debug_redacts_secret() {
        let mut rng = SysRng::new();
        let factotum = Factotum::generate(Curve::P256, &mut rng);
        let debug = format!("{factotum:?}");
        assert!(debug.contains("secret"));
        assert!(!debug.contains(&scalar_text(&factotum)));
    }
}
