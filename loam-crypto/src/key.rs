//! Public keys and their text encoding.
//!
//! A public key travels as a three-line text blob: a curve tag followed by
//! the two affine coordinates in decimal.
//!
//! ```text
//! p256
//! 1042708591565...
//! 2694154783308...
//! ```
//!
//! The trailing newline is optional. Parsing rejects unknown tags,
//! non-decimal coordinates, and points not on the named curve.

use std::{fmt, str::FromStr};

use num_bigint::BigUint;

use crate::{
    curve_ops::{decimal_to_field, ops_p256, ops_p384, ops_p521},
    sha256::{self, Hash},
    sig::Signature,
    Error,
};

/// The NIST curve a key lives on, named by its wire tag.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Curve {
    P256,
    P384,
    P521,
}

impl Curve {
    pub const ALL: [Curve; 3] = [Curve::P256, Curve::P384, Curve::P521];

    pub fn tag(self) -> &'static str {
        match self {
            Curve::P256 => "p256",
            Curve::P384 => "p384",
            Curve::P521 => "p521",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "p256" => Some(Curve::P256),
            "p384" => Some(Curve::P384),
            "p521" => Some(Curve::P521),
            _ => None,
        }
    }

    /// The byte width of a field element (and of each half of a signature).
    pub fn field_size(self) -> usize {
        match self {
            Curve::P256 => ops_p256::FIELD_SIZE,
            Curve::P384 => ops_p384::FIELD_SIZE,
            Curve::P521 => ops_p521::FIELD_SIZE,
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Clone)]
pub(crate) enum VerifierKind {
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
}

impl Eq for VerifierKind {}

impl PartialEq for VerifierKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::P256(a), Self::P256(b)) => a == b,
            (Self::P384(a), Self::P384(b)) => a == b,
            (Self::P521(a), Self::P521(b)) => a.as_affine() == b.as_affine(),
            _ => false,
        }
    }
}

/// A parsed, on-curve public key.
#[derive(Clone, Eq, PartialEq)]
pub struct PublicKey {
    pub(crate) curve: Curve,
    pub(crate) kind: VerifierKind,
}

impl PublicKey {
    /// Parse the three-line text encoding described in the module docs.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut lines = text.lines();
        let tag = lines.next().ok_or(Error::BadEncoding)?.trim();
        let x_line = lines.next().ok_or(Error::BadEncoding)?;
        let y_line = lines.next().ok_or(Error::BadEncoding)?;
        if lines.any(|rest| !rest.trim().is_empty()) {
            return Err(Error::BadEncoding);
        }

        let curve = Curve::from_tag(tag).ok_or(Error::UnknownCurve)?;
        let size = curve.field_size();
        let x = decimal_to_field(x_line, size).ok_or(Error::BadEncoding)?;
        let y = decimal_to_field(y_line, size).ok_or(Error::BadEncoding)?;

        let kind = match curve {
            Curve::P256 => ops_p256::verifying_key(&x, &y).map(VerifierKind::P256),
            Curve::P384 => ops_p384::verifying_key(&x, &y).map(VerifierKind::P384),
            Curve::P521 => ops_p521::verifying_key(&x, &y).map(VerifierKind::P521),
        }
        .ok_or(Error::NotOnCurve)?;

        Ok(Self { curve, kind })
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// The affine coordinates of the key.
    pub fn coordinates(&self) -> (BigUint, BigUint) {
        match &self.kind {
            VerifierKind::P256(vk) => ops_p256::coordinates(vk),
            VerifierKind::P384(vk) => ops_p384::coordinates(vk),
            VerifierKind::P521(vk) => ops_p521::coordinates(vk),
        }
    }

    /// Re-serialize to the canonical text encoding, trailing newline
    /// included.
    pub fn to_text(&self) -> String {
        let (x, y) = self.coordinates();
        format!("{}\n{}\n{}\n", self.curve.tag(), x, y)
    }

    /// SHA-256 fingerprint of the canonical text encoding. Safe to log.
    pub fn fingerprint(&self) -> Hash {
        sha256::digest(self.to_text().as_bytes())
    }

    /// Check `sig` over `hash`. Any structural problem with the signature
    /// (out-of-range scalars included) reads as a plain mismatch.
    pub fn verify(&self, hash: &[u8], sig: &Signature) -> bool {
        let size = self.curve.field_size();
        let r = match biguint_to_field(&sig.r, size) {
            Some(r) => r,
            None => return false,
        };
        let s = match biguint_to_field(&sig.s, size) {
            Some(s) => s,
            None => return false,
        };
        match &self.kind {
            VerifierKind::P256(vk) => ops_p256::verify(vk, hash, &r, &s),
            VerifierKind::P384(vk) => ops_p384::verify(vk, hash, &r, &s),
            VerifierKind::P521(vk) => ops_p521::verify(vk, hash, &r, &s),
        }
    }
}

/// Fixed-width big-endian encoding of a signature half.
pub(crate) fn biguint_to_field(value: &BigUint, field_size: usize) -> Option<Vec<u8>> {
    let bytes = value.to_bytes_be();
    if bytes.len() > field_size {
        return None;
    }
    let mut out = vec![0u8; field_size];
    out[field_size - bytes.len()..].copy_from_slice(&bytes);
    Some(out)
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("curve", &self.curve)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{rng::SysRng, Factotum};

    #[test]
    fn parse_round_trips_all_curves() {
        let mut rng = SysRng::new();
        for curve in Curve::ALL {
            let factotum = Factotum::generate(curve, &mut rng);
            let text = factotum.public_key().to_text();
            let parsed = PublicKey::parse(&text).unwrap();
            assert_eq!(&parsed, factotum.public_key());
            assert_eq!(parsed.to_text(), text);
            assert_eq!(parsed.curve(), curve);
        }
    }

    #[test]
    fn parse_accepts_missing_trailing_newline() {
        let mut rng = SysRng::new();
        let factotum = Factotum::generate(Curve::P256, &mut rng);
        let text = factotum.public_key().to_text();
        let trimmed = text.trim_end();
        assert!(PublicKey::parse(trimmed).is_ok());
    }

    #[test]
    fn parse_rejects_unknown_curve_tag() {
        let err = PublicKey::parse("p224\n1\n2\n").unwrap_err();
        assert!(matches!(err, Error::UnknownCurve));
    }

    #[test]
    fn parse_rejects_bad_shapes() {
        assert!(PublicKey::parse("").is_err());
        assert!(PublicKey::parse("p256\n123\n").is_err());
        assert!(PublicKey::parse("p256\n123\nnot-a-number\n").is_err());
        assert!(PublicKey::parse("p256\n123\n456\nextra\n").is_err());
        assert!(PublicKey::parse("p256\n-123\n456\n").is_err());
    }

    #[test]
    fn parse_rejects_off_curve_point() {
        let mut rng = SysRng::new();
        let factotum = Factotum::generate(Curve::P256, &mut rng);
        let (x, y) = factotum.public_key().coordinates();
        // Nudging one coordinate falls off the curve (except with negligible
        // probability).
        let off = format!("p256\n{}\n{}\n", x, y + 1u8);
        let err = PublicKey::parse(&off).unwrap_err();
        assert!(matches!(err, Error::NotOnCurve));
    }
}
