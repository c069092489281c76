//! Concrete per-curve ECDSA operations.
//!
//! The three NIST curves come from three sibling crates with identical
//! module shapes, so the per-curve modules here are stamped out by a macro
//! and the public types dispatch on a curve tag. All functions work on
//! fixed-width big-endian byte strings whose length is the curve's field
//! size; callers are responsible for padding (see `key::decimal_to_field`).

use num_bigint::BigUint;

/// Pad a SHA-256 prehash on the left to the curve's field width. The padded
/// bytes represent the same big-endian integer, which is what the scalar
/// reduction inside sign/verify consumes. P-521 in particular refuses
/// prehashes shorter than half its field width, so this is not optional.
pub(crate) fn pad_prehash(hash: &[u8], field_size: usize) -> Vec<u8> {
    if hash.len() >= field_size {
        return hash.to_vec();
    }
    let mut padded = vec![0u8; field_size];
    padded[field_size - hash.len()..].copy_from_slice(hash);
    padded
}

macro_rules! curve_ops {
    ($name:ident, $curve:ident, $field_size:expr) => {
        pub(crate) mod $name {
            use ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
            use elliptic_curve::group::Curve as _;
            use elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
            use num_bigint::BigUint;
            use $curve::ecdsa::{Signature, SigningKey, VerifyingKey};
            use $curve::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint};

            use crate::rng::SysRng;

            pub(crate) const FIELD_SIZE: usize = $field_size;

            /// Decode an uncompressed point from fixed-width coordinates.
            /// Fails if the point is not on the curve.
            pub(crate) fn verifying_key(x: &[u8], y: &[u8]) -> Option<VerifyingKey> {
                let point = EncodedPoint::from_affine_coordinates(
                    FieldBytes::from_slice(x),
                    FieldBytes::from_slice(y),
                    false,
                );
                VerifyingKey::from_encoded_point(&point).ok()
            }

            pub(crate) fn coordinates(vk: &VerifyingKey) -> (BigUint, BigUint) {
                let point = vk.to_encoded_point(false);
                let x = point.x().expect("uncompressed point has an x coordinate");
                let y = point.y().expect("uncompressed point has a y coordinate");
                (BigUint::from_bytes_be(x), BigUint::from_bytes_be(y))
            }

            pub(crate) fn signing_key(d: &[u8]) -> Option<SigningKey> {
                SigningKey::from_bytes(FieldBytes::from_slice(d)).ok()
            }

            pub(crate) fn sign(
                sk: &SigningKey,
                rng: &mut SysRng,
                hash: &[u8],
            ) -> Option<(BigUint, BigUint)> {
                let prehash = super::pad_prehash(hash, FIELD_SIZE);
                let sig: Signature = sk.sign_prehash_with_rng(rng, &prehash).ok()?;
                let (r, s) = sig.split_bytes();
                Some((BigUint::from_bytes_be(&r), BigUint::from_bytes_be(&s)))
            }

            pub(crate) fn verify(vk: &VerifyingKey, hash: &[u8], r: &[u8], s: &[u8]) -> bool {
                let sig = match Signature::from_scalars(
                    FieldBytes::clone_from_slice(r),
                    FieldBytes::clone_from_slice(s),
                ) {
                    Ok(sig) => sig,
                    Err(_) => return false,
                };
                let prehash = super::pad_prehash(hash, FIELD_SIZE);
                vk.verify_prehash(&prehash, &sig).is_ok()
            }

            /// Multiply the given point by the signing key's scalar. Returns
            /// `None` if the operand is not on the curve or the product is
            /// the identity.
            pub(crate) fn scalar_mult(
                sk: &SigningKey,
                x: &[u8],
                y: &[u8],
            ) -> Option<(BigUint, BigUint)> {
                let point = EncodedPoint::from_affine_coordinates(
                    FieldBytes::from_slice(x),
                    FieldBytes::from_slice(y),
                    false,
                );
                let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&point))?;
                let scalar = **sk.as_nonzero_scalar();
                let product = (ProjectivePoint::from(affine) * scalar).to_affine();
                let encoded = product.to_encoded_point(false);
                match (encoded.x(), encoded.y()) {
                    (Some(px), Some(py)) => {
                        Some((BigUint::from_bytes_be(px), BigUint::from_bytes_be(py)))
                    }
                    _ => None,
                }
            }
        }
    };
}

curve_ops!(ops_p256, p256, 32);
curve_ops!(ops_p384, p384, 48);
curve_ops!(ops_p521, p521, 66);

/// Convert a non-negative decimal string into a fixed-width big-endian byte
/// string of the given field size. Fails on non-decimal input or values too
/// wide for the field.
pub(crate) fn decimal_to_field(text: &str, field_size: usize) -> Option<Vec<u8>> {
    let text = text.trim();
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = BigUint::parse_bytes(text.as_bytes(), 10)?;
    let bytes = value.to_bytes_be();
    if bytes.len() > field_size {
        return None;
    }
    let mut out = vec![0u8; field_size];
    out[field_size - bytes.len()..].copy_from_slice(&bytes);
    Some(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decimal_to_field_pads_left() {
        let bytes = decimal_to_field("255", 4).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 255]);
    }

    #[test]
    fn decimal_to_field_rejects_junk() {
        assert!(decimal_to_field("", 32).is_none());
        assert!(decimal_to_field("-5", 32).is_none());
        assert!(decimal_to_field("12x3", 32).is_none());
        // 2^256 does not fit in 32 bytes.
        let too_wide = BigUint::from(1u8) << 256u32;
        assert!(decimal_to_field(&too_wide.to_string(), 32).is_none());
    }

    #[test]
    fn pad_prehash_preserves_value() {
        let hash = [0xABu8; 32];
        let padded = pad_prehash(&hash, 66);
        assert_eq!(padded.len(), 66);
        assert_eq!(&padded[..34], &[0u8; 34][..]);
        assert_eq!(&padded[34..], &hash[..]);
        assert_eq!(
            BigUint::from_bytes_be(&padded),
            BigUint::from_bytes_be(&hash)
        );
    }
}
