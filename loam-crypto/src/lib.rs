//! Key material and signatures for the loam authentication protocol.
//!
//! Identities in loam are bound to an ECDSA key pair on one of three NIST
//! curves (P-256, P-384, P-521). Public keys and signatures travel as
//! decimal text; see [`key`] and [`sig`] for the exact encodings. The only
//! component allowed to touch a private scalar is the [`Factotum`].

use thiserror::Error;

mod curve_ops;
/// The process-local signer. Holds exactly one private key.
pub mod factotum;
/// Curve-tagged public keys and their text encoding.
pub mod key;
/// Randomness traits and the system CSPRNG.
pub mod rng;
/// SHA-256 digests.
pub mod sha256;
/// Signatures, and the authentication hash they cover.
pub mod sig;

pub use factotum::Factotum;
pub use key::{Curve, PublicKey};
pub use sig::Signature;

/// Errors raised while loading key material or constructing signatures.
/// All of these are structural: they are detected at load or call time,
/// never during routine verification (which answers with a plain `bool`).
#[derive(Debug, Error)]
pub enum Error {
    #[error("unrecognized curve tag")]
    UnknownCurve,

    #[error("malformed key encoding")]
    BadEncoding,

    #[error("point is not on the named curve")]
    NotOnCurve,

    #[error("private scalar is out of range for the curve")]
    BadScalar,

    #[error("public key does not match the private scalar")]
    MismatchedKeyPair,

    #[error("malformed signature encoding")]
    BadSignature,

    #[error("signing failed")]
    SigningFailed,

    #[error("invalid point operand")]
    BadPoint,
}
