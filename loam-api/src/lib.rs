//! Shared API surface for loam services: validated wire types, the error
//! taxonomy every service speaks, the per-call credential metadata, and a
//! preconfigured REST client.

/// Wire error kinds, the `ApiError` type, and HTTP mappings.
pub mod error;
/// A reqwest client with loam-conformant defaults.
pub mod rest;
/// Validated wire types: user names, endpoints, timestamps.
pub mod types;
/// Per-call credential metadata carried in HTTP headers.
pub mod wire;

pub use error::{ApiError, ErrorKind, ErrorResponse};
pub use types::{endpoint::Endpoint, endpoint::Transport, user::UserName};
