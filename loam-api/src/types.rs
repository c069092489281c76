//! Validated wire types.

/// Service endpoints: a transport tag plus a network address.
pub mod endpoint;
/// The fixed wire timestamp layout.
pub mod timestamp;
/// Validated `local@domain` user names.
pub mod user;
