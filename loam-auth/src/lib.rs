//! The loam authentication core.
//!
//! Before any loam RPC is served, client and server agree on an
//! authenticated identity bound to a key pair. The client proves control
//! of a named user's key by signing a timestamped request ([`client`]);
//! the server validates the proof, mints a short-lived bearer token, and
//! records the resulting [`Session`] ([`server`], [`store`]); subsequent
//! calls present the token alone. A caching proxy is authenticated in both
//! directions by layering a server-to-client signature onto the same
//! handshake.

/// The client auth driver: token lifecycle, keep-alive, proxy verify.
pub mod client;
/// The seam to the external key-discovery service.
pub mod keyserver;
/// The server auth handler and its axum integration.
pub mod server;
/// Sessions and bearer tokens.
pub mod session;
/// The process-wide session store.
pub mod store;

pub use client::{AuthClient, Connection};
pub use keyserver::{KeyLookup, StaticKeys};
pub use server::{AuthHandler, Config};
pub use session::{Session, Token};
pub use store::SessionStore;
