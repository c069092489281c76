//! Sessions and the bearer tokens that name them.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use loam_api::{ApiError, Endpoint, UserName};
use loam_crypto::rng::Crng;

/// How long a freshly minted session lives.
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(20 * 60 * 60);

/// Clients refresh this long before the lifetime is actually up, so a
/// token never expires mid-flight.
pub const REFRESH_SAFETY_MARGIN: Duration = Duration::from_secs(60 * 60);

/// Bytes of entropy behind a token.
pub const TOKEN_ENTROPY_LEN: usize = 16;

/// Length of a token on the wire: uppercase hex of the entropy.
pub const TOKEN_TEXT_LEN: usize = 2 * TOKEN_ENTROPY_LEN;

/// An opaque bearer credential naming an established session. Exactly 32
/// hex characters; meaningful only to the server that minted it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Token(String);

impl Token {
    /// Mint a fresh token from 16 random bytes.
    pub fn mint(rng: &mut dyn Crng) -> Self {
        const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

        let mut entropy = [0u8; TOKEN_ENTROPY_LEN];
        rng.fill_bytes(&mut entropy);

        let mut text = String::with_capacity(TOKEN_TEXT_LEN);
        for byte in entropy {
            text.push(HEX_UPPER[usize::from(byte >> 4)] as char);
            text.push(HEX_UPPER[usize::from(byte & 0x0f)] as char);
        }
        Self(text)
    }

    /// Validate a token received on the wire. Anything shorter (or longer)
    /// than 32 hex characters is rejected before the session store is ever
    /// consulted.
    pub fn parse(text: &str) -> Result<Self, ApiError> {
        if text.len() != TOKEN_TEXT_LEN || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ApiError::invalid("invalid authentication token"));
        }
        Ok(Self(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An in-memory record binding a bearer token to a validated user identity
/// and an expiry time. Sessions are immutable once created and shared as
/// `Arc<Session>`.
#[derive(Clone, Debug)]
pub struct Session {
    user: UserName,
    expires: DateTime<Utc>,
    token: Token,
    proxied_endpoint: Option<Endpoint>,
    /// Set when the server was configured to admit a failed handshake; the
    /// business handler decides whether to serve such a caller.
    err: Option<ApiError>,
}

impl Session {
    pub fn new(
        user: UserName,
        expires: DateTime<Utc>,
        token: Token,
        proxied_endpoint: Option<Endpoint>,
        err: Option<ApiError>,
    ) -> Self {
        Self {
            user,
            expires,
            token,
            proxied_endpoint,
            err,
        }
    }

    pub fn user(&self) -> &UserName {
        &self.user
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// The endpoint this session proxies for, if it was established through
    /// a proxy handshake.
    pub fn proxied_endpoint(&self) -> Option<&Endpoint> {
        self.proxied_endpoint.as_ref()
    }

    /// The authentication failure this session carries, if any.
    pub fn err(&self) -> Option<&ApiError> {
        self.err.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.err.is_none()
    }
}
