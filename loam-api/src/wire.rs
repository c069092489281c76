//! Per-call credential metadata.
//!
//! Credentials ride in HTTP headers on both requests and responses:
//!
//! - `upspinauthtoken`: exactly one value, the session token.
//! - `upspinauthrequest`: exactly four values: user name, timestamp,
//!   and the two decimal signature halves.
//! - `upspinproxyrequest`: exactly one value, the endpoint the caller asks
//!   the server to proxy for.
//!
//! Any other count of values for a recognized key is a malformed request.
//! Requests carry at most one of token / auth-request; responses carry the
//! token on first establishment and, during a proxy handshake, a
//! server-to-client auth-request.

use http::{header::HeaderName, HeaderMap, HeaderValue};
use loam_crypto::{sig, Signature};

use crate::{error::ApiError, types::endpoint::Endpoint, types::user::UserName};

pub const AUTH_TOKEN_HEADER: HeaderName = HeaderName::from_static("upspinauthtoken");
pub const AUTH_REQUEST_HEADER: HeaderName = HeaderName::from_static("upspinauthrequest");
pub const PROXY_REQUEST_HEADER: HeaderName = HeaderName::from_static("upspinproxyrequest");

/// The signed 4-tuple proving possession of a user's private key. The
/// `timestamp` is kept as the exact string that was signed; reformatting it
/// would break verification.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuthRequest {
    pub user: UserName,
    pub timestamp: String,
    pub sig: Signature,
}

impl AuthRequest {
    /// Append the four `upspinauthrequest` values to `headers`, in wire
    /// order.
    pub fn append_to(&self, headers: &mut HeaderMap) -> Result<(), ApiError> {
        let values = [
            self.user.as_str().to_owned(),
            self.timestamp.clone(),
            self.sig.r.to_string(),
            self.sig.s.to_string(),
        ];
        for value in values {
            headers.append(AUTH_REQUEST_HEADER, header_value(&value)?);
        }
        Ok(())
    }

    /// Read an auth request out of `headers`. Returns `Ok(None)` when the
    /// key is absent entirely; any present-but-misshapen form is `Invalid`.
    pub fn from_header_map(headers: &HeaderMap) -> Result<Option<Self>, ApiError> {
        let values = collect_values(headers, &AUTH_REQUEST_HEADER)?;
        if values.is_empty() {
            return Ok(None);
        }
        let [user, timestamp, r, s]: [String; 4] = values
            .try_into()
            .map_err(|_| ApiError::invalid("auth request must carry exactly four values"))?;

        let user = UserName::parse(&user)?;
        let sig = Signature {
            r: sig::parse_decimal(&r)?,
            s: sig::parse_decimal(&s)?,
        };
        Ok(Some(Self {
            user,
            timestamp,
            sig,
        }))
    }
}

/// Attach a session token to outgoing metadata.
pub fn append_auth_token(headers: &mut HeaderMap, token: &str) -> Result<(), ApiError> {
    headers.insert(AUTH_TOKEN_HEADER, header_value(token)?);
    Ok(())
}

/// Read the session token, if any. Exactly one value is allowed.
pub fn auth_token(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    single_value(headers, &AUTH_TOKEN_HEADER)
}

/// Attach a proxy request naming the endpoint the server should act for.
pub fn append_proxy_request(headers: &mut HeaderMap, endpoint: &Endpoint) -> Result<(), ApiError> {
    headers.insert(PROXY_REQUEST_HEADER, header_value(&endpoint.to_string())?);
    Ok(())
}

/// Read and parse the proxy request, if any. Exactly one value is allowed,
/// and it must be a well-formed endpoint.
pub fn proxy_request(headers: &HeaderMap) -> Result<Option<Endpoint>, ApiError> {
    match single_value(headers, &PROXY_REQUEST_HEADER)? {
        Some(raw) => Endpoint::parse(&raw).map(Some),
        None => Ok(None),
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_bytes(value.as_bytes())
        .map_err(|_| ApiError::invalid(format!("value {value:?} cannot be sent as metadata")))
}

fn collect_values(headers: &HeaderMap, name: &HeaderName) -> Result<Vec<String>, ApiError> {
    headers
        .get_all(name)
        .iter()
        .map(|value| {
            std::str::from_utf8(value.as_bytes())
                .map(str::to_owned)
                .map_err(|_| ApiError::invalid(format!("metadata {name} is not valid UTF-8")))
        })
        .collect()
}

fn single_value(headers: &HeaderMap, name: &HeaderName) -> Result<Option<String>, ApiError> {
    let mut values = collect_values(headers, name)?;
    match values.len() {
        0 => Ok(None),
        1 => Ok(Some(values.remove(0))),
        n => Err(ApiError::invalid(format!(
            "metadata {name} must carry exactly one value, got {n}"
        ))),
    }
}
