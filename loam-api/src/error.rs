//! Serializable api error types and error kinds returned by loam services.

use std::fmt;

use axum::{response::IntoResponse, response::Response, Json};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// `ErrorCode` is the serialized representation of an [`ErrorKind`].
pub type ErrorCode = u16;

/// The error kinds every loam service speaks. The kind tells a client
/// whether retrying can help and nothing more; any detail lives in the
/// human-readable message.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Malformed metadata, user name, signature encoding, timestamp, or
    /// endpoint. Retrying without modification will not help.
    Invalid,
    /// Authentication failed. Deliberately covers "no session", "expired
    /// session", "bad signature", and "unknown user" alike, so a caller
    /// cannot probe which one it was.
    Permission,
    /// A key pair or public key failed structural or on-curve validation.
    /// Raised when key material is loaded, not per call.
    InvalidKey,
    /// A lookup found no record. Internal between services; never shown to
    /// an authenticating client (it surfaces as `Permission`).
    NotExist,
    /// Underlying transport failure. The caller may retry.
    Transient,
    /// An invariant was broken. Always a bug.
    Internal,
    /// An error code this version of the software doesn't recognize.
    Unknown(ErrorCode),
}

impl ErrorKind {
    /// All known kinds, excluding `Unknown(_)`.
    pub const KINDS: &'static [Self] = &[
        Self::Invalid,
        Self::Permission,
        Self::InvalidKey,
        Self::NotExist,
        Self::Transient,
        Self::Internal,
    ];

    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    pub fn to_code(self) -> ErrorCode {
        match self {
            Self::Invalid => 1,
            Self::Permission => 2,
            Self::InvalidKey => 3,
            Self::NotExist => 4,
            Self::Transient => 5,
            Self::Internal => 6,
            Self::Unknown(code) => code,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        match code {
            1 => Self::Invalid,
            2 => Self::Permission,
            3 => Self::InvalidKey,
            4 => Self::NotExist,
            5 => Self::Transient,
            6 => Self::Internal,
            other => Self::Unknown(other),
        }
    }

    pub fn to_msg(self) -> &'static str {
        match self {
            Self::Invalid => "invalid request",
            Self::Permission => "permission denied",
            Self::InvalidKey => "invalid key",
            Self::NotExist => "does not exist",
            Self::Transient => "transient transport error",
            Self::Internal => "internal error",
            Self::Unknown(_) => "unknown error",
        }
    }

    pub fn to_http_status(self) -> StatusCode {
        match self {
            Self::Invalid | Self::InvalidKey => StatusCode::BAD_REQUEST,
            Self::Permission => StatusCode::UNAUTHORIZED,
            Self::NotExist => StatusCode::NOT_FOUND,
            Self::Transient => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal | Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Default for ErrorKind {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_msg())
    }
}

/// The one error type loam RPCs produce and consume.
#[derive(Clone, Debug, Default, Eq, PartialEq, Error)]
#[error("{kind}: {msg}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid, msg)
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, msg)
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidKey, msg)
    }

    pub fn not_exist(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotExist, msg)
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    /// Collapse any authentication failure into the uniform `Permission`
    /// answer shown to clients, keeping the original detail out of the
    /// response. The server logs the real cause before calling this.
    pub fn to_permission(&self) -> Self {
        match self.kind {
            ErrorKind::Permission => self.clone(),
            _ => Self::permission("unable to authenticate"),
        }
    }
}

/// `ErrorResponse` is the JSON body carried on every non-2xx response. It
/// is the only error struct actually sent across the wire; everything else
/// converts to and from it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub msg: String,
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        Self {
            code: err.kind.to_code(),
            msg: err.msg,
        }
    }
}

impl From<ErrorResponse> for ApiError {
    fn from(resp: ErrorResponse) -> Self {
        Self {
            kind: ErrorKind::from_code(resp.code),
            msg: resp.msg,
        }
    }
}

impl From<loam_crypto::Error> for ApiError {
    fn from(err: loam_crypto::Error) -> Self {
        use loam_crypto::Error as E;
        match err {
            E::UnknownCurve | E::BadEncoding | E::NotOnCurve | E::BadScalar
            | E::MismatchedKeyPair => Self::invalid_key(err.to_string()),
            E::BadSignature => Self::invalid(format!("missing or invalid signature: {err}")),
            E::SigningFailed | E::BadPoint => Self::internal(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::internal(format!("malformed response body: {err}"))
        } else {
            Self::transient(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.to_http_status();
        if status.is_server_error() {
            error!("{self}");
        } else {
            warn!("{self}");
        }
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn code_round_trip() {
        for kind in ErrorKind::KINDS {
            assert_eq!(ErrorKind::from_code(kind.to_code()), *kind);
            assert!(!kind.is_unknown());
        }
        assert_eq!(ErrorKind::from_code(999), ErrorKind::Unknown(999));
        assert!(ErrorKind::Unknown(999).is_unknown());
    }

    #[test]
    fn response_round_trip() {
        let err = ApiError::permission("expired session");
        let resp = ErrorResponse::from(err.clone());
        let json = serde_json::to_string(&resp).unwrap();
        let back: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(ApiError::from(back), err);
    }

    #[test]
    fn permission_collapse_hides_cause() {
        let inner = ApiError::not_exist("no key for nobody@example.com");
        let outer = inner.to_permission();
        assert_eq!(outer.kind, ErrorKind::Permission);
        assert!(!outer.msg.contains("nobody@example.com"));

        // Already-permission errors keep their message.
        let expired = ApiError::permission("expired session");
        assert_eq!(expired.to_permission(), expired);
    }

    #[test]
    fn http_statuses() {
        assert_eq!(
            ErrorKind::Permission.to_http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ErrorKind::Invalid.to_http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorKind::Transient.to_http_status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
