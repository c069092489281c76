//! Service endpoints.
//!
//! An endpoint is written `transport,netaddr`, or just `transport` when the
//! transport admits no address: `remote,dir.example.com:443`, `inprocess`.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ApiError;

/// How to reach a service.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Transport {
    /// An authenticated TLS RPC connection to a remote host.
    Remote,
    /// A service linked into this process. Used by tests.
    InProcess,
    /// A hosted storage endpoint.
    Gcp,
    /// The zero value; no service.
    Unassigned,
}

impl Transport {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::InProcess => "inprocess",
            Self::Gcp => "gcp",
            Self::Unassigned => "unassigned",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "remote" => Some(Self::Remote),
            "inprocess" => Some(Self::InProcess),
            "gcp" => Some(Self::Gcp),
            "unassigned" => Some(Self::Unassigned),
            _ => None,
        }
    }

    /// Whether this transport requires a network address.
    pub fn requires_addr(self) -> bool {
        matches!(self, Self::Remote | Self::Gcp)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A transport tag plus a network address.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Endpoint {
    pub transport: Transport,
    /// The network address, possibly empty for `inprocess`/`unassigned`.
    pub addr: String,
}

impl Endpoint {
    pub fn new(transport: Transport, addr: impl Into<String>) -> Self {
        Self {
            transport,
            addr: addr.into(),
        }
    }

    pub fn unassigned() -> Self {
        Self {
            transport: Transport::Unassigned,
            addr: String::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, ApiError> {
        let (tag, addr) = match text.split_once(',') {
            Some((tag, addr)) => (tag, addr),
            None => (text, ""),
        };
        let transport = Transport::from_tag(tag)
            .ok_or_else(|| ApiError::invalid(format!("unknown transport in endpoint {text:?}")))?;
        if transport.requires_addr() && addr.is_empty() {
            return Err(ApiError::invalid(format!(
                "endpoint {text:?} requires a network address"
            )));
        }
        Ok(Self {
            transport,
            addr: addr.to_owned(),
        })
    }

    /// The address with any `http://`, `https://`, or `grpc://` prefix
    /// stripped, as used when dialing.
    pub fn dial_addr(&self) -> &str {
        strip_scheme(&self.addr)
    }
}

/// Strip an optional URL scheme prefix from a network address.
pub fn strip_scheme(addr: &str) -> &str {
    for scheme in ["https://", "http://", "grpc://"] {
        if let Some(stripped) = addr.strip_prefix(scheme) {
            return stripped;
        }
    }
    addr
}

impl FromStr for Endpoint {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.addr.is_empty() {
            f.write_str(self.transport.tag())
        } else {
            write!(f, "{},{}", self.transport, self.addr)
        }
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use proptest::{prop_assert_eq, proptest};

    use super::*;

    #[test]
    fn parse_display_round_trip_prop() {
        proptest!(|(host in "[a-z]{1,12}\\.[a-z]{2,6}", port in 1u16..)| {
            let text = format!("remote,{host}:{port}");
            let endpoint = Endpoint::parse(&text).unwrap();
            prop_assert_eq!(endpoint.to_string(), text);
            prop_assert_eq!(endpoint.transport, Transport::Remote);
        });
    }

    #[test]
    fn parse_display_round_trip() {
        for text in [
            "remote,dir.example.com:443",
            "gcp,store.example.com:443",
            "inprocess",
            "unassigned",
        ] {
            let ep = Endpoint::parse(text).unwrap();
            assert_eq!(ep.to_string(), text);
        }
    }

    #[test]
    fn remote_requires_addr() {
        assert!(Endpoint::parse("remote").is_err());
        assert!(Endpoint::parse("remote,").is_err());
        assert!(Endpoint::parse("gcp").is_err());
        assert!(Endpoint::parse("inprocess").is_ok());
    }

    #[test]
    fn unknown_transport_is_invalid() {
        let err = Endpoint::parse("carrier-pigeon,coop:1").unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Invalid);
    }

    #[test]
    fn scheme_prefixes_are_stripped_when_dialing() {
        let ep = Endpoint::parse("remote,https://cache.example.com:443").unwrap();
        assert_eq!(ep.addr, "https://cache.example.com:443");
        assert_eq!(ep.dial_addr(), "cache.example.com:443");

        assert_eq!(strip_scheme("http://x:80"), "x:80");
        assert_eq!(strip_scheme("grpc://x:443"), "x:443");
        assert_eq!(strip_scheme("x:443"), "x:443");
    }
}
