//! Validated user names.
//!
//! A user name has the form `local@domain`. The domain must contain a dot
//! and is lower-cased on parse; the local part may carry a `+suffix`. The
//! lone `*` wildcard appears in access lists but is never a legal
//! authenticating identity, so it does not parse here.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ApiError;

/// Longest allowed user name, in bytes.
const MAX_NAME_LEN: usize = 254;
/// Longest allowed domain label, in bytes.
const MAX_LABEL_LEN: usize = 63;

/// A validated `local@domain` user name.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct UserName(String);

impl UserName {
    pub fn parse(name: &str) -> Result<Self, ApiError> {
        if name == "*" {
            return Err(ApiError::invalid(
                "the access wildcard is not an authenticating identity",
            ));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(ApiError::invalid("user name too long"));
        }

        let mut parts = name.splitn(2, '@');
        let local = parts.next().unwrap_or("");
        let domain = parts.next().ok_or_else(|| {
            ApiError::invalid(format!("user name {name:?} must contain '@'"))
        })?;

        if local.is_empty() {
            return Err(ApiError::invalid("user name has an empty local part"));
        }
        if local.contains('@') || local.chars().any(char::is_whitespace) {
            return Err(ApiError::invalid("malformed local part in user name"));
        }

        let domain = validate_domain(domain)?;
        Ok(Self(format!("{local}@{domain}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (&str, &str) {
        self.0
            .split_once('@')
            .expect("validated user name always contains '@'")
    }

    /// The local part, `+suffix` included.
    pub fn local(&self) -> &str {
        self.split().0
    }

    /// The `+suffix` of the local part, if any.
    pub fn suffix(&self) -> Option<&str> {
        self.local().split_once('+').map(|(_, suffix)| suffix)
    }

    pub fn domain(&self) -> &str {
        self.split().1
    }
}

fn validate_domain(domain: &str) -> Result<String, ApiError> {
    if domain.is_empty() {
        return Err(ApiError::invalid("user name has an empty domain"));
    }
    if !domain.contains('.') {
        return Err(ApiError::invalid("user domain must contain a dot"));
    }
    for label in domain.split('.') {
        if label.is_empty() {
            return Err(ApiError::invalid("user domain has an empty label"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(ApiError::invalid("user domain label too long"));
        }
        let valid = label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(ApiError::invalid("user domain has invalid characters"));
        }
    }
    Ok(domain.to_ascii_lowercase())
}

impl FromStr for UserName {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for UserName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserName {
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
    fn well_formed_names_round_trip() {
        proptest!(|(
            local in "[a-z0-9]{1,12}(\\+[a-z0-9]{1,8})?",
            domain in "[a-z0-9]{1,12}\\.[a-z]{2,6}",
        )| {
            let text = format!("{local}@{domain}");
            let user = UserName::parse(&text).unwrap();
            prop_assert_eq!(user.as_str(), text.as_str());
            prop_assert_eq!(user.local(), local.as_str());
            prop_assert_eq!(user.domain(), domain.as_str());
        });
    }

    #[test]
    fn parses_and_lowercases_domain() {
        let user = UserName::parse("Ann@Example.COM").unwrap();
        assert_eq!(user.as_str(), "Ann@example.com");
        assert_eq!(user.local(), "Ann");
        assert_eq!(user.domain(), "example.com");
        assert_eq!(user.suffix(), None);
    }

    #[test]
    fn parses_suffixed_local_part() {
        let user = UserName::parse("ann+photos@example.com").unwrap();
        assert_eq!(user.local(), "ann+photos");
        assert_eq!(user.suffix(), Some("photos"));
    }

    #[test]
    fn rejects_wildcard_and_malformed() {
        for bad in [
            "*",
            "",
            "ann",
            "@example.com",
            "ann@",
            "ann@example",
            "ann@exa mple.com",
            "ann@.example.com",
            "ann@example..com",
            "an n@example.com",
            "ann@exam_ple.com",
        ] {
            assert!(UserName::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn rejects_oversized_names() {
        let long_label = "a".repeat(64);
        assert!(UserName::parse(&format!("ann@{long_label}.com")).is_err());

        let long_local = "a".repeat(250);
        assert!(UserName::parse(&format!("{long_local}@example.com")).is_err());
    }

    #[test]
    fn serde_round_trip() {
        let user = UserName::parse("ann@example.com").unwrap();
        let json = serde_json::to_string(&user).unwrap();
        assert_eq!(json, "\"ann@example.com\"");
        let back: UserName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);

        assert!(serde_json::from_str::<UserName>("\"not-a-user\"").is_err());
    }
}
