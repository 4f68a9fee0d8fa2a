//! Channel and service names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Which namespace a [`Name`] lives in.
///
/// Channels and services are resolved independently: a channel called
/// `"registrar"` and a service called `"registrar"` are unrelated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// Named pub/sub topic: many publishers, many subscribers
    Channel,
    /// Named request/reply endpoint: many clients, load-balanced providers
    Service,
}

impl Kind {
    /// Returns the lowercase label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Channel => "channel",
            Kind::Service => "service",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-empty channel or service name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name(String);

impl Name {
    /// Creates a name, rejecting the empty string.
    pub fn new(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }
        Ok(Self(name))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Name {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Name {
    type Error = DomainError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.0
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_name_rejected() {
        assert_eq!(Name::new(""), Err(DomainError::EmptyName));
        assert!(Name::try_from("").is_err());
    }

    #[test]
    fn test_name_display() {
        let name = Name::new("thermometer").unwrap();
        assert_eq!(name.to_string(), "thermometer");
        assert_eq!(name.as_str(), "thermometer");
    }

    #[test]
    fn test_name_deserialize_rejects_empty() {
        let parsed: Result<Name, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());

        let parsed: Name = serde_json::from_str("\"echo\"").unwrap();
        assert_eq!(parsed.as_str(), "echo");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(Kind::Channel.to_string(), "channel");
        assert_eq!(Kind::Service.to_string(), "service");
    }
}
