//! Transport addresses.
//!
//! Three address families exist, from cheapest to most general:
//!
//! ```text
//! inproc://id1000                   valid inside one OS process
//! ipc:///tmp/atlas4242id1000        valid on one host
//! tcp://192.168.1.20:49152          valid across hosts
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

const INPROC_PREFIX: &str = "inproc://";
const IPC_PREFIX: &str = "ipc://";
const TCP_PREFIX: &str = "tcp://";

/// Address family of an [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Inproc,
    Ipc,
    Tcp,
}

/// A scheme-qualified transport address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Address {
    /// Opaque token unique within one process
    Inproc(String),

    /// Filesystem path of a Unix domain socket
    Ipc(PathBuf),

    /// Host and port; port 0 asks the OS for an ephemeral port when binding
    Tcp { host: String, port: u16 },
}

impl Address {
    /// In-process address derived from an allocated id.
    pub fn inproc_for_id(id: u64) -> Self {
        Address::Inproc(format!("id{id}"))
    }

    /// Local-IPC address scoped to the broker pid and an allocated id.
    pub fn ipc_for_id(dir: &Path, broker_pid: u32, id: u64) -> Self {
        Address::Ipc(dir.join(format!("atlas{broker_pid}id{id}")))
    }

    /// Network address on the given interface.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Address::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Returns the address family.
    pub fn scheme(&self) -> Scheme {
        match self {
            Address::Inproc(_) => Scheme::Inproc,
            Address::Ipc(_) => Scheme::Ipc,
            Address::Tcp { .. } => Scheme::Tcp,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Inproc(name) => write!(f, "{INPROC_PREFIX}{name}"),
            Address::Ipc(path) => write!(f, "{IPC_PREFIX}{}", path.display()),
            Address::Tcp { host, port } => write!(f, "{TCP_PREFIX}{host}:{port}"),
        }
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        let invalid = |reason: &str| DomainError::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        if let Some(name) = s.strip_prefix(INPROC_PREFIX) {
            if name.is_empty() {
                return Err(invalid("empty in-process name"));
            }
            return Ok(Address::Inproc(name.to_string()));
        }

        if let Some(path) = s.strip_prefix(IPC_PREFIX) {
            if path.is_empty() {
                return Err(invalid("empty socket path"));
            }
            return Ok(Address::Ipc(PathBuf::from(path)));
        }

        if let Some(rest) = s.strip_prefix(TCP_PREFIX) {
            let (host, port) = rest
                .rsplit_once(':')
                .ok_or_else(|| invalid("missing port"))?;
            if host.is_empty() {
                return Err(invalid("missing host"));
            }
            let port = port.parse::<u16>().map_err(|_| invalid("bad port"))?;
            return Ok(Address::tcp(host, port));
        }

        Err(DomainError::UnsupportedScheme {
            address: s.to_string(),
        })
    }
}

impl TryFrom<String> for Address {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_addresses() {
        assert_eq!(Address::inproc_for_id(1000).to_string(), "inproc://id1000");
        assert_eq!(
            Address::ipc_for_id(Path::new("/tmp"), 4242, 1001).to_string(),
            "ipc:///tmp/atlas4242id1001"
        );
        assert_eq!(Address::tcp("10.0.0.1", 5555).to_string(), "tcp://10.0.0.1:5555");
    }

    #[test]
    fn test_parse_each_scheme() {
        assert_eq!(
            "inproc://id7".parse::<Address>().unwrap(),
            Address::Inproc("id7".to_string())
        );
        assert_eq!(
            "ipc:///run/atlas1id2".parse::<Address>().unwrap(),
            Address::Ipc(PathBuf::from("/run/atlas1id2"))
        );
        assert_eq!(
            "tcp://127.0.0.1:0".parse::<Address>().unwrap(),
            Address::tcp("127.0.0.1", 0)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "udp://1.2.3.4:5".parse::<Address>(),
            Err(DomainError::UnsupportedScheme { .. })
        ));
        assert!("tcp://127.0.0.1".parse::<Address>().is_err());
        assert!("tcp://:80".parse::<Address>().is_err());
        assert!("tcp://host:99999".parse::<Address>().is_err());
        assert!("inproc://".parse::<Address>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let address = Address::tcp("127.0.0.1", 80);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"tcp://127.0.0.1:80\"");
        let parsed: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, address);
    }
}
