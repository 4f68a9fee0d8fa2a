//! Protocol message types for discovery and registrar communication.
//!
//! On the wire every message is a [`WireMap`]: integer keys from
//! [`crate::keys`] mapped to loosely typed values. The typed structs here
//! validate a map on the way in and build one on the way out.

use std::collections::BTreeMap;

use roslite_core::{Address, Identity, Kind, Name};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::keys;

/// Raw integer-keyed message map.
pub type WireMap = BTreeMap<u8, Value>;

// ============================================================================
// Discovery
// ============================================================================

/// A Node asking the broker where a channel or service lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRequest {
    /// Which namespace the name belongs to
    pub kind: Kind,

    /// Name being resolved
    pub name: Name,

    /// Interface and pid the requester declares
    pub requester: Identity,
}

impl DiscoveryRequest {
    /// Creates a channel lookup.
    pub fn lookup_channel(name: Name, requester: Identity) -> Self {
        Self {
            kind: Kind::Channel,
            name,
            requester,
        }
    }

    /// Creates a service lookup.
    pub fn lookup_service(name: Name, requester: Identity) -> Self {
        Self {
            kind: Kind::Service,
            name,
            requester,
        }
    }

    /// Builds the wire map for this request.
    pub fn to_wire(&self) -> WireMap {
        let (request, name_key) = match self.kind {
            Kind::Channel => (keys::LOOKUP_CHANNEL, keys::CHANNEL),
            Kind::Service => (keys::LOOKUP_SERVICE, keys::SERVICE),
        };

        let mut map = WireMap::new();
        map.insert(keys::REQUEST, Value::from(request));
        map.insert(name_key, Value::from(self.name.as_str()));
        map.insert(keys::INTERFACE, Value::from(self.requester.interface.as_str()));
        map.insert(keys::PID, Value::from(self.requester.pid));
        map
    }

    /// Validates a wire map as a discovery request.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownRequest` if the kind is not a lookup
    /// - `ProtocolError::MissingName` if the name is absent, empty or not a string
    /// - `ProtocolError::MissingField` / `InvalidField` for a bad interface or pid
    pub fn from_wire(map: &WireMap) -> Result<Self, ProtocolError> {
        let (kind, name_key) = match map.get(&keys::REQUEST).and_then(Value::as_u64) {
            Some(k) if k == u64::from(keys::LOOKUP_CHANNEL) => (Kind::Channel, keys::CHANNEL),
            Some(k) if k == u64::from(keys::LOOKUP_SERVICE) => (Kind::Service, keys::SERVICE),
            _ => return Err(ProtocolError::UnknownRequest(describe(map.get(&keys::REQUEST)))),
        };

        let name = map
            .get(&name_key)
            .and_then(Value::as_str)
            .and_then(|s| Name::new(s).ok())
            .ok_or(ProtocolError::MissingName { kind })?;

        let interface = map
            .get(&keys::INTERFACE)
            .ok_or(ProtocolError::MissingField { field: "interface" })?
            .as_str()
            .ok_or_else(|| ProtocolError::InvalidField {
                field: "interface",
                reason: "expected a string".to_string(),
            })?;

        let pid = map
            .get(&keys::PID)
            .ok_or(ProtocolError::MissingField { field: "pid" })?
            .as_u64()
            .and_then(|p| u32::try_from(p).ok())
            .ok_or_else(|| ProtocolError::InvalidField {
                field: "pid",
                reason: "expected a 32-bit unsigned integer".to_string(),
            })?;

        Ok(Self {
            kind,
            name,
            requester: Identity::new(interface, pid),
        })
    }
}

/// The two role-tagged addresses of a proxy for one locality.
///
/// For channels `front` is the publish address and `back` the subscribe
/// address; for services `front` is the request address and `back` the
/// reply address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressPair {
    pub kind: Kind,
    pub front: Address,
    pub back: Address,
}

impl AddressPair {
    pub fn new(kind: Kind, front: Address, back: Address) -> Self {
        Self { kind, front, back }
    }

    fn role_keys(kind: Kind) -> (u8, u8) {
        match kind {
            Kind::Channel => (keys::PUB, keys::SUB),
            Kind::Service => (keys::REQ, keys::REP),
        }
    }

    /// Builds the response map (`{PUB, SUB}` or `{REQ, REP}`).
    pub fn to_wire(&self) -> WireMap {
        let (front_key, back_key) = Self::role_keys(self.kind);
        let mut map = WireMap::new();
        map.insert(front_key, Value::from(self.front.to_string()));
        map.insert(back_key, Value::from(self.back.to_string()));
        map
    }

    /// Parses a response map for a lookup of the given kind.
    pub fn from_wire(kind: Kind, map: &WireMap) -> Result<Self, ProtocolError> {
        let (front_key, back_key) = Self::role_keys(kind);
        let (front_field, back_field) = match kind {
            Kind::Channel => ("pub", "sub"),
            Kind::Service => ("req", "rep"),
        };

        let front = parse_address(map, front_key, front_field)?;
        let back = parse_address(map, back_key, back_field)?;
        Ok(Self { kind, front, back })
    }
}

fn parse_address(map: &WireMap, key: u8, field: &'static str) -> Result<Address, ProtocolError> {
    map.get(&key)
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingField { field })?
        .parse::<Address>()
        .map_err(|e| ProtocolError::InvalidField {
            field,
            reason: e.to_string(),
        })
}

// ============================================================================
// Registrar
// ============================================================================

/// Requests understood by the registrar service.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrarRequest {
    /// Store `value` under `key` and announce it
    Set { key: String, value: Value },

    /// Read the value stored under `key`
    Get { key: String },
}

impl RegistrarRequest {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self::Set {
            key: key.into(),
            value,
        }
    }

    pub fn get(key: impl Into<String>) -> Self {
        Self::Get { key: key.into() }
    }

    pub fn to_wire(&self) -> WireMap {
        let mut map = WireMap::new();
        match self {
            RegistrarRequest::Set { key, value } => {
                map.insert(keys::REQUEST, Value::from(keys::SET));
                map.insert(keys::KEY, Value::from(key.as_str()));
                map.insert(keys::VALUE, value.clone());
            }
            RegistrarRequest::Get { key } => {
                map.insert(keys::REQUEST, Value::from(keys::GET));
                map.insert(keys::KEY, Value::from(key.as_str()));
            }
        }
        map
    }

    /// Validates a wire map as a registrar request.
    ///
    /// A `Set` without a value stores null.
    pub fn from_wire(map: &WireMap) -> Result<Self, ProtocolError> {
        let request = map.get(&keys::REQUEST).and_then(Value::as_u64);
        let is_set = match request {
            Some(k) if k == u64::from(keys::SET) => true,
            Some(k) if k == u64::from(keys::GET) => false,
            _ => return Err(ProtocolError::UnknownRequest(describe(map.get(&keys::REQUEST)))),
        };

        let key = map
            .get(&keys::KEY)
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty())
            .ok_or(ProtocolError::MissingField { field: "key" })?
            .to_string();

        if is_set {
            let value = map.get(&keys::VALUE).cloned().unwrap_or(Value::Null);
            Ok(Self::Set { key, value })
        } else {
            Ok(Self::Get { key })
        }
    }
}

/// A key/value pair as returned by the registrar and published on its channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrarEntry {
    pub key: String,
    pub value: Value,
}

impl RegistrarEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn to_wire(&self) -> WireMap {
        let mut map = WireMap::new();
        map.insert(keys::KEY, Value::from(self.key.as_str()));
        map.insert(keys::VALUE, self.value.clone());
        map
    }

    pub fn from_wire(map: &WireMap) -> Result<Self, ProtocolError> {
        let key = map
            .get(&keys::KEY)
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField { field: "key" })?;
        let value = map.get(&keys::VALUE).cloned().unwrap_or(Value::Null);
        Ok(Self::new(key, value))
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new("10.0.0.5", 77)
    }

    #[test]
    fn test_lookup_channel_wire_layout() {
        let request = DiscoveryRequest::lookup_channel(Name::new("temps").unwrap(), identity());
        let map = request.to_wire();

        assert_eq!(map.get(&keys::REQUEST), Some(&Value::from(keys::LOOKUP_CHANNEL)));
        assert_eq!(map.get(&keys::CHANNEL), Some(&Value::from("temps")));
        assert_eq!(map.get(&keys::INTERFACE), Some(&Value::from("10.0.0.5")));
        assert_eq!(map.get(&keys::PID), Some(&Value::from(77)));
        assert!(map.get(&keys::SERVICE).is_none());

        assert_eq!(DiscoveryRequest::from_wire(&map).unwrap(), request);
    }

    #[test]
    fn test_lookup_service_reads_service_key() {
        let request = DiscoveryRequest::lookup_service(Name::new("echo").unwrap(), identity());
        let parsed = DiscoveryRequest::from_wire(&request.to_wire()).unwrap();
        assert_eq!(parsed.kind, Kind::Service);
        assert_eq!(parsed.name.as_str(), "echo");
    }

    #[test]
    fn test_empty_name_is_missing() {
        let name = Name::new("x").unwrap();
        let mut map = DiscoveryRequest::lookup_channel(name, identity()).to_wire();
        map.insert(keys::CHANNEL, Value::from(""));

        assert!(matches!(
            DiscoveryRequest::from_wire(&map),
            Err(ProtocolError::MissingName { kind: Kind::Channel })
        ));

        map.remove(&keys::CHANNEL);
        assert!(matches!(
            DiscoveryRequest::from_wire(&map),
            Err(ProtocolError::MissingName { .. })
        ));
    }

    #[test]
    fn test_unknown_request_kind() {
        let mut map = WireMap::new();
        map.insert(keys::REQUEST, Value::from(9));
        assert!(matches!(
            DiscoveryRequest::from_wire(&map),
            Err(ProtocolError::UnknownRequest(_))
        ));

        assert!(matches!(
            DiscoveryRequest::from_wire(&WireMap::new()),
            Err(ProtocolError::UnknownRequest(kind)) if kind == "none"
        ));
    }

    #[test]
    fn test_bad_pid_rejected() {
        let name = Name::new("s").unwrap();
        let mut map = DiscoveryRequest::lookup_service(name, identity()).to_wire();
        map.insert(keys::PID, Value::from("not-a-pid"));
        assert!(matches!(
            DiscoveryRequest::from_wire(&map),
            Err(ProtocolError::InvalidField { field: "pid", .. })
        ));
    }

    #[test]
    fn test_address_pair_role_tags() {
        let pair = AddressPair::new(
            Kind::Service,
            Address::inproc_for_id(1000),
            Address::inproc_for_id(1001),
        );
        let map = pair.to_wire();
        assert_eq!(map.get(&keys::REQ), Some(&Value::from("inproc://id1000")));
        assert_eq!(map.get(&keys::REP), Some(&Value::from("inproc://id1001")));
        assert!(map.get(&keys::PUB).is_none());

        // A service response does not satisfy a channel lookup
        assert!(AddressPair::from_wire(Kind::Channel, &map).is_err());
        assert_eq!(AddressPair::from_wire(Kind::Service, &map).unwrap(), pair);
    }

    #[test]
    fn test_registrar_requests() {
        let set = RegistrarRequest::set("depth", serde_json::json!(3.5));
        assert_eq!(RegistrarRequest::from_wire(&set.to_wire()).unwrap(), set);

        let get = RegistrarRequest::get("depth");
        let map = get.to_wire();
        assert!(map.get(&keys::VALUE).is_none());
        assert_eq!(RegistrarRequest::from_wire(&map).unwrap(), get);
    }

    #[test]
    fn test_registrar_rejects_empty_key() {
        let mut map = RegistrarRequest::get("k").to_wire();
        map.insert(keys::KEY, Value::from(""));
        assert!(matches!(
            RegistrarRequest::from_wire(&map),
            Err(ProtocolError::MissingField { field: "key" })
        ));
    }
}
