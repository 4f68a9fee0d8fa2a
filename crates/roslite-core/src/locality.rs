//! Requester locality relative to the broker.
//!
//! Locality decides which of a proxy's three transport bindings a Node is
//! told about. It is a pure function of the two identities involved and
//! never depends on the name being resolved or on earlier requests.

use std::fmt;
use std::process;

use serde::{Deserialize, Serialize};

/// Where a participant runs: the network interface it declares plus its
/// operating-system process id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Declared network interface, e.g. `"192.168.1.20"`
    pub interface: String,

    /// Process id
    pub pid: u32,
}

impl Identity {
    /// Creates an identity from explicit parts.
    pub fn new(interface: impl Into<String>, pid: u32) -> Self {
        Self {
            interface: interface.into(),
            pid,
        }
    }

    /// Identity of the running process on the given interface.
    pub fn current(interface: impl Into<String>) -> Self {
        Self::new(interface, process::id())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.interface, self.pid)
    }
}

/// Locality of a requester as seen from the broker.
///
/// Ordered by preference: `SameProcess` is the cheapest transport and
/// compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    /// Different interface: only the network binding is reachable
    CrossHost,
    /// Same interface, different process: local IPC is reachable
    SameHost,
    /// Same interface and same pid: the in-process binding is reachable
    SameProcess,
}

impl Locality {
    /// Classifies `requester` against `broker`.
    pub fn classify(requester: &Identity, broker: &Identity) -> Self {
        if requester.interface != broker.interface {
            Locality::CrossHost
        } else if requester.pid != broker.pid {
            Locality::SameHost
        } else {
            Locality::SameProcess
        }
    }

    /// Returns the lowercase label used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Locality::SameProcess => "same-process",
            Locality::SameHost => "same-host",
            Locality::CrossHost => "cross-host",
        }
    }
}

impl fmt::Display for Locality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
