//! Node configuration.

use roslite_core::{Address, Identity};

/// Where a Node finds Atlas and who it says it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Atlas discovery endpoint
    pub atlas: Address,

    /// Interface and pid sent with every lookup
    pub identity: Identity,
}

impl NodeConfig {
    /// Config for this process on `interface`.
    pub fn new(atlas: Address, interface: impl Into<String>) -> Self {
        Self {
            atlas,
            identity: Identity::current(interface),
        }
    }

    /// Overrides the declared identity.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }
}
