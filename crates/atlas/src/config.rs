//! Atlas configuration.

use std::path::PathBuf;

use roslite_core::{Address, Identity};

/// Directory holding local-IPC endpoint files unless configured otherwise.
pub const DEFAULT_IPC_DIR: &str = "/tmp";

/// Everything Atlas needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Discovery endpoint address
    pub address: Address,

    /// Interface and pid Atlas compares requesters against. The interface
    /// is also where network bindings are opened.
    pub identity: Identity,

    /// Directory for `ipc://` endpoint files
    pub ipc_dir: PathBuf,
}

impl AtlasConfig {
    /// Creates a config for this process on `interface`.
    pub fn new(address: Address, interface: impl Into<String>) -> Self {
        Self {
            address,
            identity: Identity::current(interface),
            ipc_dir: PathBuf::from(DEFAULT_IPC_DIR),
        }
    }

    /// Overrides the declared identity.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Overrides the IPC directory.
    pub fn with_ipc_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ipc_dir = dir.into();
        self
    }
}
