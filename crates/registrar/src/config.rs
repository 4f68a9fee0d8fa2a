use std::path::PathBuf;

use roslite_node::DEFAULT_REGISTRAR;

/// Registrar settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarConfig {
    /// JSON file the store is loaded from and saved to
    pub persistence_path: PathBuf,

    /// Service to provide
    pub service: String,

    /// Channel new values are published on
    pub channel: String,
}

impl RegistrarConfig {
    /// Config with the default service and channel names.
    pub fn new(persistence_path: impl Into<PathBuf>) -> Self {
        Self {
            persistence_path: persistence_path.into(),
            service: DEFAULT_REGISTRAR.to_string(),
            channel: DEFAULT_REGISTRAR.to_string(),
        }
    }
}
