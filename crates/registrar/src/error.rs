use std::io;
use std::path::PathBuf;

use roslite_node::NodeError;
use thiserror::Error;

/// Errors that can stop the registrar.
#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Failed to read store {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Store {path} is not a JSON object: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write store {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
