//! The persisted key/value map.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::RegistrarError;

/// Key/value pairs backed by a JSON file.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl Store {
    /// Loads the store from `path`.
    ///
    /// A missing file, an empty file or a JSON `null` all mean an empty
    /// store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RegistrarError> {
        let path = path.into();
        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(RegistrarError::Load { path, source }),
        };

        let entries = if contents.iter().all(u8::is_ascii_whitespace) {
            BTreeMap::new()
        } else {
            let parsed: Option<BTreeMap<String, Value>> = serde_json::from_slice(&contents)
                .map_err(|source| RegistrarError::Parse {
                    path: path.clone(),
                    source,
                })?;
            parsed.unwrap_or_default()
        };

        info!(path = %path.display(), entries = entries.len(), "Loaded store");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every entry back to the persistence file.
    pub fn save(&self) -> Result<(), RegistrarError> {
        let save_error = |source| RegistrarError::Save {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(&self.entries)
            .map_err(io::Error::from)
            .map_err(save_error)?;
        std::fs::write(&self.path, json).map_err(save_error)?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Saved store");
        Ok(())
    }
}
