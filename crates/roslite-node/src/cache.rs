//! Per-Node discovery cache.

use std::collections::HashMap;

use roslite_core::{Kind, Name};
use roslite_protocol::AddressPair;

/// Resolved address pairs by (kind, name).
///
/// Entries are never invalidated or replaced: once a name resolves, the
/// Node keeps using that pair for the rest of its life.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
    entries: HashMap<(Kind, Name), AddressPair>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: Kind, name: &Name) -> Option<&AddressPair> {
        self.entries.get(&(kind, name.clone()))
    }

    /// Stores a pair unless one is already cached, returning the cached one.
    pub fn insert(&mut self, kind: Kind, name: Name, pair: AddressPair) -> &AddressPair {
        self.entries.entry((kind, name)).or_insert(pair)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
