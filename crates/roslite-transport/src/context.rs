//! Shared per-process transport context.
//!
//! A `Context` is the only state shared between co-located participants.
//! It owns the table of in-process endpoints, so an `inproc://` address
//! is reachable only by code holding a clone of the context that bound
//! it. Cloning is cheap and every clone refers to the same table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::link::Link;
use crate::poller::PeerId;

/// Shared transport context.
#[derive(Clone, Default)]
pub struct Context {
    inner: Arc<ContextInner>,
}

#[derive(Default)]
struct ContextInner {
    /// In-process name → acceptor queue of the socket bound there
    inproc: Mutex<HashMap<String, mpsc::Sender<Link>>>,

    /// Source of process-unique peer ids
    next_peer: AtomicU64,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a peer id unique within this context.
    pub fn next_peer_id(&self) -> PeerId {
        PeerId(self.inner.next_peer.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register_inproc(
        &self,
        name: &str,
        acceptor: mpsc::Sender<Link>,
    ) -> Result<(), TransportError> {
        let mut table = self.inner.inproc.lock().unwrap_or_else(|e| e.into_inner());
        if table.contains_key(name) {
            return Err(TransportError::AddressInUse {
                address: format!("inproc://{name}"),
            });
        }
        table.insert(name.to_string(), acceptor);
        Ok(())
    }

    pub(crate) fn unregister_inproc(&self, name: &str) {
        let mut table = self.inner.inproc.lock().unwrap_or_else(|e| e.into_inner());
        table.remove(name);
    }

    pub(crate) fn inproc_acceptor(&self, name: &str) -> Option<mpsc::Sender<Link>> {
        let table = self.inner.inproc.lock().unwrap_or_else(|e| e.into_inner());
        table.get(name).cloned()
    }

    /// Number of in-process names currently bound.
    pub fn inproc_count(&self) -> usize {
        self.inner
            .inproc
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("inproc_endpoints", &self.inproc_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_ids_are_unique_across_clones() {
        let ctx = Context::new();
        let other = ctx.clone();
        let a = ctx.next_peer_id();
        let b = other.next_peer_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_duplicate_inproc_name_rejected() {
        let ctx = Context::new();
        let (tx, _rx) = mpsc::channel(1);
        ctx.register_inproc("id1000", tx.clone()).unwrap();

        assert!(matches!(
            ctx.register_inproc("id1000", tx),
            Err(TransportError::AddressInUse { .. })
        ));

        ctx.unregister_inproc("id1000");
        assert_eq!(ctx.inproc_count(), 0);
    }
}
