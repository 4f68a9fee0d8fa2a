//! Proxy registry and endpoint id allocation.
//!
//! The registry is owned by the broker loop and only ever mutated from
//! it, so find-or-create needs no locking.

use std::collections::HashMap;
use std::fmt;

use roslite_core::{Kind, Name};
use roslite_transport::Token;

use super::proxy::Proxy;

/// First id handed out to a proxy endpoint.
pub const FIRST_ENDPOINT_ID: u64 = 1000;

/// Monotonic id source for proxy endpoints.
///
/// Ids name in-process and IPC bindings and double as poller tokens, so
/// they are never reused.
#[derive(Debug)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: FIRST_ENDPOINT_ID,
        }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry key: channels and services live in separate namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyKey {
    pub kind: Kind,
    pub name: Name,
}

impl ProxyKey {
    pub fn new(kind: Kind, name: Name) -> Self {
        Self { kind, name }
    }
}

impl fmt::Display for ProxyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", self.kind, self.name)
    }
}

/// Which endpoint of a proxy an event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Frontend,
    Backend,
}

/// All proxies of one broker.
#[derive(Default)]
pub struct ProxyRegistry {
    proxies: HashMap<ProxyKey, Proxy>,
    endpoints: HashMap<Token, (ProxyKey, Side)>,
    ids: IdAllocator,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        self.ids.next_id()
    }

    pub fn contains(&self, key: &ProxyKey) -> bool {
        self.proxies.contains_key(key)
    }

    pub fn get(&self, key: &ProxyKey) -> Option<&Proxy> {
        self.proxies.get(key)
    }

    /// Stores a proxy and indexes both of its endpoint tokens.
    ///
    /// A proxy already stored under the same key is kept and the new one
    /// is returned to the caller's drop.
    pub fn insert(&mut self, proxy: Proxy) -> &Proxy {
        let key = proxy.key().clone();
        if !self.proxies.contains_key(&key) {
            self.endpoints
                .insert(proxy.token(Side::Frontend), (key.clone(), Side::Frontend));
            self.endpoints
                .insert(proxy.token(Side::Backend), (key.clone(), Side::Backend));
        }
        self.proxies.entry(key).or_insert(proxy)
    }

    /// Finds the proxy endpoint registered under a poller token.
    pub fn endpoint_mut(&mut self, token: Token) -> Option<(&mut Proxy, Side)> {
        let (key, side) = self.endpoints.get(&token)?;
        let side = *side;
        self.proxies.get_mut(key).map(|proxy| (proxy, side))
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Number of proxies of one kind.
    pub fn count(&self, kind: Kind) -> usize {
        self.proxies.keys().filter(|key| key.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_start_at_base_and_increase() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_id(), 1000);
        assert_eq!(ids.next_id(), 1001);
        assert_eq!(ids.next_id(), 1002);
    }

    #[test]
    fn test_keys_separate_namespaces() {
        let name = Name::new("echo").unwrap();
        let channel = ProxyKey::new(Kind::Channel, name.clone());
        let service = ProxyKey::new(Kind::Service, name);
        assert_ne!(channel, service);
        assert_eq!(channel.to_string(), "channel \"echo\"");
    }
}
