//! The registrar run loop.

use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use roslite_node::{Node, NodeError, Provider, Publisher};
use roslite_protocol::{RegistrarEntry, RegistrarRequest, WireCodec, WireMap};

use crate::config::RegistrarConfig;
use crate::error::RegistrarError;
use crate::store::Store;

/// Key/value service bound to one service and one channel.
pub struct Registrar {
    store: Store,
    provider: Provider,
    publisher: Publisher,
}

impl Registrar {
    /// Provides the service, opens the channel and loads the store.
    pub async fn start(config: &RegistrarConfig, node: &mut Node) -> Result<Self, RegistrarError> {
        let provider = node.provide_service(&config.service).await?;
        let publisher = node.publish(&config.channel).await?;
        let store = Store::load(&config.persistence_path)?;

        info!(
            service = %config.service,
            channel = %config.channel,
            path = %config.persistence_path.display(),
            "Registrar started"
        );

        Ok(Self {
            store,
            provider,
            publisher,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Serves requests until cancelled, then saves the store.
    ///
    /// Cancellation is a normal stop. Any other error is returned after the
    /// store has been saved.
    #[instrument(name = "registrar", skip_all, fields(path = %self.store.path().display()))]
    pub async fn run(mut self) -> Result<(), RegistrarError> {
        let served = self.serve().await;
        let saved = self.store.save();

        match served {
            Ok(()) | Err(RegistrarError::Node(NodeError::Interrupted)) => {
                info!("Registrar stopped");
                saved
            }
            Err(e) => {
                if let Err(save_error) = saved {
                    error!(error = %save_error, "Failed to save store");
                }
                Err(e)
            }
        }
    }

    async fn serve(&mut self) -> Result<(), RegistrarError> {
        loop {
            let payload = self.provider.recv().await?;
            let response = self.handle(&payload).await?;
            self.provider.put_message(&response).await?;
        }
    }

    /// Applies one encoded request and publishes the resulting update.
    async fn handle(&mut self, payload: &[u8]) -> Result<Option<WireMap>, RegistrarError> {
        let outcome = apply(&mut self.store, payload);
        if let Some(update) = &outcome.update {
            self.publisher.put_message(update).await?;
        }
        Ok(outcome.reply)
    }
}

/// Result of applying one request to the store.
#[derive(Debug, PartialEq)]
struct Outcome {
    /// Reply map, `None` for an invalid request
    reply: Option<WireMap>,

    /// Entry to publish on the channel
    update: Option<WireMap>,
}

impl Outcome {
    fn invalid() -> Self {
        Self {
            reply: None,
            update: None,
        }
    }
}

fn apply(store: &mut Store, payload: &[u8]) -> Outcome {
    let map: WireMap = match WireCodec.decode(payload) {
        Ok(map) => map,
        Err(e) => {
            warn!(error = %e, "Undecodable registrar request");
            return Outcome::invalid();
        }
    };

    let request = match RegistrarRequest::from_wire(&map) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Invalid registrar request");
            return Outcome::invalid();
        }
    };

    match request {
        RegistrarRequest::Set { key, value } => {
            debug!(key = %key, "Set");
            store.set(key.clone(), value.clone());
            let entry = RegistrarEntry::new(key, value).to_wire();
            Outcome {
                reply: Some(entry.clone()),
                update: Some(entry),
            }
        }
        RegistrarRequest::Get { key } => {
            debug!(key = %key, "Get");
            let value = store.get(&key).cloned().unwrap_or(Value::Null);
            Outcome {
                reply: Some(RegistrarEntry::new(key, value).to_wire()),
                update: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roslite_protocol::keys;
    use serde_json::json;

    fn empty_store(dir: &tempfile::TempDir) -> Store {
        Store::load(dir.path().join("store.json")).unwrap()
    }

    fn encode(map: &WireMap) -> Vec<u8> {
        WireCodec.encode(map).unwrap()
    }

    #[test]
    fn test_set_stores_replies_and_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = empty_store(&dir);

        let request = RegistrarRequest::set("temperature", json!(21.5)).to_wire();
        let outcome = apply(&mut store, &encode(&request));

        let expected = RegistrarEntry::new("temperature", json!(21.5)).to_wire();
        assert_eq!(outcome.reply, Some(expected.clone()));
        assert_eq!(outcome.update, Some(expected));
        assert_eq!(store.get("temperature"), Some(&json!(21.5)));
    }

    #[test]
    fn test_get_replies_with_value_or_nil() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = empty_store(&dir);
        store.set("mode", json!("eco"));

        let found = apply(&mut store, &encode(&RegistrarRequest::get("mode").to_wire()));
        assert_eq!(found.reply, Some(RegistrarEntry::new("mode", json!("eco")).to_wire()));
        assert_eq!(found.update, None);

        let missing = apply(&mut store, &encode(&RegistrarRequest::get("absent").to_wire()));
        assert_eq!(missing.reply, Some(RegistrarEntry::new("absent", Value::Null).to_wire()));
        assert_eq!(missing.update, None);
    }

    #[test]
    fn test_invalid_requests_get_nil() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = empty_store(&dir);

        let mut unknown = WireMap::new();
        unknown.insert(keys::REQUEST, json!(9));
        unknown.insert(keys::KEY, json!("k"));
        assert_eq!(apply(&mut store, &encode(&unknown)), Outcome::invalid());

        let mut missing_key = WireMap::new();
        missing_key.insert(keys::REQUEST, json!(keys::SET));
        assert_eq!(apply(&mut store, &encode(&missing_key)), Outcome::invalid());

        assert_eq!(apply(&mut store, b"\xc1 not msgpack"), Outcome::invalid());
        assert!(store.is_empty());
    }
}
