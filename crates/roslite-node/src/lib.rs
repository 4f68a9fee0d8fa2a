//! roslite Node - the discovery client
//!
//! Every participant other than Atlas uses a [`Node`] to turn channel and
//! service names into connected sockets:
//! - `config` - which Atlas to ask and which identity to declare
//! - `cache` - resolved address pairs, kept for the Node's lifetime
//! - `node` - the four primitives plus registrar helpers
//! - `handles` - publisher, subscriber, requester and provider sockets
//!
//! # Resolution
//!
//! ```text
//!  publish("chatter")
//!        │
//!        ▼
//!  ┌─────────────┐  miss   ┌──────────────┐  lookup  ┌─────────┐
//!  │DiscoveryCache│───────▶│ atlas link   │─────────▶│  Atlas  │
//!  └─────┬───────┘         └──────────────┘◀─────────└─────────┘
//!        │ hit / stored pair                 pair
//!        ▼
//!  connect(pair.front) ──▶ Publisher
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Every blocking wait observes the cancellation token and returns
//!   `NodeError::Interrupted` once it fires

pub mod cache;
pub mod config;
pub mod error;
pub mod handles;
pub mod node;

pub use cache::DiscoveryCache;
pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use handles::{Provider, Publisher, Requester, Subscriber};
pub use node::{Node, DEFAULT_REGISTRAR, DEFAULT_REQUEST_TIMEOUT};
