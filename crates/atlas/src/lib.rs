//! Atlas - channel/service discovery broker for roslite
//!
//! This crate provides the broker every roslite Node talks to:
//! - `config` - where Atlas listens and which identity it declares
//! - `broker` - discovery handling, proxy registry and the forwarding loop
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Atlas                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌────────────────┐  lookup   ┌───────────────────────────┐  │
//! │  │   discovery    │──────────▶│      ProxyRegistry        │  │
//! │  │   (router)     │◀──────────│ (kind, name) -> Proxy     │  │
//! │  └───────┬────────┘  pair     └─────────────┬─────────────┘  │
//! │          │                                  │ binds          │
//! │          │ Readiness                        ▼                │
//! │  ┌───────┴──────────────────────────────────────────────┐    │
//! │  │ Poller  ◀── frontend/backend sockets of every Proxy   │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each proxy endpoint is bound three times, once per transport, and a
//! Node is handed the cheapest pair its locality can reach.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Malformed requests and blocked forwards are logged, never fatal

pub mod broker;
pub mod config;
pub mod error;

pub use broker::{Atlas, ProxyKey, Side};
pub use config::{AtlasConfig, DEFAULT_IPC_DIR};
pub use error::AtlasError;
