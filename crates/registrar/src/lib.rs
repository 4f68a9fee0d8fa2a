//! Registrar - a persisted key/value store on top of roslite
//!
//! The registrar is an ordinary Node. It provides one service for getting
//! and setting values and publishes every new value on one channel:
//!
//! ```text
//! {REQUEST: SET, KEY, VALUE}  ──▶  store, publish {KEY, VALUE}, reply {KEY, VALUE}
//! {REQUEST: GET, KEY}         ──▶  reply {KEY, VALUE | nil}
//! anything else               ──▶  warn, reply nil
//! ```
//!
//! The store is read from its persistence file on startup and written back
//! whenever the run loop ends, including on cancellation.

pub mod config;
pub mod error;
pub mod service;
pub mod store;

pub use config::RegistrarConfig;
pub use error::RegistrarError;
pub use service::Registrar;
pub use store::Store;
