//! roslite Transport - message links over three address families
//!
//! - `context` - shared per-process state; owns the in-process endpoint table
//! - `link` - a bidirectional, bounded, multipart message link
//! - `endpoint` - binding and connecting `inproc://`, `ipc://` and `tcp://` addresses
//! - `poller` - one readiness queue fed by every bound socket
//! - `socket` - broker-side bound sockets (fan-in, fan-out, router, dealer)
//!
//! # Architecture
//!
//! ```text
//!  connect()                     bind()
//! ┌──────────┐   Link    ┌──────────────────┐  accept  ┌──────────────┐
//! │   Node   │──────────▶│ Listener (x3)    │─────────▶│ BoundSocket  │
//! └──────────┘           └──────────────────┘          └──────┬───────┘
//!                                                             │ Readiness
//!                                                             ▼
//!                                                      ┌──────────────┐
//!                                                      │    Poller    │
//!                                                      └──────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Closed links surface as `TransportError::Closed` or `None`

pub mod context;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod link;
pub mod message;
pub mod poller;
pub mod socket;

pub use context::Context;
pub use endpoint::{connect, Listener};
pub use error::{SendError, TransportError};
pub use link::{Link, LINK_CAPACITY};
pub use message::Message;
pub use poller::{PeerId, Poller, Readiness, Registration, SocketEvent, Token};
pub use socket::{BoundSocket, SocketKind};
