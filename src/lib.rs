//! roslite - lightweight pub/sub and request/reply middleware
//!
//! The workspace crates do the work; this crate holds what the binaries
//! share:
//! - `cli` - common arguments, logging setup and signal handling
//!
//! # Binaries
//!
//! ```text
//! atlas           discovery broker and proxy forwarder
//! registrar       persisted key/value service
//! roslite-client  send a JSON request to a service and print the replies
//! roslite-host    atlas and registrar in one process
//! ```

pub mod cli;
