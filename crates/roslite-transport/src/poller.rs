//! Readiness multiplexing for bound sockets.
//!
//! Instead of polling a growing set of sockets, every bound socket is
//! handed a [`Registration`]. Each accepted connection gets a pump task
//! that reports its arrival, every inbound message, and its departure
//! into the poller's single queue, tagged with the socket's [`Token`].
//! The owner of the [`Poller`] therefore waits on exactly one thing no
//! matter how many sockets exist, and registering a new socket is just
//! cloning a sender.
//!
//! Events of one peer are delivered in order: `Connected`, messages,
//! `Disconnected`.

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::link::Link;
use crate::message::Message;

/// Queue depth of the poller. Pump tasks wait when it is full, which
/// pushes backpressure onto the sending peers.
pub const POLLER_CAPACITY: usize = 4096;

/// Identifies which bound socket an event belongs to.
pub type Token = u64;

/// Identifies one accepted connection within a [`crate::Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl PeerId {
    /// Encodes the id as a routing envelope frame.
    pub fn to_frame(self) -> Bytes {
        Bytes::copy_from_slice(&self.0.to_be_bytes())
    }

    /// Decodes a routing envelope frame.
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = frame.try_into().ok()?;
        Some(PeerId(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Something happened on a connection of a bound socket.
#[derive(Debug)]
pub enum SocketEvent {
    /// A peer connected; `outbound` delivers messages to it
    Connected {
        peer: PeerId,
        outbound: mpsc::Sender<Message>,
    },

    /// A peer sent a message
    Message { peer: PeerId, message: Message },

    /// A peer went away
    Disconnected { peer: PeerId },
}

/// A socket event tagged with the socket it happened on.
#[derive(Debug)]
pub struct Readiness {
    pub token: Token,
    pub event: SocketEvent,
}

/// Single readiness queue for any number of bound sockets.
pub struct Poller {
    sender: mpsc::Sender<Readiness>,
    receiver: mpsc::Receiver<Readiness>,
}

impl Poller {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(POLLER_CAPACITY);
        Self { sender, receiver }
    }

    /// Creates a registration that reports under `token`.
    pub fn register(&self, token: Token) -> Registration {
        Registration {
            token,
            sender: self.sender.clone(),
        }
    }

    /// Waits for the next event.
    ///
    /// Never yields `None` while the poller is alive, since it keeps a
    /// sender of its own.
    pub async fn wait(&mut self) -> Option<Readiness> {
        self.receiver.recv().await
    }

    /// Returns an already-queued event without waiting.
    pub fn try_next(&mut self) -> Option<Readiness> {
        self.receiver.try_recv().ok()
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle a bound socket uses to report events to its poller.
#[derive(Clone)]
pub struct Registration {
    token: Token,
    sender: mpsc::Sender<Readiness>,
}

impl Registration {
    pub fn token(&self) -> Token {
        self.token
    }

    /// Starts reporting events for a newly accepted connection.
    pub(crate) fn attach(&self, peer: PeerId, link: Link) {
        let token = self.token;
        let sender = self.sender.clone();
        let (outbound, mut inbound) = link.split();

        tokio::spawn(async move {
            let connected = Readiness {
                token,
                event: SocketEvent::Connected { peer, outbound },
            };
            if sender.send(connected).await.is_err() {
                return;
            }

            while let Some(message) = inbound.recv().await {
                let ready = Readiness {
                    token,
                    event: SocketEvent::Message { peer, message },
                };
                if sender.send(ready).await.is_err() {
                    return;
                }
            }

            let _ = sender
                .send(Readiness {
                    token,
                    event: SocketEvent::Disconnected { peer },
                })
                .await;
        });
    }
}
