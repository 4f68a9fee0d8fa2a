//! Broker-side bound sockets.
//!
//! A [`BoundSocket`] listens on any number of addresses at once and treats
//! every peer connected through any of them alike. Its kind decides how
//! outbound messages are distributed:
//!
//! | kind     | inbound                  | outbound                                   |
//! |----------|--------------------------|--------------------------------------------|
//! | `FanIn`  | as received              | broadcast, never waits                      |
//! | `FanOut` | as received              | broadcast, never waits                      |
//! | `Router` | peer envelope prepended  | routed by the leading envelope frame        |
//! | `Dealer` | as received              | round-robin over peers                      |
//!
//! The socket never reads from its peers itself. Accept loops attach each
//! new connection to the socket's [`Registration`], so inbound traffic and
//! connect/disconnect notifications arrive through the [`crate::Poller`]
//! and are fed back in via [`BoundSocket::handle_event`].

mod peers;

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use roslite_core::Address;

use crate::context::Context;
use crate::endpoint::Listener;
use crate::error::{SendError, TransportError};
use crate::message::Message;
use crate::poller::{PeerId, Registration, SocketEvent, Token};

use peers::PeerTable;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Distribution pattern of a bound socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Collects messages from many publishers
    FanIn,
    /// Delivers every message to every subscriber
    FanOut,
    /// Tracks which peer sent what so replies can go back
    Router,
    /// Balances messages across providers
    Dealer,
}

impl fmt::Display for SocketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketKind::FanIn => "fan-in",
            SocketKind::FanOut => "fan-out",
            SocketKind::Router => "router",
            SocketKind::Dealer => "dealer",
        };
        f.write_str(name)
    }
}

/// A socket bound to one or more addresses.
pub struct BoundSocket {
    kind: SocketKind,
    token: Token,
    addresses: Vec<Address>,
    peers: PeerTable,
    accept_tasks: Vec<JoinHandle<()>>,
}

impl BoundSocket {
    /// Binds every address in `addresses` and starts accepting.
    ///
    /// The returned addresses carry OS-assigned TCP ports. If any bind
    /// fails, the addresses bound so far are released again.
    pub async fn bind(
        context: &Context,
        kind: SocketKind,
        addresses: &[Address],
        registration: Registration,
    ) -> Result<Self, TransportError> {
        let mut listeners = Vec::with_capacity(addresses.len());
        for address in addresses {
            listeners.push(Listener::bind(context, address).await?);
        }

        let bound: Vec<Address> = listeners.iter().map(|l| l.address().clone()).collect();
        let accept_tasks = listeners
            .into_iter()
            .map(|listener| spawn_accept_loop(listener, context.clone(), registration.clone()))
            .collect();

        debug!(kind = %kind, token = registration.token(), addresses = ?bound, "Socket bound");

        Ok(Self {
            kind,
            token: registration.token(),
            addresses: bound,
            peers: PeerTable::default(),
            accept_tasks,
        })
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    pub fn token(&self) -> Token {
        self.token
    }

    /// Bound addresses, in the order they were requested.
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Applies a poller event for this socket.
    ///
    /// Returns the inbound message, if the event carried one. Router
    /// sockets prepend the sender's envelope frame.
    pub fn handle_event(&mut self, event: SocketEvent) -> Option<Message> {
        match event {
            SocketEvent::Connected { peer, outbound } => {
                debug!(kind = %self.kind, token = self.token, peer = %peer, "Peer connected");
                self.peers.insert(peer, outbound);
                None
            }
            SocketEvent::Disconnected { peer } => {
                if self.peers.remove(peer) {
                    debug!(
                        kind = %self.kind,
                        token = self.token,
                        peer = %peer,
                        "Peer disconnected"
                    );
                }
                None
            }
            SocketEvent::Message { peer, mut message } => {
                if self.kind == SocketKind::Router {
                    message.push_front(peer.to_frame());
                }
                Some(message)
            }
        }
    }

    /// Hands a message to peers without waiting.
    ///
    /// Broadcasting sockets succeed with no peers and report `WouldBlock`
    /// if any peer's queue was full; the others still got the message.
    pub fn try_send(&mut self, message: Message) -> Result<(), SendError> {
        match self.kind {
            SocketKind::FanIn | SocketKind::FanOut => self.broadcast(message),
            SocketKind::Dealer => {
                if self.peers.is_empty() {
                    return Err(SendError::NoPeers);
                }

                let mut message = message;
                let mut any_full = false;
                let mut delivered = None;
                for (index, outbound) in self.peers.rotation() {
                    match outbound.try_send(message) {
                        Ok(()) => {
                            delivered = Some(index);
                            break;
                        }
                        Err(TrySendError::Full(back)) => {
                            any_full = true;
                            message = back;
                        }
                        Err(TrySendError::Closed(back)) => message = back,
                    }
                }

                match delivered {
                    Some(index) => {
                        self.peers.advance_past(index);
                        Ok(())
                    }
                    None if any_full => Err(SendError::WouldBlock),
                    None => Err(SendError::NoPeers),
                }
            }
            SocketKind::Router => {
                let (peer, message) = split_envelope(message)?;
                let outbound = self.peers.get(peer).ok_or(SendError::Unroutable)?;
                outbound.try_send(message).map_err(|e| match e {
                    TrySendError::Full(_) => SendError::WouldBlock,
                    TrySendError::Closed(_) => SendError::Unroutable,
                })
            }
        }
    }

    /// Hands a message to peers, waiting for queue space where the
    /// pattern allows it.
    ///
    /// Router and dealer sockets wait on the chosen peer. Broadcasting
    /// sockets never wait and behave like [`BoundSocket::try_send`].
    pub async fn send(&mut self, message: Message) -> Result<(), SendError> {
        match self.kind {
            SocketKind::FanIn | SocketKind::FanOut => self.broadcast(message),
            SocketKind::Dealer => {
                let candidates: Vec<_> = self
                    .peers
                    .rotation()
                    .map(|(index, outbound)| (index, outbound.clone()))
                    .collect();

                let mut message = message;
                for (index, outbound) in candidates {
                    match outbound.send(message).await {
                        Ok(()) => {
                            self.peers.advance_past(index);
                            return Ok(());
                        }
                        Err(closed) => message = closed.0,
                    }
                }
                Err(SendError::NoPeers)
            }
            SocketKind::Router => {
                let (peer, message) = split_envelope(message)?;
                let outbound = self
                    .peers
                    .get(peer)
                    .cloned()
                    .ok_or(SendError::Unroutable)?;
                outbound
                    .send(message)
                    .await
                    .map_err(|_| SendError::Unroutable)
            }
        }
    }

    fn broadcast(&mut self, message: Message) -> Result<(), SendError> {
        let mut any_full = false;
        for outbound in self.peers.iter() {
            if let Err(TrySendError::Full(_)) = outbound.try_send(message.clone()) {
                any_full = true;
            }
        }
        if any_full {
            Err(SendError::WouldBlock)
        } else {
            Ok(())
        }
    }
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        for task in &self.accept_tasks {
            task.abort();
        }
    }
}

impl fmt::Debug for BoundSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundSocket")
            .field("kind", &self.kind)
            .field("token", &self.token)
            .field("addresses", &self.addresses)
            .field("peers", &self.peers.len())
            .finish()
    }
}

fn split_envelope(mut message: Message) -> Result<(PeerId, Message), SendError> {
    let frame = message.pop_front().ok_or(SendError::Unroutable)?;
    let peer = PeerId::from_frame(&frame).ok_or(SendError::Unroutable)?;
    if message.is_empty() {
        return Err(SendError::Unroutable);
    }
    Ok((peer, message))
}

fn spawn_accept_loop(
    mut listener: Listener,
    context: Context,
    registration: Registration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok(link) => registration.attach(context.next_peer_id(), link),
                Err(TransportError::Closed) => break,
                Err(e) => {
                    warn!(address = %listener.address(), error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::connect;
    use crate::poller::Poller;
    use bytes::Bytes;

    fn inproc(name: &str) -> Address {
        Address::Inproc(name.to_string())
    }

    /// Feeds poller events into the socket until `peers` are connected.
    async fn settle(poller: &mut Poller, socket: &mut BoundSocket, peers: usize) {
        while socket.peer_count() < peers {
            let ready = poller.wait().await.unwrap();
            assert_eq!(ready.token, socket.token());
            socket.handle_event(ready.event);
        }
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_peer() {
        let ctx = Context::new();
        let mut poller = Poller::new();
        let registration = poller.register(1);
        let mut socket = BoundSocket::bind(&ctx, SocketKind::FanOut, &[inproc("sub")], registration)
            .await
            .unwrap();

        let mut a = connect(&ctx, &inproc("sub")).await.unwrap();
        let mut b = connect(&ctx, &inproc("sub")).await.unwrap();
        settle(&mut poller, &mut socket, 2).await;

        socket.try_send(Message::single(Bytes::from_static(b"tick"))).unwrap();
        assert_eq!(a.recv().await.unwrap().payload(), Some(&Bytes::from_static(b"tick")));
        assert_eq!(b.recv().await.unwrap().payload(), Some(&Bytes::from_static(b"tick")));
    }

    #[tokio::test]
    async fn test_fan_out_without_peers_is_ok() {
        let ctx = Context::new();
        let poller = Poller::new();
        let registration = poller.register(1);
        let mut socket = BoundSocket::bind(&ctx, SocketKind::FanOut, &[inproc("sub")], registration)
            .await
            .unwrap();

        assert_eq!(socket.try_send(Message::single(Bytes::new())), Ok(()));
    }

    #[tokio::test]
    async fn test_full_peer_reports_would_block_then_recovers() {
        let ctx = Context::new();
        let mut poller = Poller::new();
        let registration = poller.register(1);
        let mut socket = BoundSocket::bind(&ctx, SocketKind::FanOut, &[inproc("sub")], registration)
            .await
            .unwrap();

        let mut slow = connect(&ctx, &inproc("sub")).await.unwrap();
        settle(&mut poller, &mut socket, 1).await;

        let mut results = Vec::new();
        for _ in 0..=crate::LINK_CAPACITY {
            results.push(socket.try_send(Message::single(Bytes::from_static(b"x"))));
        }
        assert_eq!(results.last(), Some(&Err(SendError::WouldBlock)));

        slow.recv().await.unwrap();
        assert_eq!(socket.try_send(Message::single(Bytes::from_static(b"y"))), Ok(()));
    }

    #[tokio::test]
    async fn test_dealer_round_robin() {
        let ctx = Context::new();
        let mut poller = Poller::new();
        let registration = poller.register(2);
        let mut socket = BoundSocket::bind(&ctx, SocketKind::Dealer, &[inproc("rep")], registration)
            .await
            .unwrap();

        assert_eq!(
            socket.try_send(Message::single(Bytes::from_static(b"lost"))),
            Err(SendError::NoPeers)
        );

        let mut a = connect(&ctx, &inproc("rep")).await.unwrap();
        let mut b = connect(&ctx, &inproc("rep")).await.unwrap();
        settle(&mut poller, &mut socket, 2).await;

        for i in 0..4u8 {
            socket.try_send(Message::single(vec![i])).unwrap();
        }

        let mut a_got = vec![a.recv().await.unwrap(), a.recv().await.unwrap()];
        let mut b_got = vec![b.recv().await.unwrap(), b.recv().await.unwrap()];
        a_got.append(&mut b_got);
        let mut seen: Vec<u8> = a_got.iter().map(|m| m.payload().unwrap()[0]).collect();
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert!(a.try_recv().is_none());
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_router_envelopes_and_routes() {
        let ctx = Context::new();
        let mut poller = Poller::new();
        let registration = poller.register(3);
        let mut socket = BoundSocket::bind(&ctx, SocketKind::Router, &[inproc("req")], registration)
            .await
            .unwrap();

        let mut a = connect(&ctx, &inproc("req")).await.unwrap();
        let mut b = connect(&ctx, &inproc("req")).await.unwrap();
        settle(&mut poller, &mut socket, 2).await;

        b.send(Message::single(Bytes::from_static(b"from-b"))).await.unwrap();
        let inbound = loop {
            let ready = poller.wait().await.unwrap();
            if let Some(message) = socket.handle_event(ready.event) {
                break message;
            }
        };
        assert_eq!(inbound.len(), 2);

        let mut reply = Message::single(Bytes::from_static(b"to-b"));
        reply.push_front(inbound.parts()[0].clone());
        socket.send(reply).await.unwrap();

        let got = b.recv().await.unwrap();
        assert_eq!(got.parts(), &[Bytes::from_static(b"to-b")]);
        assert!(a.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_router_rejects_unknown_peer() {
        let ctx = Context::new();
        let poller = Poller::new();
        let registration = poller.register(3);
        let mut socket = BoundSocket::bind(&ctx, SocketKind::Router, &[inproc("req")], registration)
            .await
            .unwrap();

        let mut message = Message::single(Bytes::from_static(b"nowhere"));
        message.push_front(PeerId(42).to_frame());
        assert_eq!(socket.try_send(message), Err(SendError::Unroutable));
        assert_eq!(
            socket.try_send(Message::single(Bytes::from_static(b"no envelope"))),
            Err(SendError::Unroutable)
        );
    }

    #[tokio::test]
    async fn test_drop_releases_inproc_name() {
        let ctx = Context::new();
        let poller = Poller::new();
        let registration = poller.register(4);
        let socket = BoundSocket::bind(&ctx, SocketKind::FanIn, &[inproc("pub")], registration)
            .await
            .unwrap();
        assert_eq!(ctx.inproc_count(), 1);

        drop(socket);
        for _ in 0..100 {
            if ctx.inproc_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(ctx.inproc_count(), 0);
    }
}
