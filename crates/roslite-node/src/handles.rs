//! Socket handles returned by the Node primitives.
//!
//! Each handle owns one connected link to a proxy endpoint. Raw payloads
//! go through `send`/`recv`; `put_message`/`get_message` wrap them in the
//! MessagePack wire encoding shared with Atlas and the Registrar.

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tokio::time::Instant;
use tracing::debug;

use roslite_core::Name;
use roslite_protocol::WireCodec;
use roslite_transport::{Link, Message};

use crate::error::{NodeError, Result};

// ============================================================================
// Publisher
// ============================================================================

/// Sends messages to every subscriber of a channel.
#[derive(Debug)]
pub struct Publisher {
    channel: Name,
    link: Link,
    cancel_token: CancellationToken,
}

impl Publisher {
    pub(crate) fn new(channel: Name, link: Link, cancel_token: CancellationToken) -> Self {
        Self {
            channel,
            link,
            cancel_token,
        }
    }

    pub fn channel(&self) -> &Name {
        &self.channel
    }

    /// Publishes one raw payload.
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        let message = Message::single(payload.into());
        tokio::select! {
            _ = self.cancel_token.cancelled() => Err(NodeError::Interrupted),
            result = self.link.send(message) => result.map_err(|_| NodeError::Closed {
                name: self.channel.clone(),
            }),
        }
    }

    /// Publishes one encoded message.
    pub async fn put_message<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        let payload = WireCodec.encode(message)?;
        self.send(payload).await
    }
}

// ============================================================================
// Subscriber
// ============================================================================

/// Receives everything published on a channel.
#[derive(Debug)]
pub struct Subscriber {
    channel: Name,
    link: Link,
    cancel_token: CancellationToken,
}

impl Subscriber {
    pub(crate) fn new(channel: Name, link: Link, cancel_token: CancellationToken) -> Self {
        Self {
            channel,
            link,
            cancel_token,
        }
    }

    pub fn channel(&self) -> &Name {
        &self.channel
    }

    /// Waits for the next raw payload.
    pub async fn recv(&mut self) -> Result<Bytes> {
        let message = tokio::select! {
            _ = self.cancel_token.cancelled() => return Err(NodeError::Interrupted),
            message = self.link.recv() => message,
        };
        message
            .and_then(|m| m.into_parts().pop())
            .ok_or_else(|| NodeError::Closed {
                name: self.channel.clone(),
            })
    }

    /// Waits for and decodes the next message.
    pub async fn get_message<T: DeserializeOwned>(&mut self) -> Result<T> {
        let payload = self.recv().await?;
        Ok(WireCodec.decode(&payload)?)
    }
}

// ============================================================================
// Requester
// ============================================================================

/// One request/response exchange at a time with a service.
///
/// Every request carries a sequence frame ahead of its payload. Providers
/// keep it with the routing envelope and send it back with the reply, so
/// a reply is only accepted by the exchange that asked for it.
#[derive(Debug)]
pub struct Requester {
    service: Name,
    link: Link,
    timeout: Duration,
    sequence: u64,
    cancel_token: CancellationToken,
}

impl Requester {
    pub(crate) fn new(
        service: Name,
        link: Link,
        timeout: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            service,
            link,
            timeout,
            sequence: 0,
            cancel_token,
        }
    }

    pub fn service(&self) -> &Name {
        &self.service
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends a request and waits up to the timeout for its reply.
    ///
    /// Replies to earlier exchanges that timed out are discarded, however
    /// late they arrive.
    ///
    /// # Errors
    ///
    /// - `NodeError::Timeout` if no matching reply arrives within the bound
    /// - `NodeError::Interrupted` if the cancellation token fires
    pub async fn request(&mut self, payload: impl Into<Bytes>) -> Result<Bytes> {
        self.sequence = self.sequence.wrapping_add(1);
        let sequence = sequence_frame(self.sequence);

        let message = Message::new(vec![sequence.clone(), payload.into()]);
        tokio::select! {
            _ = self.cancel_token.cancelled() => return Err(NodeError::Interrupted),
            result = self.link.send(message) => result.map_err(|_| NodeError::Closed {
                name: self.service.clone(),
            })?,
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let reply = tokio::select! {
                _ = self.cancel_token.cancelled() => return Err(NodeError::Interrupted),
                reply = tokio::time::timeout_at(deadline, self.link.recv()) => reply,
            };

            let message = match reply {
                Ok(Some(message)) => message,
                Ok(None) => {
                    return Err(NodeError::Closed {
                        name: self.service.clone(),
                    })
                }
                Err(_) => {
                    return Err(NodeError::Timeout {
                        service: self.service.clone(),
                        timeout: self.timeout,
                    })
                }
            };

            let mut parts = message.into_parts().into_iter();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(frame), Some(reply), None) if frame == sequence => return Ok(reply),
                _ => debug!(service = %self.service, "Discarding reply to an earlier request"),
            }
        }
    }

    /// Encodes a request, waits for the reply and decodes it.
    pub async fn request_message<Req, Resp>(&mut self, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = WireCodec.encode(request)?;
        let reply = self.request(payload).await?;
        Ok(WireCodec.decode(&reply)?)
    }
}

/// Encodes a request sequence number as its wire frame.
fn sequence_frame(sequence: u64) -> Bytes {
    Bytes::copy_from_slice(&sequence.to_be_bytes())
}

// ============================================================================
// Provider
// ============================================================================

/// Receives requests for a service and answers them.
///
/// Requests arrive with a routing envelope and the requester's sequence
/// frame. Both are kept until the matching [`Provider::reply`], so every
/// reply goes back to its requester tagged with the exchange it answers.
#[derive(Debug)]
pub struct Provider {
    service: Name,
    link: Link,
    pending: Option<Vec<Bytes>>,
    cancel_token: CancellationToken,
}

impl Provider {
    pub(crate) fn new(service: Name, link: Link, cancel_token: CancellationToken) -> Self {
        Self {
            service,
            link,
            pending: None,
            cancel_token,
        }
    }

    pub fn service(&self) -> &Name {
        &self.service
    }

    /// Waits for the next request payload.
    ///
    /// Receiving again without replying abandons the previous request.
    pub async fn recv(&mut self) -> Result<Bytes> {
        let message = tokio::select! {
            _ = self.cancel_token.cancelled() => return Err(NodeError::Interrupted),
            message = self.link.recv() => message,
        };

        let mut parts = message
            .map(Message::into_parts)
            .ok_or_else(|| NodeError::Closed {
                name: self.service.clone(),
            })?;
        let payload = parts.pop().ok_or_else(|| NodeError::Closed {
            name: self.service.clone(),
        })?;

        if self.pending.replace(parts).is_some() {
            debug!(service = %self.service, "Previous request left unanswered");
        }
        Ok(payload)
    }

    /// Answers the request last returned by [`Provider::recv`].
    pub async fn reply(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        let mut parts = self.pending.take().ok_or_else(|| NodeError::NoPendingRequest {
            service: self.service.clone(),
        })?;
        parts.push(payload.into());

        tokio::select! {
            _ = self.cancel_token.cancelled() => Err(NodeError::Interrupted),
            result = self.link.send(Message::new(parts)) => result.map_err(|_| NodeError::Closed {
                name: self.service.clone(),
            }),
        }
    }

    /// Waits for and decodes the next request.
    pub async fn get_message<T: DeserializeOwned>(&mut self) -> Result<T> {
        let payload = self.recv().await?;
        Ok(WireCodec.decode(&payload)?)
    }

    /// Encodes and sends the reply to the pending request.
    pub async fn put_message<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<()> {
        let payload = WireCodec.encode(message)?;
        self.reply(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_provider_keeps_envelope_for_reply() {
        let (mut proxy_side, node_side) = Link::pair(8);
        let mut provider = Provider::new(name("echo"), node_side, CancellationToken::new());

        let envelope = Bytes::from_static(&[0, 0, 0, 0, 0, 0, 0, 3]);
        proxy_side
            .send(Message::new(vec![envelope.clone(), Bytes::from_static(b"ping")]))
            .await
            .unwrap();

        assert_eq!(provider.recv().await.unwrap(), Bytes::from_static(b"ping"));
        provider.reply(Bytes::from_static(b"pong")).await.unwrap();

        let reply = proxy_side.recv().await.unwrap();
        assert_eq!(reply.parts(), &[envelope, Bytes::from_static(b"pong")]);
    }

    #[tokio::test]
    async fn test_reply_without_request_fails() {
        let (_proxy_side, node_side) = Link::pair(8);
        let mut provider = Provider::new(name("echo"), node_side, CancellationToken::new());

        assert!(matches!(
            provider.reply(Bytes::new()).await,
            Err(NodeError::NoPendingRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_requester_times_out() {
        let (_proxy_side, node_side) = Link::pair(8);
        let mut requester = Requester::new(
            name("silent"),
            node_side,
            Duration::from_millis(20),
            CancellationToken::new(),
        );

        assert!(matches!(
            requester.request(Bytes::from_static(b"hello")).await,
            Err(NodeError::Timeout { .. })
        ));
    }

    /// Replies to `request` the way a provider behind a router does.
    fn answer(request: &Message, payload: &'static [u8]) -> Message {
        let mut parts = request.parts().to_vec();
        parts.pop();
        parts.push(Bytes::from_static(payload));
        Message::new(parts)
    }

    #[tokio::test]
    async fn test_requester_tags_requests_with_sequence() {
        let (mut proxy_side, node_side) = Link::pair(8);
        let mut requester = Requester::new(
            name("echo"),
            node_side,
            Duration::from_millis(500),
            CancellationToken::new(),
        );

        let responder = tokio::spawn(async move {
            let first = proxy_side.recv().await.unwrap();
            proxy_side.send(answer(&first, b"one")).await.unwrap();
            let second = proxy_side.recv().await.unwrap();
            proxy_side.send(answer(&second, b"two")).await.unwrap();
            (first, second)
        });

        let one = requester.request(Bytes::from_static(b"a")).await.unwrap();
        let two = requester.request(Bytes::from_static(b"b")).await.unwrap();
        assert_eq!(one, Bytes::from_static(b"one"));
        assert_eq!(two, Bytes::from_static(b"two"));

        let (first, second) = responder.await.unwrap();
        assert_eq!(first.len(), 2);
        assert_ne!(first.parts().first(), second.parts().first());
    }

    #[tokio::test]
    async fn test_reply_arriving_after_next_request_is_discarded() {
        let (mut proxy_side, node_side) = Link::pair(8);
        let mut requester = Requester::new(
            name("slow"),
            node_side,
            Duration::from_millis(50),
            CancellationToken::new(),
        );

        assert!(matches!(
            requester.request(Bytes::from_static(b"first")).await,
            Err(NodeError::Timeout { .. })
        ));
        let first = proxy_side.recv().await.unwrap();

        // Both replies go out only once the second request is on its way.
        let responder = tokio::spawn(async move {
            let second = proxy_side.recv().await.unwrap();
            proxy_side.send(answer(&first, b"reply-to-first")).await.unwrap();
            proxy_side.send(answer(&second, b"reply-to-second")).await.unwrap();
            proxy_side
        });

        let reply = requester.request(Bytes::from_static(b"second")).await.unwrap();
        assert_eq!(reply, Bytes::from_static(b"reply-to-second"));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_requester_discards_late_reply() {
        let (mut proxy_side, node_side) = Link::pair(8);
        let mut requester = Requester::new(
            name("slow"),
            node_side,
            Duration::from_millis(20),
            CancellationToken::new(),
        );

        assert!(requester.request(Bytes::from_static(b"first")).await.is_err());
        let first = proxy_side.recv().await.unwrap();
        proxy_side.send(answer(&first, b"late")).await.unwrap();

        let responder = tokio::spawn(async move {
            let request = proxy_side.recv().await.unwrap();
            proxy_side.send(request).await.unwrap();
            proxy_side
        });

        let reply = requester.request(Bytes::from_static(b"second")).await.unwrap();
        assert_eq!(reply, Bytes::from_static(b"second"));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_recv() {
        let (_proxy_side, node_side) = Link::pair(8);
        let cancel = CancellationToken::new();
        let mut subscriber = Subscriber::new(name("chatter"), node_side, cancel.clone());

        cancel.cancel();
        assert!(matches!(subscriber.recv().await, Err(NodeError::Interrupted)));
    }

    #[tokio::test]
    async fn test_typed_publish_subscribe() {
        let (publisher_link, subscriber_link) = Link::pair(8);
        let publisher = Publisher::new(name("chatter"), publisher_link, CancellationToken::new());
        let mut subscriber =
            Subscriber::new(name("chatter"), subscriber_link, CancellationToken::new());

        publisher.put_message(&serde_json::json!({"n": 1})).await.unwrap();
        let got: serde_json::Value = subscriber.get_message().await.unwrap();
        assert_eq!(got, serde_json::json!({"n": 1}));
    }
}
