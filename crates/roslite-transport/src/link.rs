//! Bidirectional message links.
//!
//! Every connection, whatever its address family, is exposed as a pair
//! of bounded queues. For stream transports a reader task and a writer
//! task move frames between the socket and those queues; in-process links
//! are two queues wired directly to each other.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::TransportError;
use crate::frame::{read_message, write_message};
use crate::message::Message;

/// Per-direction queue depth (high-water mark) of a link.
pub const LINK_CAPACITY: usize = 1000;

/// One end of a connection.
#[derive(Debug)]
pub struct Link {
    outbound: mpsc::Sender<Message>,
    inbound: mpsc::Receiver<Message>,
}

impl Link {
    /// Creates two in-process ends wired to each other.
    pub fn pair(capacity: usize) -> (Link, Link) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        (
            Link {
                outbound: a_tx,
                inbound: a_rx,
            },
            Link {
                outbound: b_tx,
                inbound: b_rx,
            },
        )
    }

    /// Wraps a byte stream, spawning its reader and writer tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_stream<S>(stream: S, label: String) -> Link
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut reader, writer) = tokio::io::split(stream);
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(LINK_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<Message>(LINK_CAPACITY);

        let read_label = label.clone();
        tokio::spawn(async move {
            loop {
                match read_message(&mut reader).await {
                    Ok(message) => {
                        if in_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(TransportError::Closed) => break,
                    Err(e) => {
                        debug!(link = %read_label, error = %e, "Link read failed");
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            let mut writer = BufWriter::new(writer);
            while let Some(message) = out_rx.recv().await {
                let result = async {
                    write_message(&mut writer, &message).await?;
                    writer.flush().await?;
                    Ok::<(), TransportError>(())
                }
                .await;

                if let Err(e) = result {
                    debug!(link = %label, error = %e, "Link write failed");
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        Link {
            outbound: out_tx,
            inbound: in_rx,
        }
    }

    /// Sends a message, waiting for queue space.
    pub async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Receives the next message; `None` once the remote end is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inbound.recv().await
    }

    /// Returns an already-queued message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.inbound.try_recv().ok()
    }

    /// Splits into the raw outbound sender and inbound receiver.
    pub fn split(self) -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
        (self.outbound, self.inbound)
    }
}
