//! Binding and connecting addresses.
//!
//! | scheme      | listener                           | connect                          |
//! |-------------|------------------------------------|----------------------------------|
//! | `inproc://` | acceptor queue in the `Context`    | in-process `Link::pair`          |
//! | `ipc://`    | `UnixListener` at the path         | `UnixStream`                     |
//! | `tcp://`    | `TcpListener`, port 0 = ephemeral  | `TcpStream` with `TCP_NODELAY`   |

use std::path::PathBuf;

use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use roslite_core::Address;

use crate::context::Context;
use crate::error::TransportError;
use crate::link::{Link, LINK_CAPACITY};

/// Pending in-process connections an acceptor can queue.
const INPROC_BACKLOG: usize = 128;

enum Acceptor {
    Inproc(mpsc::Receiver<Link>),
    Ipc(UnixListener),
    Tcp(TcpListener),
}

/// A bound address accepting connections.
///
/// Dropping the listener releases the address: in-process names are
/// removed from the context and IPC socket files are deleted.
pub struct Listener {
    acceptor: Acceptor,
    address: Address,
    context: Context,
}

impl Listener {
    /// Binds `address`.
    ///
    /// For `tcp://host:0` the returned listener's [`Listener::address`]
    /// carries the port the OS picked. A stale IPC socket file at the
    /// target path is removed first.
    pub async fn bind(context: &Context, address: &Address) -> Result<Self, TransportError> {
        let bind_error = |source: std::io::Error| TransportError::Bind {
            address: address.to_string(),
            source,
        };

        let (acceptor, bound) = match address {
            Address::Inproc(name) => {
                let (tx, rx) = mpsc::channel(INPROC_BACKLOG);
                context.register_inproc(name, tx)?;
                (Acceptor::Inproc(rx), address.clone())
            }
            Address::Ipc(path) => {
                if path.exists() {
                    std::fs::remove_file(path).map_err(bind_error)?;
                }
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent).map_err(bind_error)?;
                    }
                }
                let listener = UnixListener::bind(path).map_err(bind_error)?;
                (Acceptor::Ipc(listener), address.clone())
            }
            Address::Tcp { host, port } => {
                let listener = TcpListener::bind((host.as_str(), *port))
                    .await
                    .map_err(bind_error)?;
                let actual = listener.local_addr().map_err(bind_error)?.port();
                (Acceptor::Tcp(listener), Address::tcp(host.clone(), actual))
            }
        };

        debug!(address = %bound, "Bound listener");

        Ok(Self {
            acceptor,
            address: bound,
            context: context.clone(),
        })
    }

    /// The address peers should connect to.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Waits for the next connection.
    ///
    /// Returns `TransportError::Closed` once an in-process acceptor can no
    /// longer receive connections.
    pub async fn accept(&mut self) -> Result<Link, TransportError> {
        match &mut self.acceptor {
            Acceptor::Inproc(rx) => rx.recv().await.ok_or(TransportError::Closed),
            Acceptor::Ipc(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(Link::from_stream(stream, self.address.to_string()))
            }
            Acceptor::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
                }
                Ok(Link::from_stream(stream, peer.to_string()))
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        match &self.address {
            Address::Inproc(name) => self.context.unregister_inproc(name),
            Address::Ipc(path) => remove_socket_file(path),
            Address::Tcp { .. } => {}
        }
    }
}

fn remove_socket_file(path: &PathBuf) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Failed to remove socket file");
        }
    }
}

/// Connects to a bound address.
///
/// In-process connections fail immediately with
/// `TransportError::NotBound` when nothing is bound at the name.
pub async fn connect(context: &Context, address: &Address) -> Result<Link, TransportError> {
    let connect_error = |source: std::io::Error| TransportError::Connect {
        address: address.to_string(),
        source,
    };

    match address {
        Address::Inproc(name) => {
            let acceptor = context
                .inproc_acceptor(name)
                .ok_or_else(|| TransportError::NotBound {
                    address: address.to_string(),
                })?;
            let (local, remote) = Link::pair(LINK_CAPACITY);
            acceptor
                .send(remote)
                .await
                .map_err(|_| TransportError::NotBound {
                    address: address.to_string(),
                })?;
            Ok(local)
        }
        Address::Ipc(path) => {
            let stream = UnixStream::connect(path).await.map_err(connect_error)?;
            Ok(Link::from_stream(stream, address.to_string()))
        }
        Address::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(connect_error)?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!(address = %address, error = %e, "Failed to set TCP_NODELAY");
            }
            Ok(Link::from_stream(stream, address.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use bytes::Bytes;

    async fn echo_once(listener: &mut Listener, client: &mut Link) {
        let mut server = listener.accept().await.unwrap();
        client
            .send(Message::single(Bytes::from_static(b"hi")))
            .await
            .unwrap();
        let got = server.recv().await.unwrap();
        server.send(got).await.unwrap();
        let back = client.recv().await.unwrap();
        assert_eq!(back.payload(), Some(&Bytes::from_static(b"hi")));
    }

    #[tokio::test]
    async fn test_inproc_bind_connect() {
        let ctx = Context::new();
        let address: Address = "inproc://id1000".parse().unwrap();
        let mut listener = Listener::bind(&ctx, &address).await.unwrap();
        let mut client = connect(&ctx, &address).await.unwrap();
        echo_once(&mut listener, &mut client).await;
    }

    #[tokio::test]
    async fn test_inproc_needs_same_context() {
        let ctx = Context::new();
        let address: Address = "inproc://id1000".parse().unwrap();
        let _listener = Listener::bind(&ctx, &address).await.unwrap();

        let other = Context::new();
        assert!(matches!(
            connect(&other, &address).await,
            Err(TransportError::NotBound { .. })
        ));
    }

    #[tokio::test]
    async fn test_ipc_bind_connect_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::new();
        let address = Address::ipc_for_id(dir.path(), 1, 1000);
        let path = dir.path().join("atlas1id1000");

        let mut listener = Listener::bind(&ctx, &address).await.unwrap();
        assert!(path.exists());

        let mut client = connect(&ctx, &address).await.unwrap();
        echo_once(&mut listener, &mut client).await;

        drop(listener);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_tcp_ephemeral_port() {
        let ctx = Context::new();
        let mut listener = Listener::bind(&ctx, &Address::tcp("127.0.0.1", 0))
            .await
            .unwrap();

        let bound = listener.address().clone();
        match &bound {
            Address::Tcp { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_ne!(*port, 0);
            }
            other => panic!("unexpected address {other}"),
        }

        let mut client = connect(&ctx, &bound).await.unwrap();
        echo_once(&mut listener, &mut client).await;
    }

    #[tokio::test]
    async fn test_unbound_inproc_fails_fast() {
        let ctx = Context::new();
        let address: Address = "inproc://nobody".parse().unwrap();
        assert!(matches!(
            connect(&ctx, &address).await,
            Err(TransportError::NotBound { .. })
        ));
    }
}
