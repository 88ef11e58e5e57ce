//! Handle to the write side of a client connection.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Cloneable handle used by handlers and broadcasts to write frames.
///
/// Writes are serialised per connection so two frames never interleave.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: u64,
    peer: Option<SocketAddr>,
    writer: Mutex<BoxedWriter>,
}

impl Connection {
    pub fn new<W>(writer: W, peer: Option<SocketAddr>) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(ConnectionInner {
                id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
                peer,
                writer: Mutex::new(Box::new(writer)),
            }),
        }
    }

    /// Process-unique connection id
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.inner.peer
    }

    /// Write one complete frame.
    pub async fn send(&self, frame: &[u8]) -> std::io::Result<()> {
        let mut writer = self.inner.writer.lock().await;
        writer.write_all(frame).await?;
        writer.flush().await
    }

    /// Write one frame, dropping any error.
    ///
    /// A broken peer is noticed and torn down by its own read loop.
    pub async fn send_quiet(&self, frame: &[u8]) -> bool {
        match self.send(frame).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Write to {} failed: {}", self, e);
                false
            }
        }
    }

    /// Shut the write side down
    pub async fn close(&self) {
        let mut writer = self.inner.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.peer {
            Some(addr) => write!(f, "conn#{} ({})", self.inner.id, addr),
            None => write!(f, "conn#{}", self.inner.id),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("peer", &self.inner.peer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_send_reaches_peer() {
        let (client, mut server) = tokio::io::duplex(64);
        let conn = Connection::new(client, None);
        conn.send(b"hello").await.unwrap();

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (a, _a) = tokio::io::duplex(8);
        let (b, _b) = tokio::io::duplex(8);
        let first = Connection::new(a, None);
        let second = Connection::new(b, None);
        assert_ne!(first.id(), second.id());
        assert_eq!(first.clone().id(), first.id());
    }

    #[tokio::test]
    async fn test_send_quiet_swallows_broken_pipe() {
        let (client, server) = tokio::io::duplex(8);
        drop(server);
        let conn = Connection::new(client, None);
        assert!(!conn.send_quiet(b"lost").await);
    }
}
