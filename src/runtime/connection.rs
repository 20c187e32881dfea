use std::{
    fmt, io,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::net::TcpStream;

/// Global counter for connection IDs. Only uniqueness matters, so relaxed ordering is enough.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection, used to correlate log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generates a new unique connection ID.
    #[must_use]
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A raw accepted socket plus the generic per-connection state.
///
/// Created by accept, destroyed on close. Dropping it closes the socket as well.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    stream: Option<TcpStream>,
}

impl Connection {
    /// Wraps a freshly accepted socket.
    #[must_use]
    pub fn from_socket(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        let id = ConnectionId::new();
        tracing::debug!(connection_id = %id, %peer_addr, "connection accepted");
        Self {
            id,
            peer_addr,
            stream: Some(stream),
        }
    }

    /// This connection's ID.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// The remote address.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Whether the socket is still open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Closes the socket. Later calls do nothing.
    pub fn close_socket(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(connection_id = %self.id, "socket closed");
        }
    }

    /// The socket, or `NotConnected` once it has been closed.
    pub(crate) fn stream(&self) -> io::Result<&TcpStream> {
        self.stream
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

/// Adapts a non-blocking tokio socket to `std::io`, reporting `WouldBlock` when it is not ready.
///
/// The TLS engine reads and writes records through this.
pub(crate) struct SocketIo<'a>(pub(crate) &'a TcpStream);

impl io::Read for SocketIo<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.try_read(buf)
    }
}

impl io::Write for SocketIo<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.try_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builds the framework's request object for a newly established connection.
///
/// The request is opaque to this crate. The session owns it and drops it on close.
pub trait RequestFactory: Send + Sync + 'static {
    /// The framework's request type.
    type Request: Send + 'static;

    /// Creates the request bound to `connection`.
    fn create(&self, connection: &Connection) -> Self::Request;
}
