use std::{
    fmt,
    io::{self, Read, Write},
    net::SocketAddr,
};

use rustls::{CipherSuite, ProtocolVersion, ServerConnection, pki_types::CertificateDer};
use tokio::net::TcpStream;

use crate::{
    runtime::connection::{Connection, ConnectionId, SocketIo},
    tls::error::SessionError,
};

/// TLS protocol state of one established connection plus the request created for it.
struct Session<R> {
    tls: ServerConnection,
    request: R,
}

/// An established TLS connection, exposing the server's generic stream contract.
///
/// `read` and `write` are the only operations that wait for the socket. `close` never waits.
pub struct TlsConnection<R> {
    connection: Connection,
    session: Option<Session<R>>,
}

impl<R> TlsConnection<R> {
    pub(crate) const fn new(connection: Connection, tls: ServerConnection, request: R) -> Self {
        Self {
            connection,
            session: Some(Session { tls, request }),
        }
    }

    /// ID of the underlying connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// The remote address.
    #[must_use]
    pub const fn peer_addr(&self) -> SocketAddr {
        self.connection.peer_addr()
    }

    /// Whether `close` has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    /// The request created for this connection, until it is closed.
    #[must_use]
    pub fn request(&self) -> Option<&R> {
        self.session.as_ref().map(|session| &session.request)
    }

    /// Mutable access to the request, until the connection is closed.
    pub fn request_mut(&mut self) -> Option<&mut R> {
        self.session.as_mut().map(|session| &mut session.request)
    }

    /// The negotiated protocol version.
    #[must_use]
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.session.as_ref()?.tls.protocol_version()
    }

    /// The negotiated cipher suite.
    #[must_use]
    pub fn cipher_suite(&self) -> Option<CipherSuite> {
        self.session
            .as_ref()?
            .tls
            .negotiated_cipher_suite()
            .map(|suite| suite.suite())
    }

    /// The certificate chain the client presented, if it sent one.
    #[must_use]
    pub fn peer_certificates(&self) -> Option<&[CertificateDer<'static>]> {
        self.session.as_ref()?.tls.peer_certificates()
    }

    /// Reads up to `buf.len()` bytes of decrypted application data.
    ///
    /// `Ok(0)` means the records that arrived carried no application data. It is not end of
    /// stream: the peer ending the stream is reported as an error.
    ///
    /// # Errors
    ///
    /// Returns `PeerClosed` after a close-notify, `TransportClosed` when the socket reaches end of
    /// stream without one, `Closed` after a local close, and `Tls`/`Io` when the connection broke.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, SessionError> {
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::Closed);
        };
        let stream = self.connection.stream().map_err(|_| SessionError::Closed)?;
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if let Some(read) = take_plaintext(&mut session.tls, buf)? {
                return Ok(read);
            }

            stream.readable().await?;
            match session.tls.read_tls(&mut SocketIo(stream)) {
                // Zero is end of stream; the engine remembers it and the reader reports it below.
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e.into()),
            }

            if let Err(e) = session.tls.process_new_packets() {
                // Best effort: deliver the alert the engine queued.
                let _ = flush_ready(&mut session.tls, stream);
                tracing::error!(connection_id = %self.connection.id(), error = %e, "reading data failed");
                return Err(e.into());
            }
            flush_ready(&mut session.tls, stream)?;

            let read = take_plaintext(&mut session.tls, buf)?.unwrap_or(0);
            tracing::trace!(connection_id = %self.connection.id(), bytes = read, "read");
            return Ok(read);
        }
    }

    /// Encrypts `buf` into as many records as needed and transmits all of them.
    ///
    /// Returns the number of bytes consumed, which is `buf.len()` on success.
    ///
    /// # Errors
    ///
    /// Returns `Closed` after a local close and `Io` when the transport fails.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, SessionError> {
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::Closed);
        };
        let stream = self.connection.stream().map_err(|_| SessionError::Closed)?;

        let mut consumed = 0;
        while consumed < buf.len() {
            let accepted = session.tls.writer().write(&buf[consumed..])?;
            if accepted == 0 && !session.tls.wants_write() {
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
            consumed += accepted;
            flush(&mut session.tls, stream).await?;
        }

        tracing::trace!(connection_id = %self.connection.id(), bytes = consumed, "write");
        Ok(consumed)
    }

    /// Sends a close-notify without waiting for the peer, releases the TLS state and the request,
    /// then closes the socket.
    ///
    /// Only the first call does anything.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.tls.send_close_notify();
            if let Ok(stream) = self.connection.stream()
                && let Err(e) = flush_ready(&mut session.tls, stream)
            {
                tracing::debug!(connection_id = %self.connection.id(), error = %e, "close-notify not delivered");
            }
            drop(session);
            tracing::debug!(connection_id = %self.connection.id(), "TLS session closed");
        }
        self.connection.close_socket();
    }
}

impl<R> Drop for TlsConnection<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R> fmt::Debug for TlsConnection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnection")
            .field("connection", &self.connection)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Hands out buffered plaintext. `None` means nothing is buffered yet.
fn take_plaintext(tls: &mut ServerConnection, buf: &mut [u8]) -> Result<Option<usize>, SessionError> {
    match tls.reader().read(buf) {
        Ok(0) => Err(SessionError::PeerClosed),
        Ok(read) => Ok(Some(read)),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(SessionError::TransportClosed),
        Err(e) => Err(e.into()),
    }
}

/// Writes queued records for as long as the socket accepts them without waiting.
pub(crate) fn flush_ready(tls: &mut ServerConnection, stream: &TcpStream) -> io::Result<()> {
    while tls.wants_write() {
        match tls.write_tls(&mut SocketIo(stream)) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Writes every queued record, waiting for the socket as needed.
async fn flush(tls: &mut ServerConnection, stream: &TcpStream) -> io::Result<()> {
    while tls.wants_write() {
        stream.writable().await?;
        match tls.write_tls(&mut SocketIo(stream)) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
