//! Resumable TLS handshakes over accepted sockets.
//!
//! A [`Handshake`] never blocks. Each [`Handshake::step`] moves the negotiation as far as the
//! socket allows and reports which readiness to wait for next, so the same coordinator serves an
//! event loop that polls readiness itself and a task that simply awaits [`Handshake::drive`].
//! The deadline belongs to the caller: wrap `drive` in a timeout and drop the handshake when it
//! expires.

use std::{io, sync::Arc};

use rustls::{ServerConfig, ServerConnection};
use tokio::io::Interest;

use crate::{
    runtime::connection::{Connection, RequestFactory, SocketIo},
    tls::{
        certificate::CertificateStore,
        error::HandshakeError,
        session::{TlsConnection, flush_ready},
    },
};

/// Where a connection is in its handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    /// Accepted, no TLS state yet.
    Accepted,
    /// Negotiating.
    Handshaking,
    /// Ready to carry application data.
    Established,
    /// Failed. The socket is closed.
    Rejected,
}

/// Outcome of one handshake step.
#[derive(Debug)]
pub enum HandshakeStep {
    /// Not done yet. Step again once the socket has this readiness.
    Pending(Interest),
    /// Negotiation finished.
    Established,
    /// Negotiation failed and the connection has been closed.
    Failed(HandshakeError),
}

#[derive(Debug)]
enum Phase {
    Accepted,
    Handshaking(ServerConnection),
    Established(ServerConnection),
    Rejected,
}

/// The handshake of one accepted connection.
#[derive(Debug)]
pub struct Handshake {
    connection: Connection,
    config: Arc<ServerConfig>,
    phase: Phase,
}

impl Handshake {
    /// Starts tracking `connection`, which will negotiate with `config`.
    #[must_use]
    pub const fn new(connection: Connection, config: Arc<ServerConfig>) -> Self {
        Self {
            connection,
            config,
            phase: Phase::Accepted,
        }
    }

    /// Starts tracking `connection` with the session template of `store`.
    #[must_use]
    pub fn with_store(connection: Connection, store: &CertificateStore) -> Self {
        Self::new(connection, store.server_config())
    }

    /// The current state.
    #[must_use]
    pub const fn state(&self) -> HandshakeState {
        match self.phase {
            Phase::Accepted => HandshakeState::Accepted,
            Phase::Handshaking(_) => HandshakeState::Handshaking,
            Phase::Established(_) => HandshakeState::Established,
            Phase::Rejected => HandshakeState::Rejected,
        }
    }

    /// The connection being negotiated.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Advances the handshake without waiting.
    ///
    /// The first step creates the TLS session from the template. Once the result is
    /// `Established` or `Failed`, further steps repeat it.
    pub fn step(&mut self) -> HandshakeStep {
        match self.phase {
            Phase::Rejected => return HandshakeStep::Failed(HandshakeError::Rejected),
            Phase::Established(_) => return HandshakeStep::Established,
            Phase::Accepted => match ServerConnection::new(Arc::clone(&self.config)) {
                Ok(tls) => {
                    tracing::trace!(connection_id = %self.connection.id(), "handshake started");
                    self.phase = Phase::Handshaking(tls);
                }
                Err(e) => return HandshakeStep::Failed(self.reject(e.into())),
            },
            Phase::Handshaking(_) => {}
        }

        match self.advance() {
            Ok(Some(interest)) => HandshakeStep::Pending(interest),
            Ok(None) => {
                if let Phase::Handshaking(tls) = std::mem::replace(&mut self.phase, Phase::Rejected) {
                    self.phase = Phase::Established(tls);
                }
                HandshakeStep::Established
            }
            Err(e) => HandshakeStep::Failed(self.reject(e)),
        }
    }

    /// Steps until the handshake finishes, waiting for socket readiness in between.
    ///
    /// Dropping the future leaves the handshake where it was.
    ///
    /// # Errors
    ///
    /// Returns the failure that rejected the handshake. The connection is closed by then.
    pub async fn drive(&mut self) -> Result<(), HandshakeError> {
        loop {
            match self.step() {
                HandshakeStep::Established => return Ok(()),
                HandshakeStep::Failed(e) => return Err(e),
                HandshakeStep::Pending(interest) => {
                    let ready = match self.connection.stream() {
                        Ok(stream) => stream.ready(interest).await.map(|_| ()),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = ready {
                        return Err(self.reject(e.into()));
                    }
                }
            }
        }
    }

    /// Turns a finished handshake into a session, creating the request through `factory`.
    ///
    /// This is the only place a request is created, so it happens once per connection.
    ///
    /// # Errors
    ///
    /// Returns `NotEstablished` if the handshake has not finished. The connection is dropped.
    pub fn establish<F: RequestFactory>(self, factory: &F) -> Result<TlsConnection<F::Request>, HandshakeError> {
        let Phase::Established(tls) = self.phase else {
            return Err(HandshakeError::NotEstablished);
        };

        tracing::debug!(
            connection_id = %self.connection.id(),
            peer_addr = %self.connection.peer_addr(),
            version = ?tls.protocol_version(),
            cipher_suite = ?tls.negotiated_cipher_suite().map(|suite| suite.suite()),
            "handshake established"
        );
        let request = factory.create(&self.connection);
        Ok(TlsConnection::new(self.connection, tls, request))
    }

    /// Runs the engine until it needs the socket.
    ///
    /// `None` means the handshake is complete and everything it produced has been written.
    fn advance(&mut self) -> Result<Option<Interest>, HandshakeError> {
        let stream = self.connection.stream()?;
        let Phase::Handshaking(tls) = &mut self.phase else {
            return Err(HandshakeError::Rejected);
        };

        loop {
            while tls.wants_write() {
                match tls.write_tls(&mut SocketIo(stream)) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Some(Interest::WRITABLE)),
                    Err(e) => return Err(e.into()),
                }
            }

            if !tls.is_handshaking() {
                return Ok(None);
            }

            match tls.read_tls(&mut SocketIo(stream)) {
                Ok(0) => return Err(HandshakeError::PeerClosed),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Some(Interest::READABLE)),
                Err(e) => return Err(e.into()),
            }

            if let Err(e) = tls.process_new_packets() {
                // Best effort: tell the peer why.
                let _ = flush_ready(tls, stream);
                return Err(e.into());
            }
        }
    }

    /// Drops the TLS state and closes the socket.
    fn reject(&mut self, error: HandshakeError) -> HandshakeError {
        self.phase = Phase::Rejected;
        self.connection.close_socket();
        tracing::warn!(
            connection_id = %self.connection.id(),
            peer_addr = %self.connection.peer_addr(),
            %error,
            "handshake rejected"
        );
        error
    }
}

/// Runs a full handshake on `connection` and creates its request.
///
/// # Errors
///
/// Returns the handshake failure. No request is created in that case.
pub async fn negotiate<F: RequestFactory>(
    connection: Connection,
    store: &CertificateStore,
    factory: &F,
) -> Result<TlsConnection<F::Request>, HandshakeError> {
    let mut handshake = Handshake::with_store(connection, store);
    handshake.drive().await?;
    handshake.establish(factory)
}
