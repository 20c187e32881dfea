use std::{error::Error, fmt, io, net::SocketAddr};

use tokio::net::{TcpListener, ToSocketAddrs};

use crate::{
    runtime::connection::{Connection, RequestFactory},
    tls::{
        certificate::{CertificateSource, CertificateStore},
        crypto::{ContextRegistry, CryptoMode},
        error::{ConfigurationError, SessionError},
        handshake::negotiate,
        session::TlsConnection,
    },
};

/// A bound endpoint and the operations the server drives its connections through.
///
/// The server only ever sees connections through these operations, so a plaintext and an
/// encrypted listen point are interchangeable.
pub trait ListenPoint: Send + Sync + 'static {
    /// A raw accepted connection that still has to be established.
    type Incoming: Send + 'static;
    /// An established connection.
    type Connection: Send + 'static;
    /// What `read` and `write` fail with.
    type Error: Error + Send + 'static;

    /// Waits for the next raw connection.
    fn accept_raw(&self) -> impl Future<Output = io::Result<Self::Incoming>> + Send;

    /// Makes a raw connection usable. `None` means it was rejected and has been closed.
    fn establish(&self, incoming: Self::Incoming) -> impl Future<Output = Option<Self::Connection>> + Send;

    /// Accepts and establishes one connection.
    ///
    /// # Errors
    ///
    /// Throws an `io::Error` if accepting fails. A rejected connection is `Ok(None)`.
    fn accept(&self) -> impl Future<Output = io::Result<Option<Self::Connection>>> + Send {
        async {
            let incoming = self.accept_raw().await?;
            Ok(self.establish(incoming).await)
        }
    }

    /// Reads application data from `connection`.
    fn read(
        &self,
        connection: &mut Self::Connection,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    /// Writes all of `buf` to `connection`.
    fn write(
        &self,
        connection: &mut Self::Connection,
        buf: &[u8],
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send;

    /// Closes `connection`. Closing twice is a no-op.
    fn close(&self, connection: &mut Self::Connection);

    /// Releases the listen point. Freeing twice is a no-op.
    fn free(&mut self);
}

/// What a TLS listen point is built from.
#[derive(Debug, Clone)]
pub struct TlsListenPointOptions {
    /// Certificate sources, layered into one store.
    pub sources: Vec<CertificateSource>,
    /// Whether freeing this listen point may tear down the process-wide crypto context.
    pub crypto_mode: CryptoMode,
}

/// A listen point that terminates TLS before handing connections to the server.
pub struct TlsListenPoint<F: RequestFactory> {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    store: Option<CertificateStore>,
    factory: F,
}

impl<F: RequestFactory> TlsListenPoint<F> {
    /// Binds `addr` and loads the certificate store.
    ///
    /// # Errors
    ///
    /// Throws a `ConfigurationError` if binding fails or the store cannot be built. The listening
    /// socket is closed again in the latter case.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        options: TlsListenPointOptions,
        factory: F,
    ) -> Result<Self, ConfigurationError> {
        Self::bind_in(addr, options, factory, ContextRegistry::global()).await
    }

    pub(crate) async fn bind_in(
        addr: impl ToSocketAddrs,
        options: TlsListenPointOptions,
        factory: F,
        registry: &'static ContextRegistry,
    ) -> Result<Self, ConfigurationError> {
        let listener = TcpListener::bind(addr).await.map_err(ConfigurationError::Bind)?;
        let local_addr = listener.local_addr().map_err(ConfigurationError::Bind)?;

        let store = match CertificateStore::from_sources_in(&options.sources, options.crypto_mode, registry) {
            Ok(store) => store,
            Err(e) => {
                drop(listener);
                tracing::error!(%local_addr, error = %e, "listen point configuration failed");
                return Err(e);
            }
        };

        tracing::info!(%local_addr, mode = ?options.crypto_mode, "TLS listen point bound");
        Ok(Self {
            listener: Some(listener),
            local_addr,
            store: Some(store),
            factory,
        })
    }

    /// The bound address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The certificate store, until the listen point is freed.
    #[must_use]
    pub const fn store(&self) -> Option<&CertificateStore> {
        self.store.as_ref()
    }

    /// The request factory.
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F: RequestFactory> ListenPoint for TlsListenPoint<F> {
    type Incoming = Connection;
    type Connection = TlsConnection<F::Request>;
    type Error = SessionError;

    async fn accept_raw(&self) -> io::Result<Connection> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        let (stream, peer_addr) = listener.accept().await?;
        Ok(Connection::from_socket(stream, peer_addr))
    }

    async fn establish(&self, incoming: Connection) -> Option<TlsConnection<F::Request>> {
        let store = self.store.as_ref()?;
        negotiate(incoming, store, &self.factory).await.ok()
    }

    async fn read(&self, connection: &mut TlsConnection<F::Request>, buf: &mut [u8]) -> Result<usize, SessionError> {
        connection.read(buf).await
    }

    async fn write(&self, connection: &mut TlsConnection<F::Request>, buf: &[u8]) -> Result<usize, SessionError> {
        connection.write(buf).await
    }

    fn close(&self, connection: &mut TlsConnection<F::Request>) {
        connection.close();
    }

    fn free(&mut self) {
        // The store goes first, then the socket.
        if let Some(store) = self.store.take() {
            drop(store);
            tracing::debug!(local_addr = %self.local_addr, "certificate store released");
        }
        if let Some(listener) = self.listener.take() {
            drop(listener);
            tracing::info!(local_addr = %self.local_addr, "TLS listen point closed");
        }
    }
}

impl<F: RequestFactory> Drop for TlsListenPoint<F> {
    fn drop(&mut self) {
        self.free();
    }
}

impl<F: RequestFactory> fmt::Debug for TlsListenPoint<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsListenPoint")
            .field("local_addr", &self.local_addr)
            .field("listening", &self.listener.is_some())
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
