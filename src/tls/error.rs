use std::{io, path::PathBuf};

use thiserror::Error;

use crate::tls::certificate::CertificateKind;

/// Represents the kind of error that can occur while building a listen point.
///
/// Any of these aborts construction entirely. Resources acquired up to that point are released
/// and no listen point is produced.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// The certificate source kind is not one of `crl`, `key`, `trust` or `pkcs12`.
    #[error("unknown certificate kind: {0}")]
    UnknownKind(String),

    /// The certificate encoding is neither `pem` nor `der`.
    #[error("unknown certificate encoding: {0}")]
    UnknownEncoding(String),

    /// A listen point was configured without any certificate source.
    #[error("no certificate source configured")]
    NoSources,

    /// A kind-dependent argument (key path, import password) was not supplied.
    #[error("{kind} certificate source requires {argument}")]
    MissingArgument {
        /// The kind that was being configured.
        kind: CertificateKind,
        /// The missing argument.
        argument: &'static str,
    },

    /// A credential file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// The file that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A credential file did not contain the expected material.
    #[error("no {what} found in {path}")]
    Empty {
        /// What was expected.
        what: &'static str,
        /// The file that was read.
        path: PathBuf,
    },

    /// A credential file contained material that could not be parsed.
    #[error("malformed {what} in {path}: {reason}")]
    Malformed {
        /// What was being parsed.
        what: &'static str,
        /// The file that was read.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The PKCS#12 container could not be opened, usually a wrong import password.
    #[error("cannot import PKCS#12 container {path}: {source}")]
    Pkcs12 {
        /// The container file.
        path: PathBuf,
        /// The error reported by OpenSSL.
        #[source]
        source: openssl::error::ErrorStack,
    },

    /// The certificate does not belong to the private key.
    #[error("certificate and private key do not match: {0}")]
    KeyMismatch(rustls::Error),

    /// More than one source supplied a server certificate and key.
    #[error("{0} source supplies a second server credential")]
    DuplicateCredential(CertificateKind),

    /// rustls refused the assembled configuration.
    #[error("TLS configuration rejected: {0}")]
    Tls(#[from] rustls::Error),

    /// The client certificate verifier could not be built from the trust anchors and CRLs.
    #[error("client certificate verifier rejected: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),

    /// The listening socket could not be bound.
    #[error("cannot bind listen point: {0}")]
    Bind(#[source] io::Error),

    /// The settings file could not be loaded or deserialized.
    #[error("cannot load settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// A fatal failure while negotiating TLS on a single connection.
///
/// Only the offending connection is affected. It has already been closed when this error is seen.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// The TLS engine rejected the peer (protocol version, cipher, certificate, alert).
    #[error("TLS negotiation failed: {0}")]
    Tls(#[from] rustls::Error),

    /// The peer closed the transport before the handshake finished.
    #[error("peer closed the connection during the handshake")]
    PeerClosed,

    /// The transport failed.
    #[error("IO error during the handshake: {0}")]
    Io(#[from] io::Error),

    /// The handshake was already rejected; stepping it again has no effect.
    #[error("handshake was already rejected")]
    Rejected,

    /// A session was requested before the handshake reached the established state.
    #[error("handshake has not been established")]
    NotEstablished,
}

/// A failure of steady-state record I/O on an established session.
///
/// The caller is expected to close the connection; nothing at this layer retries.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session has already been closed locally.
    #[error("session is closed")]
    Closed,

    /// The peer sent a close-notify.
    #[error("peer sent close-notify")]
    PeerClosed,

    /// The transport reached end of stream without a close-notify.
    #[error("transport closed without close-notify")]
    TransportClosed,

    /// The TLS engine rejected an incoming record.
    #[error("TLS record error: {0}")]
    Tls(#[from] rustls::Error),

    /// The transport failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SessionError {
    /// The negative status code a C-style host expects from a failed read or write.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Closed => -1,
            Self::PeerClosed => -2,
            Self::TransportClosed => -3,
            Self::Tls(_) => -4,
            Self::Io(_) => -5,
        }
    }
}
