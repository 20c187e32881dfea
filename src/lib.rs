//! # HTTPS Server
//!
//! A TLS-terminating listen point for a from-scratch HTTP/1.1 server.
//!
//! Encrypted connections are handed to the rest of the server as plain byte streams through the
//! [`runtime::listen_point::ListenPoint`] trait. [`runtime::listen_point::TlsListenPoint`] loads
//! its credentials once into a [`tls::certificate::CertificateStore`], runs a resumable
//! [`tls::handshake::Handshake`] per accepted connection and serves established connections
//! through [`tls::session::TlsConnection`].
//!
//! Refer to the included binary for a complete server.
/// Module containing the settings file
pub mod config;
/// Module containing the HTTP response writer
pub mod http;
/// Module containing listen points and the server loop
pub mod runtime;
/// Module containing the TLS layer
pub mod tls;
