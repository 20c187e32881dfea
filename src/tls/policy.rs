use std::fmt;

use rustls::{
    ProtocolVersion, SupportedCipherSuite, SupportedProtocolVersion,
    crypto::{
        CryptoProvider, SupportedKxGroup,
        aws_lc_rs::{cipher_suite, kx_group},
    },
    version::{TLS12, TLS13},
};

/// The priority string this policy stands for.
pub const PRIORITY: &str = "PERFORMANCE:%SAFE_RENEGOTIATION:-VERS-TLS1.0";

static VERSIONS: &[&SupportedProtocolVersion] = &[&TLS13, &TLS12];

/// The fixed cipher-suite priority policy of every listen point.
///
/// Suites are ordered cheapest first and the server's order wins. rustls never renegotiates,
/// so safe renegotiation holds for every session, and nothing older than TLS 1.2 is offered.
/// TLS 1.2 stays available next to TLS 1.3 for older clients.
/// Key exchange is ephemeral ECDH only, which keeps forward secrecy on every suite.
#[derive(Clone, Debug)]
pub struct CipherPolicy {
    suites: Vec<SupportedCipherSuite>,
    kx_groups: Vec<&'static dyn SupportedKxGroup>,
}

impl CipherPolicy {
    /// The performance-first policy.
    #[must_use]
    pub fn performance() -> Self {
        Self {
            suites: vec![
                cipher_suite::TLS13_AES_128_GCM_SHA256,
                cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
                cipher_suite::TLS13_AES_256_GCM_SHA384,
                cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
                cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
                cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
                cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ],
            kx_groups: vec![kx_group::X25519, kx_group::SECP256R1, kx_group::SECP384R1],
        }
    }

    /// The priority string, for diagnostics.
    #[must_use]
    pub const fn priority(&self) -> &'static str {
        PRIORITY
    }

    /// Protocol versions a session may negotiate, newest first.
    #[must_use]
    pub const fn versions(&self) -> &'static [&'static SupportedProtocolVersion] {
        VERSIONS
    }

    /// Whether a peer offering only `version` can ever complete a handshake.
    #[must_use]
    pub fn allows(&self, version: ProtocolVersion) -> bool {
        self.versions().iter().any(|supported| supported.version == version)
    }

    /// The suites in priority order.
    #[must_use]
    pub fn cipher_suites(&self) -> &[SupportedCipherSuite] {
        &self.suites
    }

    /// Narrows `base` to this policy's suites and key-exchange groups.
    #[must_use]
    pub fn provider(&self, base: &CryptoProvider) -> CryptoProvider {
        CryptoProvider {
            cipher_suites: self.suites.clone(),
            kx_groups: self.kx_groups.clone(),
            ..base.clone()
        }
    }
}

impl fmt::Display for CipherPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PRIORITY}")
    }
}
