//! Settings of the HTTPS server.
//!
//! Settings come from a TOML, YAML or JSON file and can be overridden by `HTTPS__*` environment
//! variables, e.g. `HTTPS__BIND_ADDRESS=0.0.0.0:443`.
//!
//! ```toml
//! bind_address = "127.0.0.1:8443"
//! crypto_mode = "owned"
//!
//! [[certificates]]
//! kind = "key"
//! path = "certs/server.pem"
//! key_path = "certs/server.key"
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::{
    runtime::listen_point::TlsListenPointOptions,
    tls::{
        certificate::{CertificateKind, CertificateSource, Encoding},
        crypto::CryptoMode,
        error::ConfigurationError,
    },
};

const ENV_PREFIX: &str = "HTTPS";
const ENV_SEPARATOR: &str = "__";

fn default_bind_address() -> String {
    "127.0.0.1:8443".to_string()
}

/// Top-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Address the listen point binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Required. There is no default.
    pub crypto_mode: CryptoMode,
    /// Certificate sources, layered in order.
    #[serde(default)]
    pub certificates: Vec<CertificateSettings>,
}

/// One certificate source as written in the settings file.
#[derive(Clone, Deserialize)]
pub struct CertificateSettings {
    /// `crl`, `key`, `trust` or `pkcs12`.
    pub kind: String,
    /// `pem` (default) or `der`.
    #[serde(default)]
    pub encoding: Option<String>,
    /// The certificate, CRL, anchor or container file.
    pub path: PathBuf,
    /// Private key file, for `key`.
    #[serde(default)]
    pub key_path: Option<String>,
    /// Import password, for `pkcs12`.
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for CertificateSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateSettings")
            .field("kind", &self.kind)
            .field("encoding", &self.encoding)
            .field("path", &self.path)
            .field("key_path", &self.key_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CertificateSettings {
    /// Turns the settings into a typed source.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind`, `UnknownEncoding` or `MissingArgument`.
    pub fn source(&self) -> Result<CertificateSource, ConfigurationError> {
        let encoding = match &self.encoding {
            Some(encoding) => encoding.parse()?,
            None => Encoding::default(),
        };
        let extra = match self.kind.parse::<CertificateKind>()? {
            CertificateKind::Key => self.key_path.as_deref(),
            CertificateKind::Pkcs12 => self.password.as_deref(),
            CertificateKind::Crl | CertificateKind::Trust => None,
        };
        CertificateSource::from_parts(&self.kind, encoding, &self.path, extra)
    }
}

impl ServerSettings {
    /// Loads settings from `path`, then applies `HTTPS__*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `Load` if the file is missing or malformed or a required setting is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Parses settings from a TOML string, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `Load` if the string is malformed or a required setting is absent.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigurationError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// The listen point options these settings describe.
    ///
    /// # Errors
    ///
    /// Returns the first certificate entry that cannot be turned into a source.
    pub fn options(&self) -> Result<TlsListenPointOptions, ConfigurationError> {
        let sources = self
            .certificates
            .iter()
            .map(CertificateSettings::source)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TlsListenPointOptions {
            sources,
            crypto_mode: self.crypto_mode,
        })
    }
}
