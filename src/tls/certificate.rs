use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use openssl::{pkcs12::Pkcs12, x509::X509Crl};
use rustls::{
    InconsistentKeys, RootCertStore, ServerConfig,
    crypto::CryptoProvider,
    pki_types::{CertificateDer, CertificateRevocationListDer, PrivateKeyDer, PrivatePkcs8KeyDer},
    server::{ClientHello, ResolvesServerCert, WebPkiClientVerifier},
    sign::CertifiedKey,
};
use sha2::{Digest, Sha256};

use crate::tls::{
    crypto::{ContextRegistry, CryptoContext, CryptoMode},
    error::ConfigurationError,
    policy::CipherPolicy,
};

/// Encoding of a credential file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    /// Base64 with `-----BEGIN ...-----` armour.
    #[default]
    Pem,
    /// Raw DER.
    Der,
}

impl FromStr for Encoding {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pem" => Ok(Self::Pem),
            "der" => Ok(Self::Der),
            _ => Err(ConfigurationError::UnknownEncoding(s.to_string())),
        }
    }
}

/// The four kinds of certificate source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificateKind {
    /// Certificate revocation list.
    Crl,
    /// Certificate chain plus private key.
    Key,
    /// Trust anchors for client certificates.
    Trust,
    /// Password protected PKCS#12 bundle.
    Pkcs12,
}

impl FromStr for CertificateKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crl" => Ok(Self::Crl),
            "key" => Ok(Self::Key),
            "trust" => Ok(Self::Trust),
            "pkcs12" => Ok(Self::Pkcs12),
            _ => Err(ConfigurationError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for CertificateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Crl => "CRL",
            Self::Key => "KEY",
            Self::Trust => "TRUST",
            Self::Pkcs12 => "PKCS12",
        };
        f.write_str(name)
    }
}

/// Where a listen point gets its credential material from.
///
/// Each variant carries exactly the arguments its kind needs.
#[derive(Clone, PartialEq, Eq)]
pub enum CertificateSource {
    /// A revocation list checked against client certificates.
    Crl {
        /// The CRL file.
        path: PathBuf,
        /// Its encoding.
        encoding: Encoding,
    },
    /// The server certificate chain and its private key.
    Key {
        /// The certificate chain file, leaf first.
        certificate: PathBuf,
        /// The private key file.
        private_key: PathBuf,
        /// Encoding of both files.
        encoding: Encoding,
    },
    /// Anchors client certificates are verified against.
    Trust {
        /// The anchor file.
        path: PathBuf,
        /// Its encoding.
        encoding: Encoding,
    },
    /// A chain and key imported from an encrypted container.
    Pkcs12 {
        /// The container file.
        path: PathBuf,
        /// The import password.
        password: String,
        /// Its encoding.
        encoding: Encoding,
    },
}

impl fmt::Debug for CertificateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crl { path, encoding } | Self::Trust { path, encoding } => f
                .debug_struct(&self.kind().to_string())
                .field("path", path)
                .field("encoding", encoding)
                .finish(),
            Self::Key { certificate, private_key, encoding } => f
                .debug_struct("KEY")
                .field("certificate", certificate)
                .field("private_key", private_key)
                .field("encoding", encoding)
                .finish(),
            Self::Pkcs12 { path, encoding, .. } => f
                .debug_struct("PKCS12")
                .field("path", path)
                .field("password", &"<redacted>")
                .field("encoding", encoding)
                .finish(),
        }
    }
}

impl CertificateSource {
    /// Builds a source from untyped settings.
    ///
    /// `extra` is the private key path for `key` and the import password for `pkcs12`; it is
    /// ignored for the other kinds.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKind` for an unrecognized kind and `MissingArgument` when `extra` is
    /// required but absent.
    pub fn from_parts(
        kind: &str,
        encoding: Encoding,
        path: impl Into<PathBuf>,
        extra: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let kind: CertificateKind = kind.parse()?;
        let path = path.into();
        let require = |argument| extra.ok_or(ConfigurationError::MissingArgument { kind, argument });

        let source = match kind {
            CertificateKind::Crl => Self::Crl { path, encoding },
            CertificateKind::Trust => Self::Trust { path, encoding },
            CertificateKind::Key => Self::Key {
                certificate: path,
                private_key: PathBuf::from(require("a private key path")?),
                encoding,
            },
            CertificateKind::Pkcs12 => Self::Pkcs12 {
                path,
                password: require("an import password")?.to_string(),
                encoding,
            },
        };
        Ok(source)
    }

    /// The tag of this source.
    #[must_use]
    pub const fn kind(&self) -> CertificateKind {
        match self {
            Self::Crl { .. } => CertificateKind::Crl,
            Self::Key { .. } => CertificateKind::Key,
            Self::Trust { .. } => CertificateKind::Trust,
            Self::Pkcs12 { .. } => CertificateKind::Pkcs12,
        }
    }
}

/// Credential material and cipher policy of one listen point.
///
/// Immutable once built. Every session spawned from the owning listen point is created from
/// [`CertificateStore::server_config`], which carries the policy, the credentials, the optional
/// client certificate request and the compatibility relaxation.
#[derive(Debug)]
pub struct CertificateStore {
    server_config: Arc<ServerConfig>,
    policy: CipherPolicy,
    certified_key: Option<Arc<CertifiedKey>>,
    trust_anchors: usize,
    revocation_lists: usize,
    fingerprint: Option<String>,
    crypto: CryptoContext,
}

impl CertificateStore {
    /// Loads a single certificate source.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the material cannot be read, parsed or combined.
    pub fn initialize(source: &CertificateSource, mode: CryptoMode) -> Result<Self, ConfigurationError> {
        Self::from_sources(std::slice::from_ref(source), mode)
    }

    /// Layers several sources into one store, e.g. a server key plus client trust anchors and
    /// their revocation lists.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `sources` is empty, any source fails or two sources both
    /// supply the server credential.
    pub fn from_sources(sources: &[CertificateSource], mode: CryptoMode) -> Result<Self, ConfigurationError> {
        Self::from_sources_in(sources, mode, ContextRegistry::global())
    }

    pub(crate) fn from_sources_in(
        sources: &[CertificateSource],
        mode: CryptoMode,
        registry: &'static ContextRegistry,
    ) -> Result<Self, ConfigurationError> {
        if sources.is_empty() {
            return Err(ConfigurationError::NoSources);
        }
        let crypto = registry.acquire(mode);
        let policy = CipherPolicy::performance();
        let provider = Arc::new(policy.provider(crypto.provider()));

        let mut material = Material::new();
        for source in sources {
            material.load(source)?;
        }

        let certified_key = material.certified_key(&provider)?;
        let fingerprint = certified_key
            .as_ref()
            .and_then(|key| key.end_entity_cert().ok())
            .map(|leaf| hex::encode(Sha256::digest(leaf.as_ref())));

        let trust_anchors = material.roots.len();
        let revocation_lists = material.crls.len();
        let server_config = material.server_config(&provider, &policy, certified_key.clone())?;

        tracing::info!(
            sources = sources.len(),
            trust_anchors,
            revocation_lists,
            fingerprint = fingerprint.as_deref().unwrap_or("none"),
            priority = policy.priority(),
            "certificate store ready"
        );

        Ok(Self {
            server_config: Arc::new(server_config),
            policy,
            certified_key,
            trust_anchors,
            revocation_lists,
            fingerprint,
            crypto,
        })
    }

    /// The session template every connection is created from.
    #[must_use]
    pub fn server_config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.server_config)
    }

    /// Whether a server certificate and key were loaded. Without them no handshake can succeed.
    #[must_use]
    pub const fn has_server_credentials(&self) -> bool {
        self.certified_key.is_some()
    }

    /// Number of loaded trust anchors.
    #[must_use]
    pub const fn trust_anchor_count(&self) -> usize {
        self.trust_anchors
    }

    /// Number of loaded revocation lists.
    #[must_use]
    pub const fn revocation_list_count(&self) -> usize {
        self.revocation_lists
    }

    /// SHA-256 of the leaf certificate, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// The cipher policy sessions are configured with.
    #[must_use]
    pub const fn policy(&self) -> &CipherPolicy {
        &self.policy
    }

    /// The crypto context mode this store joined with.
    #[must_use]
    pub const fn crypto_mode(&self) -> CryptoMode {
        self.crypto.mode()
    }
}

/// Hands out the store's single server credential, if any.
#[derive(Debug)]
struct StoreResolver(Option<Arc<CertifiedKey>>);

impl ResolvesServerCert for StoreResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.0.clone()
    }
}

/// Raw material collected from the sources before it is assembled.
struct Material {
    chain: Vec<CertificateDer<'static>>,
    key: Option<PrivateKeyDer<'static>>,
    credential_from: Option<CertificateKind>,
    roots: RootCertStore,
    crls: Vec<CertificateRevocationListDer<'static>>,
}

impl Material {
    fn new() -> Self {
        Self {
            chain: Vec::new(),
            key: None,
            credential_from: None,
            roots: RootCertStore::empty(),
            crls: Vec::new(),
        }
    }

    fn load(&mut self, source: &CertificateSource) -> Result<(), ConfigurationError> {
        tracing::debug!(?source, "loading certificate source");
        match source {
            CertificateSource::Crl { path, encoding } => {
                self.crls.extend(load_crls(path, *encoding)?);
            }
            CertificateSource::Trust { path, encoding } => {
                for anchor in load_certificates(path, *encoding)? {
                    self.roots.add(anchor).map_err(|e| ConfigurationError::Malformed {
                        what: "trust anchor",
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                }
            }
            CertificateSource::Key { certificate, private_key, encoding } => {
                let chain = load_certificates(certificate, *encoding)?;
                let key = load_private_key(private_key, *encoding)?;
                self.set_credential(CertificateKind::Key, chain, key)?;
            }
            CertificateSource::Pkcs12 { path, password, encoding } => {
                let (chain, key) = load_pkcs12(path, password, *encoding)?;
                self.set_credential(CertificateKind::Pkcs12, chain, key)?;
            }
        }
        Ok(())
    }

    fn set_credential(
        &mut self,
        kind: CertificateKind,
        chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<(), ConfigurationError> {
        if self.credential_from.is_some() {
            return Err(ConfigurationError::DuplicateCredential(kind));
        }
        self.credential_from = Some(kind);
        self.chain = chain;
        self.key = Some(key);
        Ok(())
    }

    fn certified_key(&mut self, provider: &CryptoProvider) -> Result<Option<Arc<CertifiedKey>>, ConfigurationError> {
        let Some(key) = self.key.take() else {
            return Ok(None);
        };

        let signing_key = provider.key_provider.load_private_key(key)?;
        let certified = CertifiedKey::new(std::mem::take(&mut self.chain), signing_key);
        match certified.keys_match() {
            // Unknown means the key type cannot expose its public half; rustls then checks at use.
            Ok(()) | Err(rustls::Error::InconsistentKeys(InconsistentKeys::Unknown)) => {}
            Err(e) => return Err(ConfigurationError::KeyMismatch(e)),
        }
        Ok(Some(Arc::new(certified)))
    }

    fn server_config(
        self,
        provider: &Arc<CryptoProvider>,
        policy: &CipherPolicy,
        certified_key: Option<Arc<CertifiedKey>>,
    ) -> Result<ServerConfig, ConfigurationError> {
        let builder =
            ServerConfig::builder_with_provider(Arc::clone(provider)).with_protocol_versions(policy.versions())?;

        // A client certificate can only be requested when there is something to check it against.
        let builder = if self.roots.is_empty() {
            if !self.crls.is_empty() {
                tracing::warn!("revocation lists loaded without trust anchors; client certificates are not requested");
            }
            builder.with_no_client_auth()
        } else {
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(self.roots), Arc::clone(provider))
                .with_crls(self.crls)
                .allow_unauthenticated()
                .build()?;
            builder.with_client_cert_verifier(verifier)
        };

        let mut config = builder.with_cert_resolver(Arc::new(StoreResolver(certified_key)));
        config.ignore_client_order = true;
        // Compatibility relaxation: clients without Extended Master Secret are still served.
        config.require_ems = false;
        Ok(config)
    }
}

fn read_file(path: &Path, what: &'static str) -> Result<Vec<u8>, ConfigurationError> {
    let bytes = fs::read(path).map_err(|source| ConfigurationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(ConfigurationError::Empty {
            what,
            path: path.to_path_buf(),
        });
    }
    Ok(bytes)
}

fn malformed(what: &'static str, path: &Path, reason: impl ToString) -> ConfigurationError {
    ConfigurationError::Malformed {
        what,
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn load_certificates(path: &Path, encoding: Encoding) -> Result<Vec<CertificateDer<'static>>, ConfigurationError> {
    const WHAT: &str = "certificate";
    let bytes = read_file(path, WHAT)?;
    let certs = match encoding {
        Encoding::Der => vec![CertificateDer::from(bytes)],
        Encoding::Pem => rustls_pemfile::certs(&mut bytes.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(WHAT, path, e))?,
    };
    if certs.is_empty() {
        return Err(ConfigurationError::Empty {
            what: WHAT,
            path: path.to_path_buf(),
        });
    }
    Ok(certs)
}

fn load_private_key(path: &Path, encoding: Encoding) -> Result<PrivateKeyDer<'static>, ConfigurationError> {
    const WHAT: &str = "private key";
    let bytes = read_file(path, WHAT)?;
    match encoding {
        Encoding::Der => PrivateKeyDer::try_from(bytes).map_err(|e| malformed(WHAT, path, e)),
        Encoding::Pem => rustls_pemfile::private_key(&mut bytes.as_slice())
            .map_err(|e| malformed(WHAT, path, e))?
            .ok_or_else(|| ConfigurationError::Empty {
                what: WHAT,
                path: path.to_path_buf(),
            }),
    }
}

fn load_crls(path: &Path, encoding: Encoding) -> Result<Vec<CertificateRevocationListDer<'static>>, ConfigurationError> {
    const WHAT: &str = "revocation list";
    let bytes = read_file(path, WHAT)?;
    let crls = match encoding {
        Encoding::Der => vec![CertificateRevocationListDer::from(bytes)],
        Encoding::Pem => rustls_pemfile::crls(&mut bytes.as_slice())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(WHAT, path, e))?,
    };
    if crls.is_empty() {
        return Err(ConfigurationError::Empty {
            what: WHAT,
            path: path.to_path_buf(),
        });
    }
    for crl in &crls {
        X509Crl::from_der(crl.as_ref()).map_err(|e| malformed(WHAT, path, e))?;
    }
    Ok(crls)
}

fn load_pkcs12(
    path: &Path,
    password: &str,
    encoding: Encoding,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), ConfigurationError> {
    const WHAT: &str = "PKCS#12 container";
    let bytes = read_file(path, WHAT)?;
    let der = match encoding {
        Encoding::Der => bytes,
        Encoding::Pem => decode_pem_pkcs12(&bytes).ok_or_else(|| ConfigurationError::Empty {
            what: WHAT,
            path: path.to_path_buf(),
        })?,
    };

    let import_error = |source| ConfigurationError::Pkcs12 {
        path: path.to_path_buf(),
        source,
    };
    let parsed = Pkcs12::from_der(&der).and_then(|p12| p12.parse2(password)).map_err(import_error)?;

    let (Some(pkey), Some(leaf)) = (parsed.pkey, parsed.cert) else {
        return Err(ConfigurationError::Empty {
            what: "certificate and private key",
            path: path.to_path_buf(),
        });
    };

    let mut chain = vec![CertificateDer::from(leaf.to_der().map_err(import_error)?)];
    for ca in parsed.ca.into_iter().flatten() {
        chain.push(CertificateDer::from(ca.to_der().map_err(import_error)?));
    }
    let key = pkey.private_key_to_pkcs8().map_err(import_error)?;

    Ok((chain, PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key))))
}

/// Extracts the body of a `-----BEGIN PKCS12-----` block.
fn decode_pem_pkcs12(bytes: &[u8]) -> Option<Vec<u8>> {
    const BEGIN: &str = "-----BEGIN PKCS12-----";
    const END: &str = "-----END PKCS12-----";

    let text = std::str::from_utf8(bytes).ok()?;
    let (_, rest) = text.split_once(BEGIN)?;
    let (body, _) = rest.split_once(END)?;
    let body: String = body.split_whitespace().collect();
    openssl::base64::decode_block(&body).ok()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::tls::{
        certificate::{CertificateKind, CertificateSource, CertificateStore, Encoding, decode_pem_pkcs12},
        crypto::CryptoMode,
        error::ConfigurationError,
        testing::Fixtures,
    };

    #[test]
    fn parses_kinds_case_insensitively() {
        assert_eq!("crl".parse::<CertificateKind>().unwrap(), CertificateKind::Crl);
        assert_eq!("KEY".parse::<CertificateKind>().unwrap(), CertificateKind::Key);
        assert_eq!("Trust".parse::<CertificateKind>().unwrap(), CertificateKind::Trust);
        assert_eq!("pkcs12".parse::<CertificateKind>().unwrap(), CertificateKind::Pkcs12);
    }

    #[test]
    fn unknown_kind_should_throw_unknownkind() {
        let result = CertificateSource::from_parts("x509", Encoding::Pem, "cert.pem", None);
        assert!(
            matches!(result, Err(ConfigurationError::UnknownKind(ref kind)) if kind == "x509"),
            "Expected Err(ConfigurationError::UnknownKind), got {result:?}"
        );
    }

    #[test]
    fn unknown_encoding_should_throw_unknownencoding() {
        let result = "base64".parse::<Encoding>();
        assert!(matches!(result, Err(ConfigurationError::UnknownEncoding(_))));
    }

    #[test]
    fn key_without_key_path_should_throw_missingargument() {
        let result = CertificateSource::from_parts("key", Encoding::Pem, "cert.pem", None);
        assert!(matches!(
            result,
            Err(ConfigurationError::MissingArgument { kind: CertificateKind::Key, .. })
        ));
    }

    #[test]
    fn pkcs12_without_password_should_throw_missingargument() {
        let result = CertificateSource::from_parts("pkcs12", Encoding::Der, "bundle.p12", None);
        assert!(matches!(
            result,
            Err(ConfigurationError::MissingArgument { kind: CertificateKind::Pkcs12, .. })
        ));
    }

    #[test]
    fn debug_redacts_pkcs12_password() {
        let source = CertificateSource::from_parts("pkcs12", Encoding::Der, "bundle.p12", Some("hunter2")).unwrap();
        let printed = format!("{source:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("redacted"));
    }

    #[test]
    fn key_source_pem_loads() {
        let fixtures = Fixtures::new();
        let store = CertificateStore::initialize(&fixtures.key_source(Encoding::Pem), CryptoMode::Shared).unwrap();

        assert!(store.has_server_credentials());
        assert_eq!(store.fingerprint().map(str::len), Some(64));
        assert_eq!(store.trust_anchor_count(), 0);
        assert_eq!(store.crypto_mode(), CryptoMode::Shared);
    }

    #[test]
    fn key_source_der_loads() {
        let fixtures = Fixtures::new();
        let store = CertificateStore::initialize(&fixtures.key_source(Encoding::Der), CryptoMode::Shared).unwrap();

        assert!(store.has_server_credentials());
    }

    #[test]
    fn trust_source_loads() {
        let fixtures = Fixtures::new();
        let store = CertificateStore::initialize(&fixtures.trust_source(), CryptoMode::Shared).unwrap();

        assert!(!store.has_server_credentials());
        assert_eq!(store.trust_anchor_count(), 1);
    }

    #[test]
    fn crl_source_loads_in_both_encodings() {
        let fixtures = Fixtures::new();
        for encoding in [Encoding::Pem, Encoding::Der] {
            let store = CertificateStore::initialize(&fixtures.crl_source(encoding), CryptoMode::Shared).unwrap();
            assert_eq!(store.revocation_list_count(), 1);
        }
    }

    #[test]
    fn garbage_crl_should_throw_malformed() {
        let fixtures = Fixtures::new();
        let der = fixtures.path("garbage.crl");
        fs::write(&der, b"this is definitely not a CRL").unwrap();
        // An empty SEQUENCE, armoured like a CRL.
        let pem = fixtures.path("garbage.crl.pem");
        fs::write(&pem, "-----BEGIN X509 CRL-----\nMAA=\n-----END X509 CRL-----\n").unwrap();

        for (path, encoding) in [(der, Encoding::Der), (pem, Encoding::Pem)] {
            let result = CertificateStore::initialize(&CertificateSource::Crl { path, encoding }, CryptoMode::Shared);
            assert!(
                matches!(result, Err(ConfigurationError::Malformed { what: "revocation list", .. })),
                "Expected Err(ConfigurationError::Malformed) for {encoding:?}, got {result:?}"
            );
        }
    }

    #[test]
    fn no_sources_should_throw_nosources() {
        let result = CertificateStore::from_sources(&[], CryptoMode::Shared);
        assert!(
            matches!(result, Err(ConfigurationError::NoSources)),
            "Expected Err(ConfigurationError::NoSources), got {result:?}"
        );
    }

    #[test]
    fn pkcs12_source_loads_in_both_encodings() {
        let fixtures = Fixtures::new();
        for encoding in [Encoding::Der, Encoding::Pem] {
            let store =
                CertificateStore::initialize(&fixtures.pkcs12_source("secret", encoding), CryptoMode::Shared).unwrap();
            assert!(store.has_server_credentials());
        }
    }

    #[test]
    fn pkcs12_wrong_password_should_throw_pkcs12() {
        let fixtures = Fixtures::new();
        let result = CertificateStore::initialize(&fixtures.pkcs12_source("wrong", Encoding::Der), CryptoMode::Shared);

        assert!(
            matches!(result, Err(ConfigurationError::Pkcs12 { .. })),
            "Expected Err(ConfigurationError::Pkcs12), got {result:?}"
        );
    }

    #[test]
    fn missing_file_should_throw_read() {
        let fixtures = Fixtures::new();
        let source = CertificateSource::Trust {
            path: fixtures.path("missing.pem"),
            encoding: Encoding::Pem,
        };
        let result = CertificateStore::initialize(&source, CryptoMode::Shared);

        assert!(matches!(result, Err(ConfigurationError::Read { .. })));
    }

    #[test]
    fn pem_without_certificates_should_throw_empty() {
        let fixtures = Fixtures::new();
        let path = fixtures.path("garbage.pem");
        fs::write(&path, "not a certificate\n").unwrap();
        let source = CertificateSource::Trust { path, encoding: Encoding::Pem };

        let result = CertificateStore::initialize(&source, CryptoMode::Shared);
        assert!(matches!(result, Err(ConfigurationError::Empty { .. })));
    }

    #[test]
    fn mismatched_key_should_throw_keymismatch() {
        let fixtures = Fixtures::new();
        let other = Fixtures::new();
        let source = CertificateSource::Key {
            certificate: fixtures.path("cert.pem"),
            private_key: other.path("key.pem"),
            encoding: Encoding::Pem,
        };

        let result = CertificateStore::initialize(&source, CryptoMode::Shared);
        assert!(
            matches!(result, Err(ConfigurationError::KeyMismatch(_))),
            "Expected Err(ConfigurationError::KeyMismatch), got {result:?}"
        );
    }

    #[test]
    fn second_credential_should_throw_duplicatecredential() {
        let fixtures = Fixtures::new();
        let sources = [fixtures.key_source(Encoding::Pem), fixtures.pkcs12_source("secret", Encoding::Der)];

        let result = CertificateStore::from_sources(&sources, CryptoMode::Shared);
        assert!(matches!(
            result,
            Err(ConfigurationError::DuplicateCredential(CertificateKind::Pkcs12))
        ));
    }

    #[test]
    fn key_with_trust_requests_client_certificates() {
        let fixtures = Fixtures::new();
        let sources = [fixtures.key_source(Encoding::Pem), fixtures.trust_source()];
        let store = CertificateStore::from_sources(&sources, CryptoMode::Shared).unwrap();

        assert!(store.has_server_credentials());
        assert_eq!(store.trust_anchor_count(), 1);
    }

    #[test]
    fn key_trust_and_crl_build_one_store() {
        let fixtures = Fixtures::new();
        let sources = [
            fixtures.key_source(Encoding::Pem),
            fixtures.trust_source(),
            fixtures.crl_source(Encoding::Der),
        ];
        let store = CertificateStore::from_sources(&sources, CryptoMode::Shared).unwrap();

        assert!(store.has_server_credentials());
        assert_eq!(store.trust_anchor_count(), 1);
        assert_eq!(store.revocation_list_count(), 1);
    }

    #[test]
    fn decodes_pem_armoured_pkcs12() {
        let pem = b"-----BEGIN PKCS12-----\naGVs\nbG8=\n-----END PKCS12-----\n";
        assert_eq!(decode_pem_pkcs12(pem).unwrap(), b"hello");
        assert!(decode_pem_pkcs12(b"-----BEGIN CERTIFICATE-----").is_none());
    }
}
