//! Certificate fixtures generated on the fly for tests.

use std::{
    fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use openssl::{pkcs12::Pkcs12, pkey::PKey, x509::X509};
use rcgen::{
    BasicConstraints, CertificateParams, CertificateRevocationListParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyIdMethod, KeyPair, KeyUsagePurpose, RevocationReason, RevokedCertParams, SerialNumber,
};
use rustls::{
    ClientConfig, RootCertStore, SupportedProtocolVersion,
    crypto::aws_lc_rs,
    pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName},
};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsConnector;

use crate::{
    runtime::connection::{Connection, RequestFactory},
    tls::certificate::{CertificateSource, Encoding},
};

pub const PKCS12_PASSWORD: &str = "secret";

const SERVER_SERIAL: u64 = 1;
const CLIENT_SERIAL: u64 = 2;
const REVOKED_CLIENT_SERIAL: u64 = 3;

/// Which client certificate a connector presents.
#[derive(Clone, Copy, Debug)]
pub enum ClientIdentity {
    /// Issued by the fixture CA and not revoked.
    Trusted,
    /// Issued by the fixture CA and listed in its revocation list.
    Revoked,
}

/// A test CA, a `localhost` server certificate and two client certificates it issued, plus a
/// revocation list that revokes one of the clients. Written in every supported form.
pub struct Fixtures {
    dir: TempDir,
    ca: CertificateDer<'static>,
    client: (CertificateDer<'static>, Vec<u8>),
    revoked_client: (CertificateDer<'static>, Vec<u8>),
}

fn leaf_params(name: &str, serial: u64, usage: ExtendedKeyUsagePurpose) -> CertificateParams {
    let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
    params.distinguished_name.push(DnType::CommonName, name);
    params.serial_number = Some(SerialNumber::from(serial));
    params.extended_key_usages = vec![usage];
    params
}

impl Fixtures {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, contents: &[u8]| fs::write(dir.path().join(name), contents).unwrap();

        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.distinguished_name.push(DnType::CommonName, "httpsserver test CA");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();
        let issuer = Issuer::new(ca_params, ca_key);
        write("ca.pem", ca_cert.pem().as_bytes());

        let key_pair = KeyPair::generate().unwrap();
        let cert = leaf_params("localhost", SERVER_SERIAL, ExtendedKeyUsagePurpose::ServerAuth)
            .signed_by(&key_pair, &issuer)
            .unwrap();
        let key_pem = key_pair.serialize_pem();
        write("cert.pem", cert.pem().as_bytes());
        write("cert.der", cert.der());
        write("key.pem", key_pem.as_bytes());
        write("key.der", &key_pair.serialize_der());

        let client = |serial| {
            let key = KeyPair::generate().unwrap();
            let cert = leaf_params("client", serial, ExtendedKeyUsagePurpose::ClientAuth)
                .signed_by(&key, &issuer)
                .unwrap();
            (cert.der().clone(), key.serialize_der())
        };
        let trusted_client = client(CLIENT_SERIAL);
        let revoked_client = client(REVOKED_CLIENT_SERIAL);

        let crl = CertificateRevocationListParams {
            this_update: rcgen::date_time_ymd(2024, 1, 1),
            next_update: rcgen::date_time_ymd(2099, 1, 1),
            crl_number: SerialNumber::from(1u64),
            issuing_distribution_point: None,
            revoked_certs: vec![RevokedCertParams {
                serial_number: SerialNumber::from(REVOKED_CLIENT_SERIAL),
                revocation_time: rcgen::date_time_ymd(2024, 1, 1),
                reason_code: Some(RevocationReason::KeyCompromise),
                invalidity_date: None,
            }],
            key_identifier_method: KeyIdMethod::Sha256,
        }
        .signed_by(&issuer)
        .unwrap();
        write("crl.pem", crl.pem().unwrap().as_bytes());
        write("crl.der", crl.der());

        let p12 = Pkcs12::builder()
            .name("localhost")
            .pkey(&PKey::private_key_from_pem(key_pem.as_bytes()).unwrap())
            .cert(&X509::from_pem(cert.pem().as_bytes()).unwrap())
            .build2(PKCS12_PASSWORD)
            .unwrap()
            .to_der()
            .unwrap();
        let armoured = format!(
            "-----BEGIN PKCS12-----\n{}\n-----END PKCS12-----\n",
            openssl::base64::encode_block(&p12)
        );
        write("bundle.p12", &p12);
        write("bundle.p12.pem", armoured.as_bytes());

        Self {
            dir,
            ca: ca_cert.der().clone(),
            client: trusted_client,
            revoked_client,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn key_source(&self, encoding: Encoding) -> CertificateSource {
        let (certificate, private_key) = match encoding {
            Encoding::Pem => ("cert.pem", "key.pem"),
            Encoding::Der => ("cert.der", "key.der"),
        };
        CertificateSource::Key {
            certificate: self.path(certificate),
            private_key: self.path(private_key),
            encoding,
        }
    }

    /// The fixture CA as a trust anchor.
    pub fn trust_source(&self) -> CertificateSource {
        CertificateSource::Trust {
            path: self.path("ca.pem"),
            encoding: Encoding::Pem,
        }
    }

    pub fn crl_source(&self, encoding: Encoding) -> CertificateSource {
        let path = match encoding {
            Encoding::Pem => self.path("crl.pem"),
            Encoding::Der => self.path("crl.der"),
        };
        CertificateSource::Crl { path, encoding }
    }

    pub fn pkcs12_source(&self, password: &str, encoding: Encoding) -> CertificateSource {
        let path = match encoding {
            Encoding::Der => self.path("bundle.p12"),
            Encoding::Pem => self.path("bundle.p12.pem"),
        };
        CertificateSource::Pkcs12 {
            path,
            password: password.to_string(),
            encoding,
        }
    }

    fn roots(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.ca.clone()).unwrap();
        roots
    }

    /// A client that trusts the fixture CA.
    pub fn connector(&self) -> TlsConnector {
        self.connector_with_versions(rustls::DEFAULT_VERSIONS)
    }

    /// A client that trusts the fixture CA and offers only `versions`.
    pub fn connector_with_versions(&self, versions: &[&'static SupportedProtocolVersion]) -> TlsConnector {
        let config = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
            .with_protocol_versions(versions)
            .unwrap()
            .with_root_certificates(self.roots())
            .with_no_client_auth();
        TlsConnector::from(Arc::new(config))
    }

    /// A client that trusts the fixture CA and presents a client certificate.
    pub fn connector_as(&self, identity: ClientIdentity) -> TlsConnector {
        let (cert, key) = match identity {
            ClientIdentity::Trusted => &self.client,
            ClientIdentity::Revoked => &self.revoked_client,
        };
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.clone()));
        let config = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_root_certificates(self.roots())
            .with_client_auth_cert(vec![cert.clone()], key)
            .unwrap();
        TlsConnector::from(Arc::new(config))
    }
}

pub fn server_name() -> ServerName<'static> {
    ServerName::try_from("localhost").unwrap()
}

/// A TLS 1.0 ClientHello offering a single RSA suite and no extensions.
pub fn tls10_client_hello() -> Vec<u8> {
    let mut hello = vec![
        0x16, 0x03, 0x01, 0x00, 0x2d, // record: handshake, TLS 1.0, 45 bytes
        0x01, 0x00, 0x00, 0x29, // client_hello, 41 bytes
        0x03, 0x01, // client_version TLS 1.0
    ];
    hello.extend_from_slice(&[0x42; 32]);
    hello.extend_from_slice(&[
        0x00, // session id
        0x00, 0x02, 0x00, 0x2f, // TLS_RSA_WITH_AES_128_CBC_SHA
        0x01, 0x00, // null compression
    ]);
    hello
}

/// A connected loopback pair: the client socket and the accepted server side.
pub async fn socket_pair() -> (TcpStream, Connection) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let (stream, peer_addr) = accepted.unwrap();
    (client.unwrap(), Connection::from_socket(stream, peer_addr))
}

/// Counts how many requests were created and how many were dropped.
#[derive(Clone, Debug, Default)]
pub struct CountingFactory {
    created: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl CountingFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct CountedRequest {
    released: Arc<AtomicUsize>,
}

impl Drop for CountedRequest {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl RequestFactory for CountingFactory {
    type Request = CountedRequest;

    fn create(&self, _connection: &Connection) -> CountedRequest {
        self.created.fetch_add(1, Ordering::SeqCst);
        CountedRequest {
            released: Arc::clone(&self.released),
        }
    }
}
