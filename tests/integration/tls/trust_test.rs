//! The CA bundle is the only trust root for the server certificate

use std::path::PathBuf;
use std::sync::Arc;

use embed_cert_manager::{CertManagerError, ChannelConfig, DeadlineManager, EjbcaClient};
use rcgen::{BasicConstraints, Certificate, CertificateParams, IsCa, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

struct Authority {
    cert: Certificate,
    key: KeyPair,
}

impl Authority {
    fn new(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, name);
        let cert = params.self_signed(&key).unwrap();
        Self { cert, key }
    }

    /// Server certificate for `localhost` issued by this authority
    fn issue_server(&self) -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .signed_by(&key, &self.cert, &self.key)
            .unwrap();
        let key_der = PrivatePkcs8KeyDer::from(key.serialize_der()).into();
        (cert.der().clone(), key_der)
    }
}

/// HTTPS server answering every request with 200
async fn start_tls_server(authority: &Authority) -> u16 {
    let (cert, key) = authority.issue_server();
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(tcp).await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match tls.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tls
                    .write_all(
                        b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nEJBCA",
                    )
                    .await;
                let _ = tls.shutdown().await;
            });
        }
    });

    port
}

/// Client identity plus a bundle holding only `trusted`
struct ClientFiles {
    dir: TempDir,
}

impl ClientFiles {
    fn new(trusted: &Authority) -> Self {
        let dir = TempDir::new().unwrap();
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec!["ra.example.com".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        std::fs::write(dir.path().join("ra.crt"), cert.pem()).unwrap();
        std::fs::write(dir.path().join("ra.key"), key.serialize_pem()).unwrap();
        std::fs::write(dir.path().join("chain.pem"), trusted.cert.pem()).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn client(&self, endpoint: &str) -> EjbcaClient {
        let config = ChannelConfig::builder()
            .client_identity(self.path("ra.crt"), self.path("ra.key"))
            .ca_bundle(self.path("chain.pem"))
            .server_name("localhost")
            .endpoint(endpoint)
            .unwrap()
            .build()
            .unwrap();
        EjbcaClient::new(&config).unwrap()
    }
}

#[tokio::test]
async fn test_server_chained_to_bundle_is_trusted() {
    let ca = Authority::new("Test Root");
    let port = start_tls_server(&ca).await;
    let files = ClientFiles::new(&ca);

    files
        .client(&format!("https://localhost:{port}/ejbca/ejbcaws/ejbcaws"))
        .probe(&DeadlineManager::default().get())
        .await
        .expect("probe over localhost failed");
}

#[tokio::test]
async fn test_ip_literal_endpoint_validates_server_name() {
    let ca = Authority::new("Test Root");
    let port = start_tls_server(&ca).await;
    let files = ClientFiles::new(&ca);

    let client = files.client(&format!("https://127.0.0.1:{port}/ejbca/ejbcaws/ejbcaws"));
    assert_eq!(client.channel().endpoint().host_str(), Some("localhost"));

    client
        .probe(&DeadlineManager::default().get())
        .await
        .expect("probe through IP literal failed");
}

#[tokio::test]
async fn test_server_from_other_authority_is_rejected() {
    let trusted = Authority::new("Test Root");
    let rogue = Authority::new("Rogue Root");
    let port = start_tls_server(&rogue).await;
    let files = ClientFiles::new(&trusted);

    let err = files
        .client(&format!("https://127.0.0.1:{port}/ejbca/ejbcaws/ejbcaws"))
        .probe(&DeadlineManager::default().get())
        .await
        .unwrap_err();
    assert!(matches!(err, CertManagerError::Connectivity(_)));
}
