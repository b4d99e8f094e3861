//! Integration tests for the mutual TLS channel

use std::path::PathBuf;

use crate::integration::{MockEjbcaServer, PATH_EJBCAWS};
use embed_cert_manager::{CertManagerError, ChannelConfig, DeadlineManager, EjbcaClient};
use rcgen::{CertificateParams, KeyPair};
use tempfile::TempDir;

/// Client identity and trust bundle written to a temporary directory
struct Credentials {
    dir: TempDir,
}

impl Credentials {
    fn generate() -> Self {
        let dir = TempDir::new().unwrap();

        let ca_key = KeyPair::generate().unwrap();
        let ca = CertificateParams::new(vec!["ca.example.com".to_string()])
            .unwrap()
            .self_signed(&ca_key)
            .unwrap();

        let client_key = KeyPair::generate().unwrap();
        let client = CertificateParams::new(vec!["ra.example.com".to_string()])
            .unwrap()
            .self_signed(&client_key)
            .unwrap();

        std::fs::write(dir.path().join("ra.crt"), client.pem()).unwrap();
        std::fs::write(dir.path().join("ra.key"), client_key.serialize_pem()).unwrap();
        std::fs::write(dir.path().join("chain.pem"), ca.pem()).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self, endpoint: &str) -> ChannelConfig {
        ChannelConfig::builder()
            .client_identity(self.path("ra.crt"), self.path("ra.key"))
            .ca_bundle(self.path("chain.pem"))
            .server_name("localhost")
            .endpoint(endpoint)
            .unwrap()
            .build()
            .unwrap()
    }
}

#[tokio::test]
async fn test_client_builds_from_credentials() {
    let creds = Credentials::generate();
    let client = EjbcaClient::new(&creds.config("https://localhost/ejbca/ejbcaws/ejbcaws"))
        .expect("client creation failed");
    assert_eq!(
        client.channel().endpoint().as_str(),
        "https://localhost/ejbca/ejbcaws/ejbcaws"
    );
}

#[tokio::test]
async fn test_ip_endpoint_routed_to_server_name() {
    let creds = Credentials::generate();
    let client =
        EjbcaClient::new(&creds.config("https://127.0.0.1:8443/ejbca/ejbcaws/ejbcaws")).unwrap();
    assert_eq!(client.channel().endpoint().host_str(), Some("localhost"));
    assert_eq!(client.channel().endpoint().port(), Some(8443));
}

#[tokio::test]
async fn test_handshake_with_plaintext_server_fails() {
    let mock = MockEjbcaServer::start().await;
    mock.mock_probe(200).await;

    let port = url::Url::parse(&mock.url()).unwrap().port().unwrap();
    let creds = Credentials::generate();
    let client = EjbcaClient::new(&creds.config(&format!(
        "https://127.0.0.1:{port}{PATH_EJBCAWS}"
    )))
    .unwrap();

    let err = client
        .probe(&DeadlineManager::default().get())
        .await
        .unwrap_err();
    assert!(matches!(err, CertManagerError::Connectivity(_)));
}

#[tokio::test]
async fn test_plain_http_endpoint_refused() {
    let mock = MockEjbcaServer::start().await;
    mock.mock_probe(200).await;

    let creds = Credentials::generate();
    let client = EjbcaClient::new(&creds.config(&mock.endpoint())).unwrap();

    let err = client
        .probe(&DeadlineManager::default().get())
        .await
        .unwrap_err();
    assert!(matches!(err, CertManagerError::Connectivity(_)));
    assert!(mock.inner().received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_trust_bundle() {
    let creds = Credentials::generate();
    std::fs::remove_file(creds.path("chain.pem")).unwrap();

    let err = EjbcaClient::new(&creds.config("https://ca.example.com/ws")).unwrap_err();
    assert!(matches!(err, CertManagerError::CredentialLoad(_)));
}
