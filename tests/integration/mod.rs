//! Integration test utilities and helpers
//!
//! This module provides common test infrastructure for the integration
//! tests: a mock EJBCA web service, certificate and CSR fixtures, and a
//! scripted stand-in for the remote channel.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::prelude::*;
use embed_cert_manager::client::EjbcaClient;
use embed_cert_manager::error::{CertManagerError, Result};
use embed_cert_manager::remote::{CommandOutput, RemoteExecutor, SshTarget};
use embed_cert_manager::tls::Channel;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Web service path used by EJBCA.
pub const PATH_EJBCAWS: &str = "/ejbca/ejbcaws/ejbcaws";

pub const CONTENT_TYPE_XML: &str = "text/xml; charset=utf-8";

/// Mock EJBCA server builder for integration tests
pub struct MockEjbcaServer {
    server: MockServer,
}

impl MockEjbcaServer {
    /// Create a new mock server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get the base URL of the mock server
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Full web service URL
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.server.uri(), PATH_EJBCAWS)
    }

    /// Get a reference to the inner MockServer for custom mocking
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// Client talking plain HTTP to the mock
    pub fn client(&self) -> EjbcaClient {
        let endpoint = url::Url::parse(&self.endpoint()).unwrap();
        EjbcaClient::with_channel(Channel::from_client(reqwest::Client::new(), endpoint))
    }

    /// Mock the connectivity probe
    pub async fn mock_probe(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(status).set_body_string("EJBCA"))
            .mount(&self.server)
            .await;
    }

    /// Mock a findCerts answer
    pub async fn mock_find_certs(&self, status: u16, body: String) {
        Mock::given(method("POST"))
            .and(path(PATH_EJBCAWS))
            .and(body_string_contains("findCerts"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(body)
                    .insert_header("Content-Type", CONTENT_TYPE_XML),
            )
            .mount(&self.server)
            .await;
    }

    /// Mock a pkcs10Request answer, expecting exactly `calls` requests
    pub async fn mock_enroll(&self, status: u16, body: String, calls: u64) {
        Mock::given(method("POST"))
            .and(path(PATH_EJBCAWS))
            .and(body_string_contains("pkcs10Request"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(body)
                    .insert_header("Content-Type", CONTENT_TYPE_XML),
            )
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Bodies of all POST requests received so far
    pub async fn posted_bodies(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == "POST")
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }
}

/// Test fixture helpers
pub mod fixtures {
    use super::*;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
    use time::{Duration, OffsetDateTime};

    fn params(cn: &str) -> CertificateParams {
        let mut params = CertificateParams::new(vec![cn.to_string()]).unwrap();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, cn);
        params.distinguished_name = dn;
        params
    }

    /// Self-signed certificate DER valid from `from_days` to `to_days`
    /// relative to now
    pub fn cert_der(cn: &str, from_days: i64, to_days: i64) -> Vec<u8> {
        let key = KeyPair::generate().unwrap();
        let now = OffsetDateTime::now_utc();
        let mut params = params(cn);
        params.not_before = now + Duration::days(from_days);
        params.not_after = now + Duration::days(to_days);
        params.self_signed(&key).unwrap().der().to_vec()
    }

    /// A freshly signed PEM CSR
    pub fn csr_pem(cn: &str) -> String {
        let key = KeyPair::generate().unwrap();
        params(cn).serialize_request(&key).unwrap().pem().unwrap()
    }

    /// Certificate data as EJBCA sends it: base64 of base64 DER
    pub fn double_base64(der: &[u8]) -> String {
        BASE64_STANDARD.encode(BASE64_STANDARD.encode(der))
    }

    fn envelope(body: &str) -> String {
        format!(
            r#"<?xml version='1.0' encoding='UTF-8'?><S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body>{body}</S:Body></S:Envelope>"#
        )
    }

    /// pkcs10Request answer carrying `data`
    pub fn enroll_response(data: &str) -> String {
        envelope(&format!(
            r#"<ns2:pkcs10RequestResponse xmlns:ns2="http://ws.protocol.core.ejbca.org/"><return><data>{data}</data><responseType>CERTIFICATE</responseType></return></ns2:pkcs10RequestResponse>"#
        ))
    }

    /// findCerts answer with one `return` per payload
    pub fn find_certs_response(payloads: &[String]) -> String {
        let entries: String = payloads
            .iter()
            .map(|p| {
                format!(
                    "<return><certificateData>{p}</certificateData><type>X509</type></return>"
                )
            })
            .collect();
        envelope(&format!(
            r#"<ns2:findCertsResponse xmlns:ns2="http://ws.protocol.core.ejbca.org/">{entries}</ns2:findCertsResponse>"#
        ))
    }

    /// SOAP 1.1 fault
    pub fn soap_fault(code: &str, message: &str) -> String {
        envelope(&format!(
            "<S:Fault><faultcode>{code}</faultcode><faultstring>{message}</faultstring></S:Fault>"
        ))
    }
}

/// In-memory [`RemoteExecutor`] that replays canned answers
///
/// Scripts are recorded in the order they arrive. Each call pops the next
/// queued answer; an empty queue answers with empty output.
#[derive(Default)]
pub struct ScriptedExecutor {
    answers: Mutex<VecDeque<Result<CommandOutput>>>,
    scripts: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer with `stdout`
    pub fn then_output(self, stdout: impl Into<String>) -> Self {
        self.answers.lock().unwrap().push_back(Ok(CommandOutput {
            stdout: stdout.into().into_bytes(),
            stderr: Vec::new(),
        }));
        self
    }

    /// Queue a failing answer
    pub fn then_fail(self, message: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .push_back(Err(CertManagerError::remote_command("scripted", message)));
        self
    }

    /// Scripts received so far
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for ScriptedExecutor {
    async fn run(&self, _target: &SshTarget, script: &str) -> Result<CommandOutput> {
        self.scripts.lock().unwrap().push(script.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let mock_server = MockEjbcaServer::start().await;
        assert!(mock_server.url().starts_with("http://"));
        assert!(mock_server.endpoint().ends_with(PATH_EJBCAWS));
    }

    #[test]
    fn test_fixtures_generate_valid_base64() {
        let der = fixtures::cert_der("device01", -1, 1);
        let once = BASE64_STANDARD.decode(fixtures::double_base64(&der)).unwrap();
        assert_eq!(BASE64_STANDARD.decode(once).unwrap(), der);
    }
}
