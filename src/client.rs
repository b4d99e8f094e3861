//! EJBCA web service client.
//!
//! This module provides the `EjbcaClient` struct that performs the three
//! calls a renewal needs: a connectivity probe, a certificate lookup and a
//! PKCS#10 enrollment.

use std::time::SystemTime;

use reqwest::header::CONTENT_TYPE;

use crate::deadline::Deadline;
use crate::error::{CertManagerError, Result};
use crate::operations::{enroll, find_certs};
use crate::soap::{CONTENT_TYPE_XML, SoapRequest, check_fault};
use crate::tls::{Channel, ChannelConfig, build_channel};
use crate::types::{CertificateCandidate, EnrollmentRequest};

/// Client for one EJBCA web service endpoint.
///
/// # Example
///
/// ```no_run
/// use embed_cert_manager::client::EjbcaClient;
/// use embed_cert_manager::deadline::DeadlineManager;
/// use embed_cert_manager::tls::ChannelConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ChannelConfig::builder()
///     .client_identity("/etc/ecm/client.crt", "/etc/ecm/client.key")
///     .ca_bundle("/etc/ecm/ca-chain.pem")
///     .server_name("ca.example.com")
///     .endpoint("https://ca.example.com/ejbca/ejbcaws/ejbcaws")?
///     .build()?;
///
/// let client = EjbcaClient::new(&config)?;
/// let deadlines = DeadlineManager::default();
///
/// client.probe(&deadlines.get()).await?;
/// let certs = client.find_certs("device01", false, &deadlines.get()).await?;
/// println!("CA holds {} certificate(s)", certs.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EjbcaClient {
    channel: Channel,
}

impl EjbcaClient {
    /// Build the mutually authenticated channel and wrap it.
    ///
    /// # Errors
    ///
    /// Returns `CredentialLoad` if the client identity or CA bundle cannot
    /// be loaded.
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        let channel = build_channel(config)?;
        Ok(Self { channel })
    }

    /// Use an existing channel.
    pub fn with_channel(channel: Channel) -> Self {
        Self { channel }
    }

    /// The channel requests go through.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Check that the CA host answers at all.
    ///
    /// Issues `GET /` on the endpoint origin and expects a 2xx status.
    pub async fn probe(&self, deadline: &Deadline) -> Result<()> {
        let url = self.channel.origin();
        tracing::info!("Testing connection to {}", url);

        let response = deadline
            .run(async {
                self.channel
                    .http()
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| CertManagerError::connectivity(format!("GET {}: {}", url, e)))
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CertManagerError::connectivity(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        tracing::debug!("Probe {}", status);
        Ok(())
    }

    /// Look up the certificates the CA holds for `identity`.
    pub async fn find_certs(
        &self,
        identity: &str,
        only_valid: bool,
        deadline: &Deadline,
    ) -> Result<Vec<CertificateCandidate>> {
        let request = find_certs::build_request(identity, only_valid);
        let body = self.call(&request, deadline).await?;
        let certs = find_certs::parse_response(&body)?;
        tracing::info!("findCerts returned {} certificate(s) for {}", certs.len(), identity);
        Ok(certs)
    }

    /// Submit a PKCS#10 request and return the validated certificate.
    pub async fn enroll(
        &self,
        request: &EnrollmentRequest,
        deadline: &Deadline,
    ) -> Result<CertificateCandidate> {
        let envelope = enroll::build_request(request)?;
        let body = self.call(&envelope, deadline).await?;
        let cert = enroll::parse_response(&body)?;
        enroll::validate_issued(&cert, &request.username, SystemTime::now())?;
        Ok(cert)
    }

    /// POST an envelope and return the response document.
    async fn call(&self, request: &SoapRequest, deadline: &Deadline) -> Result<String> {
        let url = self.channel.endpoint().clone();
        tracing::debug!("POST {} ({})", url, request.operation());

        let body = request.to_xml();
        let (status, text) = deadline
            .run(async {
                let response = self
                    .channel
                    .http()
                    .post(url.clone())
                    .header(CONTENT_TYPE, CONTENT_TYPE_XML)
                    .header("SOAPAction", "")
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| {
                        CertManagerError::connectivity(format!(
                            "{} to {}: {}",
                            request.operation(),
                            url,
                            e
                        ))
                    })?;

                let status = response.status();
                let text = response.text().await.map_err(|e| {
                    CertManagerError::connectivity(format!(
                        "Failed to read {} response: {}",
                        request.operation(),
                        e
                    ))
                })?;
                Ok((status, text))
            })
            .await?;

        self.handle_error_response(request, status, &text)?;
        Ok(text)
    }

    /// Map HTTP error statuses to protocol errors.
    ///
    /// Servers report SOAP faults with status 500, so a fault in the body
    /// takes precedence over the bare status.
    fn handle_error_response(
        &self,
        request: &SoapRequest,
        status: reqwest::StatusCode,
        body: &str,
    ) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }

        if body.contains("Fault") {
            check_fault(body)?;
        }

        Err(CertManagerError::protocol(format!(
            "{} returned HTTP {}",
            request.operation(),
            status
        )))
    }
}
