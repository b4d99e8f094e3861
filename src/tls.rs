//! Mutual TLS channel to the CA.
//!
//! The CA endpoint is reached over HTTPS with a client certificate. Only the
//! configured CA bundle is trusted for the server certificate; the platform
//! and webpki roots are never consulted.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use url::{Host, Url};

use crate::error::{CertManagerError, Result};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Inputs for [`build_channel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Client certificate chain (PEM).
    pub client_cert: PathBuf,

    /// Client private key (PEM; PKCS#8, PKCS#1 or SEC1).
    pub client_key: PathBuf,

    /// CA bundle used to validate the server certificate (PEM).
    pub ca_bundle: PathBuf,

    /// Name expected in the server certificate, also sent as SNI.
    pub server_name: String,

    /// Enrollment endpoint URL.
    pub endpoint: Url,

    /// Address to dial instead of resolving the server name.
    pub address: Option<IpAddr>,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl ChannelConfig {
    /// Create a new channel configuration builder.
    pub fn builder() -> ChannelConfigBuilder {
        ChannelConfigBuilder::default()
    }

    /// Fill in the dial address when the endpoint names a different host.
    ///
    /// The endpoint host is resolved and its first address pinned, so the
    /// connection goes where the URL points while the certificate is still
    /// checked against `server_name`.
    pub async fn resolve_dial_address(mut self) -> Result<Self> {
        if self.address.is_some() {
            return Ok(self);
        }
        let Some(Host::Domain(domain)) = self.endpoint.host() else {
            return Ok(self);
        };
        if domain.eq_ignore_ascii_case(&self.server_name) {
            return Ok(self);
        }

        let port = self.endpoint.port_or_known_default().unwrap_or(443);
        let addr = tokio::net::lookup_host((domain, port))
            .await
            .map_err(|e| CertManagerError::connectivity(format!("Failed to resolve {domain}: {e}")))?
            .next()
            .ok_or_else(|| CertManagerError::connectivity(format!("{domain} has no addresses")))?;

        tracing::debug!("Dialing {} ({}) as {}", domain, addr.ip(), self.server_name);
        self.address = Some(addr.ip());
        Ok(self)
    }
}

/// Builder for [`ChannelConfig`].
#[derive(Debug, Default)]
pub struct ChannelConfigBuilder {
    client_cert: Option<PathBuf>,
    client_key: Option<PathBuf>,
    ca_bundle: Option<PathBuf>,
    server_name: Option<String>,
    endpoint: Option<Url>,
    address: Option<IpAddr>,
    timeout: Option<Duration>,
}

impl ChannelConfigBuilder {
    /// Set the client certificate and key files.
    pub fn client_identity(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    /// Set the CA bundle file.
    pub fn ca_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_bundle = Some(path.into());
        self
    }

    /// Set the expected server name.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Set the endpoint URL.
    pub fn endpoint(mut self, url: &str) -> Result<Self> {
        self.endpoint = Some(Url::parse(url)?);
        Ok(self)
    }

    /// Dial this address instead of resolving the server name.
    pub fn address(mut self, addr: IpAddr) -> Self {
        self.address = Some(addr);
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ChannelConfig> {
        let endpoint = self
            .endpoint
            .ok_or_else(|| CertManagerError::config("endpoint URL is required"))?;
        let server_name = match self.server_name {
            Some(name) if !name.is_empty() => name,
            _ => endpoint
                .host_str()
                .map(str::to_string)
                .ok_or_else(|| CertManagerError::config("server name is required"))?,
        };

        Ok(ChannelConfig {
            client_cert: self
                .client_cert
                .ok_or_else(|| CertManagerError::config("client certificate is required"))?,
            client_key: self
                .client_key
                .ok_or_else(|| CertManagerError::config("client key is required"))?,
            ca_bundle: self
                .ca_bundle
                .ok_or_else(|| CertManagerError::config("CA bundle is required"))?,
            server_name,
            endpoint,
            address: self.address,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }
}

/// An HTTP client bound to one CA endpoint.
#[derive(Debug, Clone)]
pub struct Channel {
    http: reqwest::Client,
    endpoint: Url,
}

impl Channel {
    /// Wrap an already configured client.
    ///
    /// The caller owns the TLS setup of `http`; [`build_channel`] is the
    /// mutually authenticated way to obtain a channel.
    pub fn from_client(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The URL requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Scheme, host and port of the endpoint with path `/`.
    pub fn origin(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

/// Build the mutually authenticated channel described by `config`.
pub fn build_channel(config: &ChannelConfig) -> Result<Channel> {
    let cert_pem = read_credential(&config.client_cert, "client certificate")?;
    let key_pem = read_credential(&config.client_key, "client key")?;
    let bundle_pem = read_credential(&config.ca_bundle, "CA bundle")?;

    // Parse up front for precise errors; reqwest reports them all as one kind.
    parse_pem_certificates(&cert_pem).map_err(|e| {
        CertManagerError::credential_load(format!(
            "{}: {}",
            config.client_cert.display(),
            e
        ))
    })?;
    parse_pem_private_key(&key_pem).map_err(|e| {
        CertManagerError::credential_load(format!("{}: {}", config.client_key.display(), e))
    })?;
    let roots = parse_pem_certificates(&bundle_pem).map_err(|e| {
        CertManagerError::credential_load(format!("{}: {}", config.ca_bundle.display(), e))
    })?;

    let (endpoint, pinned) =
        route_endpoint(&config.endpoint, &config.server_name, config.address)?;

    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .tls_built_in_root_certs(false)
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .https_only(true)
        .user_agent(crate::USER_AGENT)
        .timeout(config.timeout);

    for root in &roots {
        let cert = reqwest::Certificate::from_der(root.as_ref()).map_err(|e| {
            CertManagerError::credential_load(format!("Failed to add CA certificate: {}", e))
        })?;
        builder = builder.add_root_certificate(cert);
    }

    builder = builder.identity(build_identity(&cert_pem, &key_pem)?);

    if let Some(addr) = pinned {
        tracing::debug!("Resolving {} to {}", config.server_name, addr);
        builder = builder.resolve(&config.server_name, addr);
    }

    let http = builder
        .build()
        .map_err(|e| CertManagerError::connectivity(format!("Failed to build HTTP client: {}", e)))?;

    tracing::debug!(
        "mTLS channel to {} ready ({} trusted root(s))",
        endpoint,
        roots.len()
    );

    Ok(Channel { http, endpoint })
}

/// Point the endpoint at the expected server name.
///
/// Returns the URL to request and, when the original host was an IP literal
/// or a dial address is configured, the socket address the name must resolve
/// to. A domain other than `server_name` without a dial address is refused;
/// see [`ChannelConfig::resolve_dial_address`].
pub fn route_endpoint(
    endpoint: &Url,
    server_name: &str,
    address: Option<IpAddr>,
) -> Result<(Url, Option<SocketAddr>)> {
    let port = endpoint
        .port_or_known_default()
        .ok_or_else(|| CertManagerError::config(format!("no port for {endpoint}")))?;

    let literal = match endpoint.host() {
        Some(Host::Ipv4(ip)) => Some(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => Some(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            if address.is_none() && !domain.eq_ignore_ascii_case(server_name) {
                return Err(CertManagerError::config(format!(
                    "endpoint host {domain} differs from server name {server_name} and no dial address is set"
                )));
            }
            None
        }
        None => return Err(CertManagerError::config(format!("no host in {endpoint}"))),
    };

    let Some(ip) = address.or(literal) else {
        return Ok((endpoint.clone(), None));
    };

    let mut url = endpoint.clone();
    url.set_host(Some(server_name))?;
    Ok((url, Some(SocketAddr::new(ip, port))))
}

fn read_credential(path: &Path, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        CertManagerError::credential_load(format!(
            "Failed to read {} {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

fn build_identity(cert_pem: &[u8], key_pem: &[u8]) -> Result<reqwest::Identity> {
    let mut pem_data = cert_pem.to_vec();
    pem_data.extend_from_slice(b"\n");
    pem_data.extend_from_slice(key_pem);

    reqwest::Identity::from_pem(&pem_data).map_err(|e| {
        CertManagerError::credential_load(format!("Failed to create client identity: {}", e))
    })
}

/// Parse PEM-encoded certificates.
pub fn parse_pem_certificates(pem_data: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = std::io::BufReader::new(pem_data);
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .filter_map(|result| result.ok())
        .collect();

    if certs.is_empty() {
        return Err(CertManagerError::credential_load(
            "No certificates found in PEM data",
        ));
    }

    Ok(certs)
}

/// Parse the first private key in PEM data.
pub fn parse_pem_private_key(pem_data: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let mut reader = std::io::BufReader::new(pem_data);

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(rustls_pemfile::Item::Pkcs8Key(key))) => return Ok(PrivateKeyDer::Pkcs8(key)),
            Ok(Some(rustls_pemfile::Item::Pkcs1Key(key))) => return Ok(PrivateKeyDer::Pkcs1(key)),
            Ok(Some(rustls_pemfile::Item::Sec1Key(key))) => return Ok(PrivateKeyDer::Sec1(key)),
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                return Err(CertManagerError::credential_load(format!(
                    "Failed to parse PEM: {}",
                    e
                )));
            }
        }
    }

    Err(CertManagerError::credential_load(
        "No private key found in PEM data",
    ))
}
