// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Job file format.
//!
//! One TOML file describes one managed host:
//!
//! ```toml
//! [job]
//! host = "device01"
//! enabled = true
//!
//! [ca]
//! host = "ca.example.com"
//! api_url = "https://ca.example.com/ejbca/ejbcaws/ejbcaws"
//! client_cert = "/etc/embed-cert-manager.d/ra.crt"
//! client_key = "/etc/embed-cert-manager.d/ra.key"
//! server_ca_bundle = "/etc/embed-cert-manager.d/ca-chain.pem"
//! password = "enrollment-secret"
//!
//! [target]
//! ssh_user = "root"
//! ssh_key = "/etc/embed-cert-manager.d/id_ed25519"
//! renew_before = "30d"
//! cert_path = "/etc/ssl/device.crt"
//! key_path = "/etc/ssl/device.key"
//! subject = "/CN=device01"
//! csr_command = "openssl req -new -key ${target_key_path} -subj ${target_subject}"
//! set_cert_command = "printf '%s' \"${target_certificate}\" > ${target_cert_path}"
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::deadline::DEFAULT_DEADLINE;
use crate::duration::ValidityDuration;
use crate::error::{CertManagerError, Result};
use crate::remote::SshTarget;
use crate::renewal::RenewalPolicy;
use crate::tls::ChannelConfig;

use super::script::{ScriptTemplate, ShellVariable};

/// Raw contents of a job file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    #[serde(default)]
    pub job: JobSection,

    pub ca: CaSection,

    pub target: TargetSection,
}

/// `[job]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSection {
    /// Managed host name. Defaults to the file stem.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for JobSection {
    fn default() -> Self {
        Self {
            host: None,
            enabled: true,
        }
    }
}

/// `[ca]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaSection {
    /// Server name the CA presents.
    pub host: String,

    /// Web service endpoint.
    pub api_url: String,

    /// Dial this address instead of resolving the endpoint host.
    #[serde(default)]
    pub address: Option<IpAddr>,

    /// Client certificate (PEM) for mutual TLS.
    pub client_cert: PathBuf,

    /// Client private key (PEM) for mutual TLS.
    pub client_key: PathBuf,

    /// Trust anchors for the CA server certificate.
    pub server_ca_bundle: PathBuf,

    /// End entity enrollment password.
    #[serde(default)]
    pub password: String,

    /// CA certificate handed to targets via `${ca_cacert}`.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    /// Time budget for the CA calls of one job, e.g. `"2m"`.
    #[serde(default)]
    pub timeout: Option<String>,
}

/// `[target]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    pub ssh_user: String,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    #[serde(default)]
    pub ssh_key: Option<PathBuf>,

    /// Prints a PEM CSR on stdout.
    pub csr_command: String,

    /// Installs the certificate passed in `${target_certificate}`.
    pub set_cert_command: String,

    /// Renew when at most this much lifetime is left.
    pub renew_before: String,

    /// Rotate certificates older than this. Empty disables rotation.
    #[serde(default)]
    pub max_age: String,

    #[serde(default)]
    pub cert_path: String,

    #[serde(default)]
    pub key_path: String,

    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub subject_alt_name: String,
}

fn default_true() -> bool {
    true
}

fn default_ssh_port() -> u16 {
    22
}

impl JobConfig {
    /// Parse a job file.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CertManagerError::config(format!("Invalid TOML: {e}")))
    }

    /// Validate the configuration.
    ///
    /// Returns all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.ca.host.trim().is_empty() {
            errors.push("ca.host is required".to_string());
        }
        if self.ca.api_url.is_empty() {
            errors.push("ca.api_url is required".to_string());
        } else if !self.ca.api_url.starts_with("https://") {
            errors.push("ca.api_url must use HTTPS".to_string());
        } else if let Err(e) = url::Url::parse(&self.ca.api_url) {
            errors.push(format!("ca.api_url is not a valid URL: {e}"));
        }
        if let Some(timeout) = &self.ca.timeout
            && let Err(e) = ValidityDuration::parse(timeout)
        {
            errors.push(format!("ca.timeout: {e}"));
        }

        if self.target.ssh_user.trim().is_empty() {
            errors.push("target.ssh_user is required".to_string());
        }
        if self.target.ssh_port == 0 {
            errors.push("target.ssh_port must not be 0".to_string());
        }
        if self.target.renew_before.trim().is_empty() {
            errors.push("target.renew_before is required".to_string());
        } else if let Err(e) = ValidityDuration::parse(&self.target.renew_before) {
            errors.push(format!("target.renew_before: {e}"));
        }
        if let Err(e) = ValidityDuration::parse(&self.target.max_age) {
            errors.push(format!("target.max_age: {e}"));
        }

        for (field, command) in [
            ("target.csr_command", &self.target.csr_command),
            ("target.set_cert_command", &self.target.set_cert_command),
        ] {
            if command.trim().is_empty() {
                errors.push(format!("{field} is required"));
            } else if let Err(e) = ScriptTemplate::parse(command.as_str()) {
                errors.push(format!("{field}: {e}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CertManagerError::config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// A loaded, validated job.
#[derive(Debug, Clone)]
pub struct Job {
    /// Managed host name.
    pub name: String,

    pub config: JobConfig,

    /// Contents of `ca.ca_cert`, if it could be read.
    pub ca_cert_pem: Option<String>,

    pub policy: RenewalPolicy,

    /// Budget for the CA calls.
    pub timeout: Duration,

    pub csr_script: ScriptTemplate,

    pub set_cert_script: ScriptTemplate,
}

impl Job {
    /// Resolve a validated configuration.
    pub fn from_config(
        name: impl Into<String>,
        config: JobConfig,
        ca_cert_pem: Option<String>,
    ) -> Result<Self> {
        let renew_before = ValidityDuration::parse(&config.target.renew_before)?;
        let max_age = ValidityDuration::parse(&config.target.max_age)?;
        let timeout = match &config.ca.timeout {
            Some(t) => ValidityDuration::parse(t)?.as_duration(),
            None => DEFAULT_DEADLINE,
        };

        let policy = RenewalPolicy::builder()
            .renew_before(renew_before.into())
            .max_age(max_age.into())
            .build();

        let csr_script = ScriptTemplate::parse(config.target.csr_command.as_str())?;
        let set_cert_script = ScriptTemplate::parse(config.target.set_cert_command.as_str())?;

        Ok(Self {
            name: name.into(),
            config,
            ca_cert_pem,
            policy,
            timeout,
            csr_script,
            set_cert_script,
        })
    }

    /// Channel settings for the job's CA.
    pub fn channel_config(&self) -> Result<ChannelConfig> {
        let ca = &self.config.ca;
        let mut builder = ChannelConfig::builder()
            .client_identity(&ca.client_cert, &ca.client_key)
            .ca_bundle(&ca.server_ca_bundle)
            .server_name(ca.host.trim())
            .endpoint(&ca.api_url)?;
        if let Some(addr) = ca.address {
            builder = builder.address(addr);
        }
        builder.build()
    }

    /// SSH login for the managed host.
    pub fn ssh_target(&self) -> SshTarget {
        SshTarget {
            host: self.name.clone(),
            port: self.config.target.ssh_port,
            user: self.config.target.ssh_user.clone(),
            key: self.config.target.ssh_key.clone(),
        }
    }

    /// Value of `var` for this job. `certificate` feeds `${target_certificate}`.
    pub fn variable(&self, var: ShellVariable, certificate: Option<&str>) -> String {
        let target = &self.config.target;
        match var {
            ShellVariable::JobHost => self.name.clone(),
            ShellVariable::CaHost => self.config.ca.host.clone(),
            ShellVariable::CaCacert => self.ca_cert_pem.clone().unwrap_or_default(),
            ShellVariable::TargetCertPath => target.cert_path.clone(),
            ShellVariable::TargetKeyPath => target.key_path.clone(),
            ShellVariable::TargetSubject => target.subject.clone(),
            ShellVariable::TargetSubjectAltName => target.subject_alt_name.clone(),
            ShellVariable::TargetSshUser => target.ssh_user.clone(),
            ShellVariable::TargetCertificate => certificate.unwrap_or_default().to_string(),
        }
    }

    /// Script that makes the target print a CSR.
    pub fn render_csr_script(&self) -> String {
        self.csr_script.render(|var| self.variable(var, None))
    }

    /// Script that installs `certificate` on the target.
    pub fn render_set_cert_script(&self, certificate: &str) -> String {
        self.set_cert_script
            .render(|var| self.variable(var, Some(certificate)))
    }
}
