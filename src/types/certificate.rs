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

//! Parsed certificates as returned by the CA.

use std::fmt::Write as _;
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use const_oid::db::rfc4519::CN;
use const_oid::db::rfc5280::ID_CE_SUBJECT_ALT_NAME;
use der::asn1::{PrintableStringRef, Utf8StringRef};
use der::{Decode, Tag, Tagged};
use x509_cert::Certificate;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::time::Time;

use super::pem_encode;
use crate::error::{CertManagerError, Result};

/// A certificate obtained from an enrollment or lookup call.
///
/// Keeps the verbatim DER next to the parsed structure so the bytes pushed to
/// a target are exactly the bytes the CA issued.
#[derive(Debug, Clone)]
pub struct CertificateCandidate {
    certificate: Certificate,
    der: Vec<u8>,
    not_before: SystemTime,
    not_after: SystemTime,
}

impl CertificateCandidate {
    /// Parse a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let certificate = Certificate::from_der(der)?;
        let validity = &certificate.tbs_certificate.validity;
        let not_before = to_system_time(&validity.not_before);
        let not_after = to_system_time(&validity.not_after);

        Ok(Self {
            certificate,
            der: der.to_vec(),
            not_before,
            not_after,
        })
    }

    /// The parsed certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The DER bytes as received.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Start of the validity period.
    pub fn not_before(&self) -> SystemTime {
        self.not_before
    }

    /// End of the validity period.
    pub fn not_after(&self) -> SystemTime {
        self.not_after
    }

    /// Subject distinguished name (RFC 4514 form).
    pub fn subject(&self) -> String {
        self.certificate.tbs_certificate.subject.to_string()
    }

    /// Issuer distinguished name (RFC 4514 form).
    pub fn issuer(&self) -> String {
        self.certificate.tbs_certificate.issuer.to_string()
    }

    /// First common name of the subject, if any.
    pub fn common_name(&self) -> Option<String> {
        self.certificate
            .tbs_certificate
            .subject
            .0
            .iter()
            .flat_map(|rdn| rdn.0.iter())
            .filter(|atv| atv.oid == CN)
            .find_map(|atv| match atv.value.tag() {
                Tag::Utf8String => Utf8StringRef::try_from(&atv.value)
                    .ok()
                    .map(|s| s.as_str().to_string()),
                Tag::PrintableString => PrintableStringRef::try_from(&atv.value)
                    .ok()
                    .map(|s| s.as_str().to_string()),
                _ => None,
            })
    }

    /// Serial number as colon separated upper-case hex.
    pub fn serial_hex(&self) -> String {
        self.certificate
            .tbs_certificate
            .serial_number
            .as_bytes()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// NotAfter in RFC 3339 form.
    pub fn not_after_rfc3339(&self) -> String {
        self.certificate
            .tbs_certificate
            .validity
            .not_after
            .to_date_time()
            .to_string()
    }

    /// `NotBefore <= at < NotAfter`.
    pub fn is_valid_at(&self, at: SystemTime) -> bool {
        self.not_before <= at && at < self.not_after
    }

    /// Lifetime left at `now`; zero once NotAfter has passed.
    pub fn remaining(&self, now: SystemTime) -> Duration {
        self.not_after.duration_since(now).unwrap_or(Duration::ZERO)
    }

    /// Time elapsed since NotBefore; zero if not yet valid.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.not_before).unwrap_or(Duration::ZERO)
    }

    /// Check `host` against the subject alternative names.
    ///
    /// DNS names match case-insensitively, with a single left-most `*` label.
    /// IP literals only match iPAddress entries. The subject CN is not
    /// consulted.
    pub fn verify_hostname(&self, host: &str) -> Result<()> {
        let names = self.subject_alt_names()?;
        let host = host.trim_end_matches('.');

        let matched = match host.parse::<IpAddr>() {
            Ok(ip) => names.iter().any(|name| match name {
                GeneralName::IpAddress(octets) => ip_matches(&ip, octets.as_bytes()),
                _ => false,
            }),
            Err(_) => names.iter().any(|name| match name {
                GeneralName::DnsName(dns) => dns_matches(&dns.to_string(), host),
                _ => false,
            }),
        };

        if matched {
            Ok(())
        } else {
            Err(CertManagerError::protocol(format!(
                "certificate is not valid for {host}"
            )))
        }
    }

    fn subject_alt_names(&self) -> Result<Vec<GeneralName>> {
        let Some(extensions) = &self.certificate.tbs_certificate.extensions else {
            return Ok(Vec::new());
        };

        for ext in extensions {
            if ext.extn_id == ID_CE_SUBJECT_ALT_NAME {
                let san = SubjectAltName::from_der(ext.extn_value.as_bytes())?;
                return Ok(san.0);
            }
        }

        Ok(Vec::new())
    }

    /// PEM `CERTIFICATE` block of the verbatim DER, 64 columns.
    pub fn to_pem(&self) -> String {
        pem_encode("CERTIFICATE", &self.der)
    }

    /// Subject, Issuer and NotAfter lines followed by the PEM block.
    ///
    /// This is the payload installed on the target host.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Subject: {}", self.subject());
        let _ = writeln!(out, "Issuer: {}", self.issuer());
        let _ = writeln!(out, "NotAfter: {}", self.not_after_rfc3339());
        out.push_str(&self.to_pem());
        out
    }
}

fn to_system_time(time: &Time) -> SystemTime {
    UNIX_EPOCH + time.to_unix_duration()
}

fn dns_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    if let Some(suffix) = pattern.strip_prefix("*.") {
        match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix,
            None => false,
        }
    } else {
        pattern == host
    }
}

fn ip_matches(ip: &IpAddr, octets: &[u8]) -> bool {
    match ip {
        IpAddr::V4(v4) => octets == v4.octets(),
        IpAddr::V6(v6) => octets == v6.octets(),
    }
}
