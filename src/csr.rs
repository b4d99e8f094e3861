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

//! PKCS#10 requests produced by target hosts.
//!
//! Targets generate their own key pair and print a CSR; the private key never
//! leaves the device. This module finds that CSR in the command output,
//! checks its self-signature and converts it to the form the CA expects.

use base64::prelude::*;
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::pem::Pem;
use x509_parser::prelude::FromDer;

use crate::error::{CertManagerError, Result};
use crate::types::pem_encode;

/// PEM labels accepted for certificate requests.
pub const CSR_LABELS: [&str; 2] = ["CERTIFICATE REQUEST", "NEW CERTIFICATE REQUEST"];

/// A parsed PKCS#10 request whose self-signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    label: String,
    der: Vec<u8>,
    subject: String,
}

impl CertificateRequest {
    /// Parse `der` and verify its self-signature.
    pub fn from_der(label: impl Into<String>, der: Vec<u8>) -> Result<Self> {
        let subject = verify_request(&der)?;
        Ok(Self {
            label: label.into(),
            der,
            subject,
        })
    }

    /// PEM label the request was found under.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Requested subject (RFC 4514 form).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Re-encode under the original label.
    pub fn to_pem(&self) -> String {
        pem_encode(&self.label, &self.der)
    }

    /// Base64 of the DER, as sent to the CA.
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(&self.der)
    }
}

/// Parse and verify a request, returning its subject.
fn verify_request(der: &[u8]) -> Result<String> {
    let (_, csr) = X509CertificationRequest::from_der(der)
        .map_err(|e| CertManagerError::protocol(format!("Failed to parse CSR: {}", e)))?;

    csr.verify_signature().map_err(|e| {
        CertManagerError::signature_invalid(format!("CSR self-signature: {}", e))
    })?;

    Ok(csr.certification_request_info.subject.to_string())
}

/// Find the first valid CSR in remote command output.
///
/// Blocks with another label, blocks that do not parse and blocks whose
/// signature does not verify are skipped.
pub fn extract_csr(output: &[u8]) -> Result<CertificateRequest> {
    let mut skipped_invalid = 0usize;

    for block in Pem::iter_from_buffer(output) {
        let block = match block {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!("Ignoring malformed PEM block: {}", e);
                skipped_invalid += 1;
                continue;
            }
        };

        if !CSR_LABELS.contains(&block.label.as_str()) {
            tracing::warn!("Ignoring PEM block of type {:?}", block.label);
            continue;
        }

        match CertificateRequest::from_der(block.label.clone(), block.contents) {
            Ok(csr) => {
                tracing::debug!("Found CSR for {}", csr.subject());
                return Ok(csr);
            }
            Err(e) => {
                tracing::error!("Invalid CSR in PEM block {:?}: {}", block.label, e);
                skipped_invalid += 1;
            }
        }
    }

    if skipped_invalid > 0 {
        Err(CertManagerError::signature_invalid(format!(
            "no valid CSR in output ({skipped_invalid} invalid block(s) skipped)"
        )))
    } else {
        Err(CertManagerError::protocol("no CSR found in output"))
    }
}

/// Convert a PEM CSR to the base64 DER carried in the enrollment call.
///
/// Only the first PEM block is considered. It must carry one of
/// [`CSR_LABELS`] and its self-signature must verify.
pub fn csr_to_wire_format(csr_pem: &str) -> Result<String> {
    let trimmed = csr_pem.trim();
    if trimmed.is_empty() {
        return Err(CertManagerError::protocol("CSR is empty"));
    }

    let block = Pem::iter_from_buffer(trimmed.as_bytes())
        .next()
        .ok_or_else(|| CertManagerError::protocol("CSR contains no PEM block"))?
        .map_err(|e| CertManagerError::protocol(format!("CSR PEM is malformed: {}", e)))?;
    if !CSR_LABELS.contains(&block.label.as_str()) {
        return Err(CertManagerError::protocol(format!(
            "expected a certificate request, found PEM block {:?}",
            block.label
        )));
    }

    let csr = CertificateRequest::from_der(block.label, block.contents)?;
    Ok(csr.to_base64())
}
