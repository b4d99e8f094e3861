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

//! PKCS#10 enrollment (`pkcs10Request`).
//!
//! Arguments, in order: end entity username, enrollment password, base64
//! DER CSR, certificate profile hint (empty), response type
//! (`CERTIFICATE`). The answer is a `CertificateResponse` whose `data`
//! element holds the certificate.

use std::time::SystemTime;

use crate::csr::csr_to_wire_format;
use crate::error::{CertManagerError, Result};
use crate::soap::{SoapRequest, check_fault, find_elements, response_element};
use crate::types::{CertificateCandidate, EnrollmentRequest, decode_certificate_data};

/// Operation name.
pub const OPERATION: &str = "pkcs10Request";

/// Build the request envelope. The CSR signature is verified here.
pub fn build_request(request: &EnrollmentRequest) -> Result<SoapRequest> {
    let csr_b64 = csr_to_wire_format(&request.csr_pem)?;
    tracing::debug!(
        "CSR ok, {} base64 chars, prefix {:?}",
        csr_b64.len(),
        &csr_b64[..csr_b64.len().min(16)]
    );

    Ok(SoapRequest::new(OPERATION)
        .arg("arg0", request.username.as_str())
        .arg("arg1", request.password.as_str())
        .arg("arg2", csr_b64)
        .arg("arg3", request.profile.as_str())
        .arg("arg4", request.response_type.as_str()))
}

/// Extract and decode the issued certificate from a response document.
pub fn parse_response(xml: &str) -> Result<CertificateCandidate> {
    check_fault(xml)?;
    let response = response_element(xml, OPERATION)?;

    let ret = find_elements(response.content(), "return")?
        .into_iter()
        .next()
        .ok_or_else(|| CertManagerError::protocol("pkcs10Request: empty response"))?;

    let data = match ret.child("data")? {
        Some(data) => data.text()?,
        None => String::new(),
    };
    if data.trim().is_empty() {
        return Err(CertManagerError::protocol(
            "pkcs10Request: empty certificate response data",
        ));
    }

    decode_certificate_data(data.as_bytes())
}

/// Sanity checks on a freshly issued certificate.
///
/// An already expired certificate is rejected. A certificate that does not
/// name `identity` is only reported, since devices are often enrolled under
/// a name that differs from their SAN entries.
pub fn validate_issued(
    cert: &CertificateCandidate,
    identity: &str,
    now: SystemTime,
) -> Result<()> {
    if cert.not_after() <= now {
        return Err(CertManagerError::certificate_expired(
            cert.not_after_rfc3339(),
        ));
    }

    if let Err(e) = cert.verify_hostname(identity) {
        tracing::warn!("Hostname verification failed: {}", e);
    }

    tracing::info!(
        "Received certificate: CN={:?} Serial={} NotAfter={}",
        cert.common_name().unwrap_or_default(),
        cert.serial_hex(),
        cert.not_after_rfc3339()
    );

    Ok(())
}
