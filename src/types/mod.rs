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

//! Certificate and request types exchanged with the CA.

pub mod cert_data;
mod certificate;

pub use cert_data::decode_certificate_data;
pub use certificate::CertificateCandidate;

use base64::prelude::*;

/// Response type hint sent with an enrollment.
pub const RESPONSE_TYPE_CERTIFICATE: &str = "CERTIFICATE";

/// A PKCS#10 enrollment for one identity.
#[derive(Debug, Clone)]
pub struct EnrollmentRequest {
    /// End entity username known to the CA.
    pub username: String,

    /// End entity enrollment code; may be empty.
    pub password: String,

    /// CSR in PEM form. Its self-signature is verified before submission.
    pub csr_pem: String,

    /// Certificate profile hint. Empty lets the CA pick.
    pub profile: String,

    /// Response type hint.
    pub response_type: String,
}

impl EnrollmentRequest {
    /// Create a request with the default profile and response type.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        csr_pem: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            csr_pem: csr_pem.into(),
            profile: String::new(),
            response_type: RESPONSE_TYPE_CERTIFICATE.to_string(),
        }
    }
}

/// Encode DER as a PEM block with 64-column base64 lines.
pub fn pem_encode(label: &str, der: &[u8]) -> String {
    let b64 = BASE64_STANDARD.encode(der);
    let mut pem = String::with_capacity(b64.len() + b64.len() / 64 + 2 * label.len() + 40);
    pem.push_str("-----BEGIN ");
    pem.push_str(label);
    pem.push_str("-----\n");
    // base64 output is ASCII, so splitting on byte boundaries is safe
    for line in b64.as_bytes().chunks(64) {
        pem.push_str(std::str::from_utf8(line).unwrap_or_default());
        pem.push('\n');
    }
    pem.push_str("-----END ");
    pem.push_str(label);
    pem.push_str("-----\n");
    pem
}
