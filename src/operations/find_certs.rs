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

//! Certificate lookup (`findCerts`).

use crate::error::Result;
use crate::soap::{SoapRequest, check_fault, find_elements, response_element};
use crate::types::{CertificateCandidate, decode_certificate_data};

/// Operation name.
pub const OPERATION: &str = "findCerts";

/// Build the request envelope.
///
/// EJBCA rejects the call unless the only-valid flag (`arg1`) comes before
/// the identity (`arg0`).
pub fn build_request(identity: &str, only_valid: bool) -> SoapRequest {
    SoapRequest::new(OPERATION)
        .arg("arg1", if only_valid { "true" } else { "false" })
        .arg("arg0", identity)
}

/// Decode every certificate in a response document.
///
/// A `findCertsResponse` without `return` entries is an empty result; a
/// document without that element is a protocol error. `return` entries
/// without certificate data are skipped. A single payload that fails to
/// decode fails the whole lookup.
pub fn parse_response(xml: &str) -> Result<Vec<CertificateCandidate>> {
    check_fault(xml)?;
    let response = response_element(xml, OPERATION)?;

    let mut certs = Vec::new();
    for (idx, ret) in find_elements(response.content(), "return")?
        .iter()
        .enumerate()
    {
        let data = match ret.child("certificateData")? {
            Some(el) => el.text()?,
            None => continue,
        };
        if data.trim().is_empty() {
            tracing::debug!("findCerts entry {} has no certificate data", idx);
            continue;
        }
        certs.push(decode_certificate_data(data.as_bytes())?);
    }

    Ok(certs)
}
