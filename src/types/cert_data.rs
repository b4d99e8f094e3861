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

//! Recovery of certificates from CA response payloads.
//!
//! The `data` / `certificateData` elements returned by EJBCA are not
//! consistently encoded. Depending on the call and the server version the
//! content is raw DER, base64 of DER, or base64 of base64 of DER, and nothing
//! in the response says which.

use base64::prelude::*;

use super::CertificateCandidate;
use crate::error::{CertManagerError, Result};

/// Tag byte of an ASN.1 SEQUENCE.
const SEQUENCE_TAG: u8 = 0x30;

/// Maximum number of base64 layers peeled off a payload.
pub const MAX_BASE64_ROUNDS: usize = 2;

/// Decode a certificate payload of unknown encoding.
///
/// Tries raw DER first, then up to [`MAX_BASE64_ROUNDS`] base64 layers. As
/// soon as a layer starts with a SEQUENCE tag it is parsed; a parse failure at
/// that point is final.
pub fn decode_certificate_data(data: &[u8]) -> Result<CertificateCandidate> {
    let trimmed = data.trim_ascii();
    if trimmed.is_empty() {
        return Err(CertManagerError::decode("empty certificate data"));
    }

    if trimmed[0] == SEQUENCE_TAG {
        // Whitespace trimming may have eaten trailing DER bytes.
        if data.first() == Some(&SEQUENCE_TAG)
            && let Ok(cand) = CertificateCandidate::from_der(data)
        {
            return Ok(cand);
        }
        if let Ok(cand) = CertificateCandidate::from_der(trimmed) {
            return Ok(cand);
        }
    }

    let mut layer = trimmed.to_vec();
    for round in 1..=MAX_BASE64_ROUNDS {
        let compact: Vec<u8> = layer
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();

        let decoded = match BASE64_STANDARD.decode(&compact) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!("base64 round {} failed: {}", round, e);
                break;
            }
        };

        if decoded.first() == Some(&SEQUENCE_TAG) {
            return CertificateCandidate::from_der(&decoded).map_err(|e| {
                CertManagerError::decode(format!(
                    "DER parse failed after {round} base64 round(s): {e}"
                ))
            });
        }

        layer = decoded;
    }

    Err(CertManagerError::decode(
        "could not obtain DER from certificate data",
    ))
}
