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

//! Certificate and CSR generators shared by the unit tests.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use time::OffsetDateTime;

use crate::types::{CertificateCandidate, pem_encode};

pub fn unix(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

fn params(cn: &str, sans: &[&str]) -> CertificateParams {
    let sans: Vec<String> = sans.iter().map(|s| s.to_string()).collect();
    let mut params = CertificateParams::new(sans).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    params
}

/// Self-signed certificate DER valid between two unix timestamps.
pub fn self_signed(cn: &str, sans: &[&str], not_before: i64, not_after: i64) -> Vec<u8> {
    let key = KeyPair::generate().unwrap();
    let mut params = params(cn, sans);
    params.not_before = OffsetDateTime::from_unix_timestamp(not_before).unwrap();
    params.not_after = OffsetDateTime::from_unix_timestamp(not_after).unwrap();
    params.self_signed(&key).unwrap().der().to_vec()
}

/// Parsed candidate valid between two unix timestamps.
pub fn candidate(not_before: i64, not_after: i64) -> CertificateCandidate {
    CertificateCandidate::from_der(&self_signed("device01", &["device01"], not_before, not_after))
        .unwrap()
}

/// A freshly signed PEM CSR.
pub fn csr_pem(cn: &str) -> String {
    let key = KeyPair::generate().unwrap();
    params(cn, &[cn]).serialize_request(&key).unwrap().pem().unwrap()
}

/// A PEM CSR whose signature no longer verifies.
pub fn tampered_csr_pem(cn: &str) -> String {
    let key = KeyPair::generate().unwrap();
    let mut der = params(cn, &[cn])
        .serialize_request(&key)
        .unwrap()
        .der()
        .to_vec();
    let last = der.len() - 1;
    der[last] ^= 0x01;
    pem_block("CERTIFICATE REQUEST", &der)
}

pub fn pem_block(label: &str, der: &[u8]) -> String {
    pem_encode(label, der)
}
