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

//! Integration tests for the pkcs10Request operation

use crate::integration::{MockEjbcaServer, fixtures};
use base64::prelude::*;
use embed_cert_manager::{CertManagerError, DeadlineManager, EnrollmentRequest};

#[tokio::test]
async fn test_successful_enrollment() {
    let mock = MockEjbcaServer::start().await;
    let der = fixtures::cert_der("device01", -1, 365);
    mock.mock_enroll(200, fixtures::enroll_response(&fixtures::double_base64(&der)), 1)
        .await;

    let client = mock.client();
    let deadlines = DeadlineManager::default();
    let request = EnrollmentRequest::new("device01", "s3cret", fixtures::csr_pem("device01"));

    let cert = client
        .enroll(&request, &deadlines.get())
        .await
        .expect("enrollment failed");

    // Verbatim DER survives both base64 layers
    assert_eq!(cert.der(), der.as_slice());
    assert_eq!(cert.common_name().as_deref(), Some("device01"));

    let bodies = mock.posted_bodies().await;
    assert_eq!(bodies.len(), 1);
    let body = &bodies[0];
    assert!(body.contains("<arg0>device01</arg0>"));
    assert!(body.contains("<arg1>s3cret</arg1>"));
    assert!(body.contains("<arg3></arg3>"));
    assert!(body.contains("<arg4>CERTIFICATE</arg4>"));

    // arg2 is the base64 DER of the CSR, not PEM
    let start = body.find("<arg2>").unwrap() + "<arg2>".len();
    let end = body.find("</arg2>").unwrap();
    let csr_der = BASE64_STANDARD.decode(&body[start..end]).unwrap();
    assert_eq!(csr_der[0], 0x30);
}

#[tokio::test]
async fn test_enrollment_sends_soap_headers() {
    let mock = MockEjbcaServer::start().await;
    let der = fixtures::cert_der("device01", -1, 365);
    mock.mock_enroll(200, fixtures::enroll_response(&BASE64_STANDARD.encode(&der)), 1)
        .await;

    let request = EnrollmentRequest::new("device01", "", fixtures::csr_pem("device01"));
    mock.client()
        .enroll(&request, &DeadlineManager::default().get())
        .await
        .unwrap();

    let received = mock.inner().received_requests().await.unwrap();
    let headers = &received[0].headers;
    assert_eq!(
        headers.get("content-type").unwrap().to_str().unwrap(),
        "text/xml; charset=utf-8"
    );
    assert_eq!(headers.get("soapaction").unwrap().to_str().unwrap(), "");
}

#[tokio::test]
async fn test_enrollment_soap_fault() {
    let mock = MockEjbcaServer::start().await;
    mock.mock_enroll(
        500,
        fixtures::soap_fault("S:Server", "Wrong username or password"),
        1,
    )
    .await;

    let request = EnrollmentRequest::new("device01", "wrong", fixtures::csr_pem("device01"));
    let err = mock
        .client()
        .enroll(&request, &DeadlineManager::default().get())
        .await
        .unwrap_err();

    assert!(matches!(err, CertManagerError::Protocol(_)));
    assert!(err.to_string().contains("Wrong username or password"));
}

#[tokio::test]
async fn test_enrollment_empty_data() {
    let mock = MockEjbcaServer::start().await;
    mock.mock_enroll(200, fixtures::enroll_response(""), 1).await;

    let request = EnrollmentRequest::new("device01", "", fixtures::csr_pem("device01"));
    let err = mock
        .client()
        .enroll(&request, &DeadlineManager::default().get())
        .await
        .unwrap_err();

    assert!(matches!(err, CertManagerError::Protocol(_)));
}

#[tokio::test]
async fn test_enrollment_http_error_without_fault() {
    let mock = MockEjbcaServer::start().await;
    mock.mock_enroll(404, "<html><body>Not Found</body></html>".to_string(), 1)
        .await;

    let request = EnrollmentRequest::new("device01", "", fixtures::csr_pem("device01"));
    let err = mock
        .client()
        .enroll(&request, &DeadlineManager::default().get())
        .await
        .unwrap_err();

    assert!(matches!(err, CertManagerError::Protocol(_)));
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_enrollment_rejects_expired_certificate() {
    let mock = MockEjbcaServer::start().await;
    let der = fixtures::cert_der("device01", -30, -1);
    mock.mock_enroll(200, fixtures::enroll_response(&fixtures::double_base64(&der)), 1)
        .await;

    let request = EnrollmentRequest::new("device01", "", fixtures::csr_pem("device01"));
    let err = mock
        .client()
        .enroll(&request, &DeadlineManager::default().get())
        .await
        .unwrap_err();

    assert!(matches!(err, CertManagerError::CertificateExpired { .. }));
}

#[tokio::test]
async fn test_enrollment_hostname_mismatch_still_returns_certificate() {
    let mock = MockEjbcaServer::start().await;
    let der = fixtures::cert_der("other.example.com", -1, 365);
    mock.mock_enroll(200, fixtures::enroll_response(&fixtures::double_base64(&der)), 1)
        .await;

    let request = EnrollmentRequest::new("device01", "", fixtures::csr_pem("device01"));
    let cert = mock
        .client()
        .enroll(&request, &DeadlineManager::default().get())
        .await
        .unwrap();

    assert_eq!(cert.der(), der.as_slice());
}

#[tokio::test]
async fn test_invalid_csr_is_not_sent() {
    let mock = MockEjbcaServer::start().await;
    mock.mock_enroll(200, fixtures::enroll_response(""), 0).await;

    let request = EnrollmentRequest::new("device01", "", "not a csr");
    let err = mock
        .client()
        .enroll(&request, &DeadlineManager::default().get())
        .await
        .unwrap_err();

    assert!(matches!(err, CertManagerError::Protocol(_)));
    assert!(mock.posted_bodies().await.is_empty());
}
