//! Integration tests for the findCerts operation

use crate::integration::{MockEjbcaServer, fixtures};
use embed_cert_manager::{CertManagerError, DeadlineManager};

#[tokio::test]
async fn test_lookup_multiple_entries() {
    let mock = MockEjbcaServer::start().await;
    let old = fixtures::cert_der("device01", -400, -35);
    let current = fixtures::cert_der("device01", -35, 330);
    mock.mock_find_certs(
        200,
        fixtures::find_certs_response(&[
            fixtures::double_base64(&old),
            fixtures::double_base64(&current),
        ]),
    )
    .await;

    let certs = mock
        .client()
        .find_certs("device01", false, &DeadlineManager::default().get())
        .await
        .unwrap();

    assert_eq!(certs.len(), 2);
    assert_eq!(certs[0].der(), old.as_slice());
    assert_eq!(certs[1].der(), current.as_slice());

    let bodies = mock.posted_bodies().await;
    assert!(bodies[0].contains("<arg1>false</arg1><arg0>device01</arg0>"));
}

#[tokio::test]
async fn test_lookup_no_entries() {
    let mock = MockEjbcaServer::start().await;
    mock.mock_find_certs(200, fixtures::find_certs_response(&[]))
        .await;

    let certs = mock
        .client()
        .find_certs("device01", true, &DeadlineManager::default().get())
        .await
        .unwrap();
    assert!(certs.is_empty());
}

#[tokio::test]
async fn test_lookup_one_bad_entry_fails() {
    let mock = MockEjbcaServer::start().await;
    let good = fixtures::cert_der("device01", -1, 300);
    mock.mock_find_certs(
        200,
        fixtures::find_certs_response(&[
            fixtures::double_base64(&good),
            "Z2FyYmFnZQ==".to_string(),
        ]),
    )
    .await;

    let err = mock
        .client()
        .find_certs("device01", false, &DeadlineManager::default().get())
        .await
        .unwrap_err();
    assert!(matches!(err, CertManagerError::Decode(_)));
}

#[tokio::test]
async fn test_lookup_fault() {
    let mock = MockEjbcaServer::start().await;
    mock.mock_find_certs(500, fixtures::soap_fault("S:Server", "Authorization denied"))
        .await;

    let err = mock
        .client()
        .find_certs("device01", false, &DeadlineManager::default().get())
        .await
        .unwrap_err();
    assert!(matches!(err, CertManagerError::Protocol(_)));
    assert!(err.to_string().contains("Authorization denied"));
}

#[tokio::test]
async fn test_lookup_non_soap_success_body() {
    for body in ["", "<html><body>Maintenance</body></html>"] {
        let mock = MockEjbcaServer::start().await;
        mock.mock_find_certs(200, body.to_string()).await;

        let err = mock
            .client()
            .find_certs("device01", false, &DeadlineManager::default().get())
            .await
            .unwrap_err();
        assert!(matches!(err, CertManagerError::Protocol(_)), "{body:?}");
    }
}
