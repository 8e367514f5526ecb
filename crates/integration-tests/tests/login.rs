//! Integration tests for device sign-in.

#![allow(clippy::unwrap_used)]

use ginvoice_core::{BusinessSnapshot, Email};
use ginvoice_integration_tests::{Call, Harness, test_business};
use ginvoice_sync::{Credentials, LocalStore, SyncError};
use secrecy::SecretString;

fn credentials(email: &str) -> Credentials {
    Credentials {
        email: Email::parse(email).unwrap(),
        pin: SecretString::from("1234"),
    }
}

#[tokio::test]
async fn test_unverified_account_is_not_logged_in() {
    let h = Harness::with(BusinessSnapshot::default(), test_business(), true).await;
    h.backend.require_verification();

    let err = h
        .workspace
        .login(&credentials("test@business.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::VerificationRequired));
    assert!(!h.workspace.snapshot().await.is_logged_in);
    assert!(!h.store.load().await.is_logged_in);
    assert_eq!(h.backend.calls(), [Call::Login]);
}

#[tokio::test]
async fn test_login_sets_session_flags_and_persists() {
    let h = Harness::with(BusinessSnapshot::default(), test_business(), true).await;

    let session = h
        .workspace
        .login(&credentials("Test@Business.com"))
        .await
        .unwrap();
    assert_eq!(session.business_name.as_deref(), Some("Test Business"));

    let snapshot = h.workspace.snapshot().await;
    assert!(snapshot.is_logged_in);
    assert!(snapshot.is_registered);
    assert_eq!(snapshot.business.name, "Test Business");
    assert!(!h.workspace.is_dirty().await);

    let stored = h.store.load().await;
    assert!(stored.is_logged_in);
    assert!(stored.is_registered);
}

#[tokio::test]
async fn test_bad_credentials_are_unauthorized() {
    let h = Harness::with(BusinessSnapshot::default(), test_business(), true).await;

    let err = h
        .workspace
        .login(&credentials("someone@elsewhere.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Unauthorized));
    assert!(!err.is_retryable());
    assert!(h.store.load().await.is_unregistered());
}

#[tokio::test]
async fn test_login_then_refresh_pulls_business_data() {
    let h = Harness::with(BusinessSnapshot::default(), test_business(), true).await;

    h.workspace
        .login(&credentials("test@business.com"))
        .await
        .unwrap();
    let snapshot = h.workspace.refresh().await.unwrap();

    assert_eq!(snapshot.products.len(), 2);
    assert!(snapshot.is_logged_in, "session flags survive the refresh");
    assert_eq!(h.backend.calls(), [Call::Login, Call::Fetch]);
}
