//! Integration tests for the settings working copy.
//!
//! The "Save Changes" control must only show while the profile differs from
//! what was last committed, and committing must push only changed fields.

#![allow(clippy::unwrap_used)]

use ginvoice_integration_tests::{Call, Harness};
use ginvoice_sync::{CommitOutcome, ProfileField, RemoteError, SyncError};

// =============================================================================
// Dirty Flag
// =============================================================================

#[tokio::test]
async fn test_profile_rename_pushes_then_refreshes_and_clears_dirty() {
    let h = Harness::new(true).await;

    let mut copy = h.workspace.begin_profile_edit().await;
    assert!(!copy.is_dirty(), "fresh edit surface must not be dirty");

    h.workspace
        .edit_profile(&mut copy, ProfileField::Name("Test Business Updated".into()))
        .unwrap();
    assert!(copy.is_dirty());

    let outcome = h.workspace.commit_profile(&mut copy).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Synced(_)));
    assert_eq!(h.backend.calls(), [Call::Push, Call::Fetch]);

    let pushed = h.backend.pushes();
    assert_eq!(pushed.len(), 1);
    assert_eq!(
        serde_json::to_value(&pushed[0]).unwrap(),
        serde_json::json!({ "business": { "name": "Test Business Updated" } })
    );

    assert!(!copy.is_dirty());
    assert_eq!(copy.baseline().name, "Test Business Updated");
    assert_eq!(
        h.workspace.snapshot().await.business.name,
        "Test Business Updated"
    );
    assert!(!h.workspace.is_dirty().await);
}

#[tokio::test]
async fn test_typing_original_value_back_is_not_dirty() {
    let h = Harness::new(true).await;
    let mut copy = h.workspace.begin_profile_edit().await;

    for field in [
        ProfileField::Address("9 New Rd".into()),
        ProfileField::Phone("+2340000000000".into()),
        ProfileField::Address("123 Test St".into()),
        ProfileField::Phone("+2348000000000".into()),
    ] {
        h.workspace.edit_profile(&mut copy, field).unwrap();
    }

    assert!(!copy.is_dirty());
    assert!(copy.delta().is_empty());
}

#[tokio::test]
async fn test_untouched_fields_are_not_pushed() {
    let h = Harness::new(true).await;
    let mut copy = h.workspace.begin_profile_edit().await;
    h.workspace
        .edit_profile(&mut copy, ProfileField::IsSubscribed(true))
        .unwrap();

    let delta = copy.delta();
    assert_eq!(delta.is_subscribed, Some(true));
    assert!(delta.name.is_none());
    assert!(delta.email.is_none());
    assert_eq!(delta.fields().len(), 1);
}

// =============================================================================
// Failure And Retry
// =============================================================================

#[tokio::test]
async fn test_failed_push_keeps_edit_and_retry_resends_same_delta() {
    let h = Harness::new(true).await;
    let mut copy = h.workspace.begin_profile_edit().await;
    h.workspace
        .edit_profile(&mut copy, ProfileField::Name("Test Business Updated".into()))
        .unwrap();

    h.backend
        .fail_next_push(RemoteError::Network("connection reset".into()));
    let err = h.workspace.commit_profile(&mut copy).await.unwrap_err();

    assert!(matches!(err, SyncError::Network(_)));
    assert!(err.is_retryable());
    assert!(copy.is_dirty());
    assert_eq!(copy.working().name, "Test Business Updated");
    assert_eq!(h.backend.calls(), [Call::Push], "no refresh after failed push");
    assert_eq!(h.workspace.snapshot().await.business.name, "Test Business");

    let first_attempt = copy.delta();
    h.workspace.commit_profile(&mut copy).await.unwrap();
    assert_eq!(h.backend.pushes()[0].business, first_attempt);
    assert!(!copy.is_dirty());
}

#[tokio::test]
async fn test_conflict_is_surfaced_not_merged() {
    let h = Harness::new(true).await;
    let mut copy = h.workspace.begin_profile_edit().await;
    h.workspace
        .edit_profile(&mut copy, ProfileField::Email("owner@business.com".into()))
        .unwrap();

    h.backend
        .fail_next_push(RemoteError::Conflict("profile changed on another device".into()));
    let err = h.workspace.commit_profile(&mut copy).await.unwrap_err();

    assert!(matches!(err, SyncError::Conflict(ref m) if m.contains("another device")));
    assert!(!err.is_retryable());
    assert!(copy.is_dirty());
    assert_eq!(h.backend.server().business.email, "test@business.com");
}

#[tokio::test]
async fn test_discarding_edit_surface_has_no_side_effects() {
    let h = Harness::new(true).await;
    let before = h.store.raw();

    let mut copy = h.workspace.begin_profile_edit().await;
    h.workspace
        .edit_profile(&mut copy, ProfileField::Name("Never Saved".into()))
        .unwrap();
    copy.discard();

    assert!(h.backend.calls().is_empty());
    assert_eq!(h.store.raw(), before);
    assert_eq!(h.workspace.snapshot().await.business.name, "Test Business");
}

#[tokio::test]
async fn test_profile_commit_keeps_unrelated_pending_edits() {
    let h = Harness::new(true).await;
    let sale = h.sale("sneakers", "Piece", 1).await;
    let sale_id = h.workspace.create_transaction(sale).await.unwrap();

    let mut copy = h.workspace.begin_profile_edit().await;
    h.workspace
        .edit_profile(&mut copy, ProfileField::Phone("+2349999999999".into()))
        .unwrap();
    h.workspace.commit_profile(&mut copy).await.unwrap();

    let pending = h.workspace.pending_delta().await;
    assert!(pending.business.is_empty());
    assert_eq!(pending.transactions.upserts.len(), 1);
    assert_eq!(pending.transactions.upserts[0].id, sale_id);
    assert_eq!(
        h.workspace.snapshot().await.business.phone,
        "+2349999999999"
    );
}
