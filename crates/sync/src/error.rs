//! Sync pipeline errors.

use ginvoice_core::ModelError;
use thiserror::Error;

use crate::connectivity::{Blocked, MutatingAction};
use crate::remote::RemoteError;
use crate::store::StorageError;

/// Errors surfaced by the workspace and the sync coordinator.
///
/// Every variant leaves either the previous committed snapshot or the
/// pending delta intact, never a mixture of the two.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Offline veto; nothing was changed.
    #[error("{0} blocked while offline")]
    Blocked(MutatingAction),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Timeout or transport failure. The pending delta is kept for retry.
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the delta; needs manual resolution.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not signed in or session expired")]
    Unauthorized,

    #[error("email verification required before signing in")]
    VerificationRequired,

    /// A commit is already in flight for this snapshot.
    #[error("a commit is already in progress")]
    CommitInProgress,

    #[error(transparent)]
    Model(#[from] ModelError),

    /// Backend answered with something the client does not understand.
    #[error("remote error: {0}")]
    Remote(String),
}

impl SyncError {
    /// Whether retrying the same operation later can succeed unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::CommitInProgress)
    }
}

impl From<Blocked> for SyncError {
    fn from(blocked: Blocked) -> Self {
        Self::Blocked(blocked.0)
    }
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Network(msg) => Self::Network(msg),
            RemoteError::Timeout => Self::Network("request timed out".to_string()),
            RemoteError::Conflict(msg) => Self::Conflict(msg),
            RemoteError::Unauthorized => Self::Unauthorized,
            RemoteError::VerificationRequired => Self::VerificationRequired,
            RemoteError::Response { status, body } if status >= 500 => {
                Self::Network(format!("server error ({status}): {body}"))
            }
            other @ (RemoteError::Response { .. }
            | RemoteError::Decode(_)
            | RemoteError::InvalidUrl(_)) => Self::Remote(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failures_are_retryable_network_errors() {
        assert!(SyncError::from(RemoteError::Timeout).is_retryable());
        assert!(SyncError::from(RemoteError::Network("reset".into())).is_retryable());
        assert!(
            SyncError::from(RemoteError::Response {
                status: 503,
                body: String::new()
            })
            .is_retryable()
        );
    }

    #[test]
    fn test_conflict_is_not_retryable() {
        let err = SyncError::from(RemoteError::Conflict("stale product".into()));
        assert!(matches!(err, SyncError::Conflict(ref m) if m == "stale product"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_blocked_keeps_action() {
        let err = SyncError::from(Blocked(MutatingAction::DeleteTransaction));
        assert!(matches!(err, SyncError::Blocked(MutatingAction::DeleteTransaction)));
        assert_eq!(err.to_string(), "delete_transaction blocked while offline");
    }
}
