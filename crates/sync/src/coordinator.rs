//! Push-before-refresh synchronization.
//!
//! A commit runs in two phases. The outbound delta is pushed first; only
//! once the backend acknowledges it is the canonical snapshot pulled and
//! written over the local one. Between the phases the commit is durable
//! remotely but not yet reflected locally ([`SyncPhase::Pushed`]). If the
//! pull then fails, the local snapshot is rebuilt as `base + delta`, marked
//! stale and persisted, so the next commit refreshes even with nothing to
//! push and the delta is never sent twice.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ginvoice_core::BusinessSnapshot;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::delta::SnapshotDelta;
use crate::error::SyncError;
use crate::notice::{Notice, NoticeSink, TracingNotices};
use crate::remote::{AuthSession, Credentials, PushAck, RemoteBackend, RemoteError};
use crate::store::LocalStore;

const SAVE_FAILED: &str = "Could not save data on this device. Your last saved data is unchanged.";
const CLEAR_FAILED: &str = "Could not remove data from this device.";
const REFRESH_PENDING: &str =
    "Changes saved. The latest data could not be loaded and will be fetched on the next sync.";

/// Where the coordinator is in a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    Pushing,
    /// Remote has the delta; local snapshot not yet replaced.
    Pushed,
    Refreshing,
}

/// Result of [`SyncCoordinator::commit_and_sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Empty delta and a fresh cache: no network traffic.
    NothingToSync,
    /// Pushed (if needed) and refreshed. Holds the canonical snapshot.
    Synced(BusinessSnapshot),
    /// Pushed, but the refresh failed. Holds `base + delta` marked stale.
    PushedPendingRefresh(BusinessSnapshot),
}

impl CommitOutcome {
    /// The snapshot the local state now reflects, if it changed.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&BusinessSnapshot> {
        match self {
            Self::NothingToSync => None,
            Self::Synced(s) | Self::PushedPendingRefresh(s) => Some(s),
        }
    }
}

/// Resets the phase to idle however the commit future ends.
struct PhaseReset<'a>(&'a watch::Sender<SyncPhase>);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SyncPhase::Idle);
    }
}

/// Orchestrates push, refresh and persistence for one device snapshot.
pub struct SyncCoordinator<S, R> {
    store: S,
    remote: R,
    timeout: Duration,
    commit_lock: Mutex<()>,
    phase: watch::Sender<SyncPhase>,
    notices: Arc<dyn NoticeSink>,
}

impl<S, R> std::fmt::Debug for SyncCoordinator<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("timeout", &self.timeout)
            .field("phase", &*self.phase.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: LocalStore, R: RemoteBackend> SyncCoordinator<S, R> {
    #[must_use]
    pub fn new(store: S, remote: R, timeout: Duration) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            store,
            remote,
            timeout,
            commit_lock: Mutex::new(()),
            phase,
            notices: Arc::new(TracingNotices),
        }
    }

    /// Report storage trouble to `notices` instead of only logging it.
    #[must_use]
    pub fn with_notices(mut self, notices: Arc<dyn NoticeSink>) -> Self {
        self.notices = notices;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions (e.g. to disable the save button).
    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Whether a commit or refresh currently holds the pipeline.
    #[must_use]
    pub fn is_committing(&self) -> bool {
        self.commit_lock.try_lock().is_err()
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, SyncError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => {
                warn!(operation = what, timeout = ?self.timeout, "remote call timed out");
                Err(SyncError::Network(format!(
                    "{what} timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }

    /// Send a delta to the backend.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Network` on timeout or transport failure and
    /// `SyncError::Conflict` if the backend rejects the delta.
    #[instrument(skip_all)]
    pub async fn push(&self, delta: &SnapshotDelta) -> Result<PushAck, SyncError> {
        let ack = self.bounded("push", self.remote.push(delta)).await?;
        debug!(revision = ?ack.revision, "push acknowledged");
        Ok(ack)
    }

    /// Pull the canonical snapshot and persist it.
    ///
    /// Device session flags are carried over from `current`. Fails with
    /// `CommitInProgress` rather than racing a commit.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::CommitInProgress`, `SyncError::Network` or
    /// `SyncError::Storage`. Local state is unchanged on error.
    #[instrument(skip_all)]
    pub async fn refresh(&self, current: &BusinessSnapshot) -> Result<BusinessSnapshot, SyncError> {
        let _guard = self
            .commit_lock
            .try_lock()
            .map_err(|_| SyncError::CommitInProgress)?;
        let _reset = PhaseReset(&self.phase);
        self.phase.send_replace(SyncPhase::Refreshing);
        self.refresh_locked(current).await
    }

    async fn refresh_locked(&self, current: &BusinessSnapshot) -> Result<BusinessSnapshot, SyncError> {
        let mut canonical = self.bounded("refresh", self.remote.fetch_state()).await?;

        canonical.role = current.role;
        canonical.is_logged_in = current.is_logged_in;
        canonical.is_registered = current.is_registered;
        canonical.sync.stale = false;
        canonical.sync.last_synced_at = Some(Utc::now());

        self.persist(&canonical).await?;
        info!(
            products = canonical.products.len(),
            transactions = canonical.transactions.len(),
            "local snapshot replaced with canonical state"
        );
        Ok(canonical)
    }

    async fn persist(&self, snapshot: &BusinessSnapshot) -> Result<(), SyncError> {
        if let Err(e) = self.store.save(snapshot).await {
            error!(error = %e, "failed to persist snapshot");
            self.notices.notify(Notice::error(SAVE_FAILED));
            return Err(e.into());
        }
        Ok(())
    }

    /// Push `delta` (made against `base`), then refresh.
    ///
    /// Dropping the returned future after the push has started does not
    /// undo anything on the backend.
    ///
    /// # Errors
    ///
    /// - `SyncError::CommitInProgress` if another commit holds the pipeline
    /// - `SyncError::Network` / `SyncError::Conflict` if the push fails, in
    ///   which case nothing is refreshed or persisted
    /// - `SyncError::Network` if the delta is empty and a stale cache could
    ///   not be refreshed
    #[instrument(skip_all, fields(stale = base.sync.stale))]
    pub async fn commit_and_sync(
        &self,
        base: &BusinessSnapshot,
        delta: &SnapshotDelta,
    ) -> Result<CommitOutcome, SyncError> {
        let _guard = self
            .commit_lock
            .try_lock()
            .map_err(|_| SyncError::CommitInProgress)?;
        let _reset = PhaseReset(&self.phase);

        if delta.is_empty() {
            if !base.sync.stale {
                debug!("nothing to push and cache is fresh");
                return Ok(CommitOutcome::NothingToSync);
            }
            info!("nothing to push, refreshing stale cache");
            self.phase.send_replace(SyncPhase::Refreshing);
            return self.refresh_locked(base).await.map(CommitOutcome::Synced);
        }

        self.phase.send_replace(SyncPhase::Pushing);
        if let Err(e) = self.push(delta).await {
            warn!(error = %e, "push failed, keeping pending changes");
            return Err(e);
        }
        self.phase.send_replace(SyncPhase::Pushed);

        self.phase.send_replace(SyncPhase::Refreshing);
        match self.refresh_locked(base).await {
            Ok(canonical) => Ok(CommitOutcome::Synced(canonical)),
            Err(e) => {
                warn!(error = %e, "refresh after push failed, marking cache stale");
                let mut pending = base.clone();
                delta.apply_to(&mut pending);
                pending.sync.stale = true;
                // The push already landed, so a failed save still reports
                // the commit; the next open refetches from the server.
                if self.persist(&pending).await.is_ok() {
                    self.notices.notify(Notice::info(REFRESH_PENDING));
                }
                Ok(CommitOutcome::PushedPendingRefresh(pending))
            }
        }
    }

    /// Sign in against the backend and persist the device session.
    ///
    /// Returns the session and `current` with the signed-in flags set. Runs
    /// under the commit lock so it cannot interleave with a commit's save.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::CommitInProgress`, `SyncError::VerificationRequired`
    /// for unverified accounts, `SyncError::Unauthorized` for bad credentials,
    /// `SyncError::Network` on timeout and `SyncError::Storage` if the session
    /// cannot be saved. Nothing is persisted on error.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(
        &self,
        credentials: &Credentials,
        current: &BusinessSnapshot,
    ) -> Result<(AuthSession, BusinessSnapshot), SyncError> {
        let _guard = self
            .commit_lock
            .try_lock()
            .map_err(|_| SyncError::CommitInProgress)?;
        let session = self.bounded("login", self.remote.login(credentials)).await?;

        let mut signed_in = current.clone();
        signed_in.is_logged_in = true;
        signed_in.is_registered = true;
        if signed_in.business.name.is_empty() {
            if let Some(name) = &session.business_name {
                signed_in.business.name.clone_from(name);
            }
        }
        self.persist(&signed_in).await?;
        Ok((session, signed_in))
    }

    /// Remove the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::CommitInProgress` rather than clearing under a
    /// commit that would save again afterwards, or `SyncError::Storage`.
    #[instrument(skip_all)]
    pub async fn reset(&self) -> Result<(), SyncError> {
        let _guard = self
            .commit_lock
            .try_lock()
            .map_err(|_| SyncError::CommitInProgress)?;
        if let Err(e) = self.store.clear().await {
            error!(error = %e, "failed to clear stored snapshot");
            self.notices.notify(Notice::error(CLEAR_FAILED));
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use ginvoice_core::BusinessProfile;
    use secrecy::SecretString;

    use super::*;
    use crate::delta::ProfileDelta;
    use crate::notice::{NoticeLevel, NoticeLog};
    use crate::store::MemoryStore;

    #[derive(Clone, Default)]
    struct Scripted {
        calls: Arc<StdMutex<Vec<&'static str>>>,
        fail_push: Option<RemoteError>,
        fail_fetch: Option<RemoteError>,
        push_delay: Option<Duration>,
        server: BusinessSnapshot,
    }

    impl Scripted {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RemoteBackend for Scripted {
        async fn push(&self, _delta: &SnapshotDelta) -> Result<PushAck, RemoteError> {
            self.calls.lock().unwrap().push("push");
            if let Some(delay) = self.push_delay {
                tokio::time::sleep(delay).await;
            }
            self.fail_push.clone().map_or(Ok(PushAck::default()), Err)
        }

        async fn fetch_state(&self) -> Result<BusinessSnapshot, RemoteError> {
            self.calls.lock().unwrap().push("fetch");
            self.fail_fetch.clone().map_or_else(|| Ok(self.server.clone()), Err)
        }

        async fn login(&self, _credentials: &Credentials) -> Result<AuthSession, RemoteError> {
            Ok(AuthSession {
                token: SecretString::from("t"),
                business_name: None,
            })
        }
    }

    fn renamed() -> (BusinessSnapshot, SnapshotDelta) {
        let base = BusinessSnapshot {
            business: BusinessProfile::named("Test Business"),
            is_logged_in: true,
            is_registered: true,
            ..BusinessSnapshot::default()
        };
        let delta = SnapshotDelta::from_profile(ProfileDelta {
            name: Some("Test Business Updated".into()),
            ..ProfileDelta::default()
        });
        (base, delta)
    }

    fn coordinator(remote: Scripted) -> SyncCoordinator<MemoryStore, Scripted> {
        SyncCoordinator::new(MemoryStore::new(), remote, Duration::from_secs(15))
    }

    #[tokio::test]
    async fn test_push_happens_before_refresh() {
        let remote = Scripted {
            server: BusinessSnapshot {
                business: BusinessProfile::named("Test Business Updated"),
                ..BusinessSnapshot::default()
            },
            ..Scripted::default()
        };
        let sync = coordinator(remote.clone());
        let (base, delta) = renamed();

        let outcome = sync.commit_and_sync(&base, &delta).await.unwrap();
        assert_eq!(remote.calls(), ["push", "fetch"]);

        let CommitOutcome::Synced(snapshot) = outcome else {
            panic!("expected synced outcome");
        };
        assert_eq!(snapshot.business.name, "Test Business Updated");
        assert!(snapshot.is_logged_in, "session flags carried over");
        assert!(!snapshot.sync.stale);
        assert_eq!(sync.store().load().await, snapshot);
        assert_eq!(sync.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_failed_push_skips_refresh_and_persistence() {
        let remote = Scripted {
            fail_push: Some(RemoteError::Network("connection reset".into())),
            ..Scripted::default()
        };
        let sync = coordinator(remote.clone());
        let (base, delta) = renamed();

        let err = sync.commit_and_sync(&base, &delta).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(remote.calls(), ["push"]);
        assert_eq!(sync.store().saves(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_after_push_marks_stale() {
        let remote = Scripted {
            fail_fetch: Some(RemoteError::Timeout),
            ..Scripted::default()
        };
        let sync = coordinator(remote.clone());
        let (base, delta) = renamed();

        let outcome = sync.commit_and_sync(&base, &delta).await.unwrap();
        let CommitOutcome::PushedPendingRefresh(pending) = outcome else {
            panic!("expected pending refresh");
        };
        assert!(pending.sync.stale);
        assert_eq!(pending.business.name, "Test Business Updated");
        assert!(sync.store().load().await.sync.stale);
    }

    #[tokio::test]
    async fn test_failed_stale_marker_save_is_noticed() {
        let remote = Scripted {
            fail_fetch: Some(RemoteError::Timeout),
            ..Scripted::default()
        };
        let log = NoticeLog::new();
        let sync = coordinator(remote).with_notices(Arc::new(log.clone()));
        sync.store().fail_saves(true);
        let (base, delta) = renamed();

        let outcome = sync.commit_and_sync(&base, &delta).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::PushedPendingRefresh(_)));

        let notices = log.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert!(notices[0].message.contains("Could not save data on this device"));
    }

    #[tokio::test]
    async fn test_pending_refresh_is_noticed() {
        let remote = Scripted {
            fail_fetch: Some(RemoteError::Timeout),
            ..Scripted::default()
        };
        let log = NoticeLog::new();
        let sync = coordinator(remote).with_notices(Arc::new(log.clone()));
        let (base, delta) = renamed();

        sync.commit_and_sync(&base, &delta).await.unwrap();
        let notices = log.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_empty_delta_on_stale_cache_refreshes_without_push() {
        let remote = Scripted::default();
        let sync = coordinator(remote.clone());
        let mut base = BusinessSnapshot::default();
        base.sync.stale = true;

        let outcome = sync
            .commit_and_sync(&base, &SnapshotDelta::default())
            .await
            .unwrap();
        assert!(matches!(outcome, CommitOutcome::Synced(ref s) if !s.sync.stale));
        assert_eq!(remote.calls(), ["fetch"]);
    }

    #[tokio::test]
    async fn test_empty_delta_on_fresh_cache_is_noop() {
        let remote = Scripted::default();
        let sync = coordinator(remote.clone());
        let outcome = sync
            .commit_and_sync(&BusinessSnapshot::default(), &SnapshotDelta::default())
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::NothingToSync);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_timeout_is_network_failure() {
        let remote = Scripted {
            push_delay: Some(Duration::from_secs(60)),
            ..Scripted::default()
        };
        let sync = SyncCoordinator::new(MemoryStore::new(), remote.clone(), Duration::from_secs(5));
        let (base, delta) = renamed();

        let err = sync.commit_and_sync(&base, &delta).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(ref m) if m.contains("timed out")));
        assert_eq!(remote.calls(), ["push"]);
        assert_eq!(sync.phase(), SyncPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_commit_is_rejected_while_in_flight() {
        let remote = Scripted {
            push_delay: Some(Duration::from_secs(1)),
            ..Scripted::default()
        };
        let sync = Arc::new(coordinator(remote));
        let (base, delta) = renamed();

        let first = {
            let sync = Arc::clone(&sync);
            let (base, delta) = (base.clone(), delta.clone());
            tokio::spawn(async move { sync.commit_and_sync(&base, &delta).await })
        };
        while sync.phase() != SyncPhase::Pushing {
            tokio::task::yield_now().await;
        }

        assert!(sync.is_committing());
        let second = sync.commit_and_sync(&base, &delta).await;
        assert!(matches!(second, Err(SyncError::CommitInProgress)));
        assert!(matches!(
            sync.refresh(&base).await,
            Err(SyncError::CommitInProgress)
        ));
        assert!(matches!(sync.reset().await, Err(SyncError::CommitInProgress)));
        let credentials = Credentials {
            email: ginvoice_core::Email::parse("owner@shop.test").unwrap(),
            pin: SecretString::from("1234"),
        };
        assert!(matches!(
            sync.login(&credentials, &base).await,
            Err(SyncError::CommitInProgress)
        ));

        assert!(first.await.unwrap().is_ok());
        assert!(!sync.is_committing());
    }
}
