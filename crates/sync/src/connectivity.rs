//! Connectivity gate.
//!
//! Every mutating entry point runs through [`ConnectivityGate::guard`] or
//! [`ConnectivityGate::guard_async`]. While offline the wrapped operation is
//! never started: a notice is emitted and [`Blocked`] is returned, so local
//! state cannot drift away from what the server can later accept.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::notice::{Notice, NoticeSink};

/// Operations that change business data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutatingAction {
    CreateTransaction,
    DeleteTransaction,
    UpsertProduct,
    DeleteProduct,
    RecordExpenditure,
    DeleteExpenditure,
    ChangeSettings,
    Commit,
}

impl MutatingAction {
    /// Text shown to the user when the action is blocked offline.
    #[must_use]
    pub const fn offline_notice(self) -> &'static str {
        match self {
            Self::CreateTransaction => "Please connect to the internet to record sales.",
            Self::DeleteTransaction => "Please connect to the internet to delete sales.",
            Self::UpsertProduct => "Please connect to the internet to update products.",
            Self::DeleteProduct => "Please connect to the internet to delete products.",
            Self::RecordExpenditure => "Please connect to the internet to record expenditures.",
            Self::DeleteExpenditure => "Please connect to the internet to delete expenditures.",
            Self::ChangeSettings => "You must be online to change settings.",
            Self::Commit => "Please connect to the internet to save changes.",
        }
    }
}

impl std::fmt::Display for MutatingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CreateTransaction => "create_transaction",
            Self::DeleteTransaction => "delete_transaction",
            Self::UpsertProduct => "upsert_product",
            Self::DeleteProduct => "delete_product",
            Self::RecordExpenditure => "record_expenditure",
            Self::DeleteExpenditure => "delete_expenditure",
            Self::ChangeSettings => "change_settings",
            Self::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// A mutation was vetoed because the device is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} blocked while offline")]
pub struct Blocked(pub MutatingAction);

/// Process-wide online/offline flag plus the offline veto.
///
/// Clones share the same flag. Environment signals (network up/down events,
/// a reachability check) call [`set_online`](Self::set_online); readers see
/// the latest value without polling.
#[derive(Clone)]
pub struct ConnectivityGate {
    state: Arc<watch::Sender<bool>>,
    notices: Arc<dyn NoticeSink>,
}

impl std::fmt::Debug for ConnectivityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityGate")
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl ConnectivityGate {
    #[must_use]
    pub fn new(online: bool, notices: Arc<dyn NoticeSink>) -> Self {
        let (state, _) = watch::channel(online);
        Self {
            state: Arc::new(state),
            notices,
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.state.borrow()
    }

    /// Apply an environment signal.
    pub fn set_online(&self, online: bool) {
        let changed = self.state.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            info!(online, "connectivity changed");
        }
    }

    /// Watch for connectivity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Veto `action` if offline, emitting the user notice.
    ///
    /// # Errors
    ///
    /// Returns `Blocked` when the device is offline.
    pub fn check(&self, action: MutatingAction) -> Result<(), Blocked> {
        if self.is_online() {
            return Ok(());
        }
        warn!(%action, "mutation blocked while offline");
        self.notices.notify(Notice::warning(action.offline_notice()));
        Err(Blocked(action))
    }

    /// Run `op` only if online.
    ///
    /// # Errors
    ///
    /// Returns `Blocked` (converted into `E`) without calling `op` when
    /// offline, otherwise whatever `op` returns.
    pub fn guard<T, E>(
        &self,
        action: MutatingAction,
        op: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<Blocked>,
    {
        self.check(action)?;
        op()
    }

    /// Async form of [`guard`](Self::guard). The future is only created
    /// once the gate has let the action through.
    ///
    /// # Errors
    ///
    /// Returns `Blocked` (converted into `E`) without creating the future
    /// when offline, otherwise whatever the future resolves to.
    pub async fn guard_async<T, E, F, Fut>(&self, action: MutatingAction, op: F) -> Result<T, E>
    where
        E: From<Blocked>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.check(action)?;
        op().await
    }

    /// Sink the gate reports to; shared with the rest of the pipeline.
    #[must_use]
    pub fn notices(&self) -> &Arc<dyn NoticeSink> {
        &self.notices
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notice::NoticeLog;

    fn gate(online: bool) -> (ConnectivityGate, NoticeLog) {
        let log = NoticeLog::new();
        (ConnectivityGate::new(online, Arc::new(log.clone())), log)
    }

    #[test]
    fn test_guard_runs_op_when_online() {
        let (gate, log) = gate(true);
        let result: Result<i32, Blocked> = gate.guard(MutatingAction::DeleteProduct, || Ok(7));
        assert_eq!(result.unwrap(), 7);
        assert!(log.notices().is_empty());
    }

    #[test]
    fn test_guard_skips_op_and_notifies_when_offline() {
        let (gate, log) = gate(false);
        let mut ran = false;
        let result: Result<(), Blocked> = gate.guard(MutatingAction::DeleteTransaction, || {
            ran = true;
            Ok(())
        });
        assert_eq!(result, Err(Blocked(MutatingAction::DeleteTransaction)));
        assert!(!ran);
        assert!(log.contains("Please connect to the internet"));
    }

    #[test]
    fn test_settings_notice_text() {
        let (gate, log) = gate(false);
        assert!(gate.check(MutatingAction::ChangeSettings).is_err());
        assert!(log.contains("You must be online"));
    }

    #[tokio::test]
    async fn test_guard_async_never_builds_future_offline() {
        let (gate, _log) = gate(false);
        let mut built = false;
        let result: Result<(), Blocked> = gate
            .guard_async(MutatingAction::RecordExpenditure, || {
                built = true;
                async { Ok(()) }
            })
            .await;
        assert!(result.is_err());
        assert!(!built);
    }

    #[tokio::test]
    async fn test_signals_reach_subscribers() {
        let (gate, _log) = gate(false);
        let mut rx = gate.subscribe();
        let signal = gate.clone();
        tokio::spawn(async move { signal.set_online(true) });
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(gate.is_online());
    }
}
