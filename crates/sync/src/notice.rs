//! User-visible notices (toasts and alerts).
//!
//! The core never renders anything. It hands notices to a [`NoticeSink`]
//! and the presentation layer decides how to show them.

use std::sync::{Arc, Mutex, PoisonError};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message meant for the person using the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }
}

/// Receiver for user-visible notices.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sink that records every notice, for UIs that poll and for tests.
#[derive(Debug, Clone, Default)]
pub struct NoticeLog {
    entries: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, oldest first.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any recorded notice contains `text`.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|n| n.message.contains(text))
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl NoticeSink for NoticeLog {
    fn notify(&self, notice: Notice) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }
}

/// Sink that only logs, for headless drivers like the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotices;

impl NoticeSink for TracingNotices {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(notice = %notice.message, "notice"),
            NoticeLevel::Warning => tracing::warn!(notice = %notice.message, "notice"),
            NoticeLevel::Error => tracing::error!(notice = %notice.message, "notice"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_log_records_and_drains() {
        let log = NoticeLog::new();
        log.notify(Notice::warning("Please connect to the internet to delete sales."));
        log.notify(Notice::info("Synced"));

        assert!(log.contains("Please connect to the internet"));
        assert_eq!(log.notices().len(), 2);
        assert_eq!(log.drain().len(), 2);
        assert!(log.notices().is_empty());
    }

    #[test]
    fn test_clones_share_entries() {
        let log = NoticeLog::new();
        let handle = log.clone();
        handle.notify(Notice::error("boom"));
        assert!(log.contains("boom"));
    }
}
