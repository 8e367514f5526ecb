//! Ginvoice Sync - Offline-first local state synchronization.
//!
//! This crate owns the rules for how cached business data is read,
//! optimistically mutated, diffed, gated by connectivity and reconciled
//! with the server.
//!
//! # Pipeline
//!
//! ```text
//! UI intent -> ConnectivityGate -> WorkingCopy (optimistic edit, dirty flag)
//!           -> commit -> SyncCoordinator (push, then refresh)
//!           -> LocalStore (persist canonical snapshot) -> WorkingCopy rebase
//! ```
//!
//! # Modules
//!
//! - [`store`] - Durable snapshot persistence (`FileStore`, `MemoryStore`) and the
//!   remembered session token (`SessionFile`)
//! - [`connectivity`] - Online flag and the guard around every mutation
//! - [`working_copy`] - Baseline/working pairs and structural diffing
//! - [`delta`] - Outbound change sets
//! - [`coordinator`] - Push-before-refresh protocol
//! - [`cost`] - The one unit-cost formula
//! - [`analytics`] - Summaries built on [`cost`]
//! - [`remote`] - Backend trait and HTTP implementation
//! - [`workspace`] - Facade wiring the pipeline together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analytics;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod cost;
pub mod delta;
pub mod error;
pub mod notice;
pub mod remote;
pub mod store;
pub mod working_copy;
pub mod workspace;

pub use analytics::{ReportPeriod, SalesSummary, low_stock, summarize, summarize_period};
pub use config::{ConfigError, LogFormat, RemoteConfig, SyncConfig};
pub use connectivity::{Blocked, ConnectivityGate, MutatingAction};
pub use coordinator::{CommitOutcome, SyncCoordinator, SyncPhase};
pub use cost::{extended_line_cost, resolve_line_cost};
pub use delta::{CollectionDelta, ProfileDelta, ProfileField, SnapshotDelta};
pub use error::SyncError;
pub use notice::{Notice, NoticeLevel, NoticeLog, NoticeSink, TracingNotices};
pub use remote::{AuthSession, Credentials, HttpBackend, PushAck, RemoteBackend, RemoteError};
pub use store::{
    DEFAULT_STATE_KEY, FileStore, LocalStore, MemoryStore, SessionFile, StorageError,
};
pub use working_copy::{Diff, WorkingCopy};
pub use workspace::Workspace;
