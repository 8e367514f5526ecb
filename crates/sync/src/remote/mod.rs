//! Remote source of truth.
//!
//! The core only needs three things from the backend: accept a delta,
//! return the canonical snapshot, and sign a device in. [`RemoteBackend`]
//! is that seam; [`HttpBackend`] is the production implementation.

mod error;
mod http;

use std::future::Future;

use chrono::{DateTime, Utc};
use ginvoice_core::{BusinessSnapshot, Email};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::delta::SnapshotDelta;

pub use error::RemoteError;
pub use http::HttpBackend;

/// Acknowledgment that the backend durably applied a delta.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PushAck {
    /// Server-side revision after the push, if the backend tracks one.
    pub revision: Option<u64>,
    pub received_at: Option<DateTime<Utc>>,
}

/// Login credentials (email and shop PIN).
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: Email,
    pub pin: SecretString,
}

/// A signed-in device session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: SecretString,
    pub business_name: Option<String>,
}

/// The remote source of truth.
pub trait RemoteBackend: Send + Sync {
    /// Send outbound changes. Success means the backend committed them.
    fn push(
        &self,
        delta: &SnapshotDelta,
    ) -> impl Future<Output = Result<PushAck, RemoteError>> + Send;

    /// Fetch the canonical snapshot.
    fn fetch_state(&self) -> impl Future<Output = Result<BusinessSnapshot, RemoteError>> + Send;

    /// Sign in. Unverified accounts fail with `RemoteError::VerificationRequired`.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<AuthSession, RemoteError>> + Send;
}
