//! Command implementations.

pub mod records;
pub mod report;
pub mod session;
pub mod settings;

use std::sync::Arc;

use ginvoice_sync::{
    ConnectivityGate, FileStore, HttpBackend, SyncConfig, SyncCoordinator, TracingNotices,
    Workspace,
};
use tracing::{info, warn};

/// Workspace backed by the on-disk cache and the HTTP backend.
pub type DeviceWorkspace = Workspace<FileStore, HttpBackend>;

/// Open the device workspace.
///
/// Connectivity starts from a reachability check unless `offline` forces it.
/// Without `GINVOICE_API_TOKEN` the token saved by the last login is used.
///
/// # Errors
///
/// Returns an error if the backend URL is missing or invalid.
pub async fn open(
    config: &SyncConfig,
    offline: bool,
) -> Result<DeviceWorkspace, Box<dyn std::error::Error>> {
    let remote_config = config.remote()?;
    let remote = HttpBackend::new(remote_config)?;
    if remote_config.api_token.is_none() {
        match config.session_file().load().await {
            Ok(Some(token)) => remote.set_token(Some(token)).await,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not read the saved session, sign in again"),
        }
    }

    let online = if offline { false } else { remote.is_reachable().await };
    if online {
        info!("backend reachable");
    } else {
        warn!("working offline; changes are blocked until connectivity returns");
    }

    let gate = ConnectivityGate::new(online, Arc::new(TracingNotices));
    let coordinator = SyncCoordinator::new(config.file_store(), remote, config.sync_timeout);
    Ok(Workspace::open(coordinator, gate).await)
}
