//! Session and sync commands.
//!
//! # Usage
//!
//! ```bash
//! gv status
//! gv login -e owner@shop.com --pin 1234
//! gv pull
//! gv sync
//! gv logout
//! ```

use ginvoice_core::Email;
use ginvoice_sync::{CommitOutcome, Credentials, SessionFile, SyncError};
use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};

use super::DeviceWorkspace;

/// Errors specific to session commands.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] ginvoice_core::EmailError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Print what the device currently holds.
#[allow(clippy::print_stdout)]
pub async fn status(workspace: &DeviceWorkspace) {
    let snapshot = workspace.snapshot().await;
    let last_synced = snapshot
        .sync
        .last_synced_at
        .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());

    println!("Business:      {}", display_or_dash(&snapshot.business.name));
    println!("Registered:    {}", snapshot.is_registered);
    println!("Logged in:     {} ({})", snapshot.is_logged_in, snapshot.role);
    println!("Online:        {}", workspace.is_online());
    println!("Products:      {}", snapshot.products.len());
    println!("Transactions:  {}", snapshot.transactions.len());
    println!("Expenditures:  {}", snapshot.expenditures.len());
    println!("Last synced:   {last_synced}");
    if snapshot.sync.stale {
        println!("Cache is stale: run `gv sync` to refresh.");
    }
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

/// Replace the local snapshot with the server's.
///
/// # Errors
///
/// Returns the refresh error; the local snapshot is untouched on failure.
pub async fn pull(workspace: &DeviceWorkspace) -> Result<(), SyncError> {
    let snapshot = workspace.refresh().await?;
    info!(
        products = snapshot.products.len(),
        transactions = snapshot.transactions.len(),
        "pulled latest state"
    );
    Ok(())
}

/// Finish an interrupted sync (refresh a stale cache).
///
/// # Errors
///
/// Returns `Blocked` offline or the refresh error.
pub async fn sync(workspace: &DeviceWorkspace) -> Result<(), SyncError> {
    report_outcome(&workspace.commit().await?);
    Ok(())
}

/// Sign in with email and PIN.
///
/// # Errors
///
/// Returns `SessionError` if the email is malformed, the backend refuses
/// the login (including unverified accounts) or the token cannot be saved.
pub async fn login(
    workspace: &DeviceWorkspace,
    session_file: &SessionFile,
    email: &str,
    pin: String,
) -> Result<(), SessionError> {
    let credentials = Credentials {
        email: Email::parse(email)?,
        pin: SecretString::from(pin),
    };

    match workspace.login(&credentials).await {
        Ok(session) => {
            session_file
                .save(&session.token)
                .await
                .map_err(SyncError::from)?;
            info!(
                business = session.business_name.as_deref().unwrap_or("-"),
                "signed in"
            );
        }
        Err(SyncError::VerificationRequired) => {
            warn!("Please verify your email address before signing in.");
            return Err(SyncError::VerificationRequired.into());
        }
        Err(e) => return Err(e.into()),
    }

    workspace.refresh().await?;
    Ok(())
}

/// Clear the local cache and forget the saved session.
///
/// # Errors
///
/// Returns `CommitInProgress` during a commit, or `Storage` if the cache
/// or session file cannot be removed.
pub async fn logout(
    workspace: &DeviceWorkspace,
    session_file: &SessionFile,
) -> Result<(), SyncError> {
    workspace.logout().await?;
    session_file.clear().await?;
    info!("signed out and cleared local data");
    Ok(())
}

/// Log the result of a commit.
pub fn report_outcome(outcome: &CommitOutcome) {
    match outcome {
        CommitOutcome::NothingToSync => info!("nothing to sync"),
        CommitOutcome::Synced(_) => info!("changes saved and synced"),
        CommitOutcome::PushedPendingRefresh(_) => {
            warn!("changes saved, but the latest state could not be fetched; run `gv sync` later");
        }
    }
}
