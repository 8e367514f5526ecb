//! Business settings commands.
//!
//! # Usage
//!
//! ```bash
//! gv profile set --name "Test Business Updated" --phone +2348000000000
//! ```

use ginvoice_sync::{ProfileField, SyncError};
use tracing::info;

use super::DeviceWorkspace;
use super::session::report_outcome;

/// Requested profile changes; `None` leaves a field alone.
#[derive(Debug, Default)]
pub struct ProfileEdits {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ProfileEdits {
    fn into_fields(self) -> Vec<ProfileField> {
        [
            self.name.map(ProfileField::Name),
            self.address.map(ProfileField::Address),
            self.phone.map(ProfileField::Phone),
            self.email.map(ProfileField::Email),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Apply profile edits and commit them.
///
/// Values equal to the current ones are not pushed.
///
/// # Errors
///
/// Returns `Blocked` offline or the commit error.
pub async fn set(workspace: &DeviceWorkspace, edits: ProfileEdits) -> Result<(), SyncError> {
    let mut copy = workspace.begin_profile_edit().await;
    for field in edits.into_fields() {
        workspace.edit_profile(&mut copy, field)?;
    }

    if !copy.is_dirty() {
        info!("profile unchanged");
        return Ok(());
    }

    let changed: Vec<String> = copy.delta().fields().iter().map(|f| format!("{f:?}")).collect();
    info!(fields = ?changed, "saving profile changes");
    report_outcome(&workspace.commit_profile(&mut copy).await?);
    Ok(())
}
