//! Business profile and appearance settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::email::{Email, EmailError};

/// Appearance settings applied to receipts and the app shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub primary_color: String,
    pub font_family: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_color: "#4f46e5".to_string(),
            font_family: "'Inter', sans-serif".to_string(),
        }
    }
}

/// Editable business settings.
///
/// Every field here is diffed individually by the settings surface, so
/// the struct stays flat apart from `theme` and `staff_permissions`, which
/// are replaced as a whole when changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessProfile {
    pub name: String,
    pub address: String,
    pub phone: String,
    /// Contact email as typed; may be empty on fresh installs.
    pub email: String,
    pub is_subscribed: bool,
    pub theme: Theme,
    /// Permission name to whether staff may use it.
    pub staff_permissions: BTreeMap<String, bool>,
}

impl BusinessProfile {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse the contact email.
    ///
    /// # Errors
    ///
    /// Returns an `EmailError` if the stored email is empty or malformed.
    pub fn contact_email(&self) -> Result<Email, EmailError> {
        Email::parse(&self.email)
    }

    /// Whether staff may use `permission`. Unknown permissions are denied.
    #[must_use]
    pub fn staff_can(&self, permission: &str) -> bool {
        self.staff_permissions
            .get(permission)
            .copied()
            .unwrap_or(false)
    }
}
