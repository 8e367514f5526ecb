//! The full local business snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::business::BusinessProfile;
use super::catalog::Product;
use super::expenditure::Expenditure;
use super::id::{ExpenditureId, ProductId, TransactionId};
use super::sale::Transaction;
use super::status::Role;

/// Sync bookkeeping persisted alongside the business data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncMarker {
    /// Local data is known to lag the server: a push was acknowledged but
    /// the follow-up refresh never landed.
    pub stale: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Everything the device caches about the business.
///
/// One value per device. It is replaced wholesale on refresh and never
/// merged field by field with server data. `Default` is the
/// unregistered, fresh-install state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessSnapshot {
    pub products: Vec<Product>,
    pub transactions: Vec<Transaction>,
    pub expenditures: Vec<Expenditure>,
    pub business: BusinessProfile,
    pub categories: Vec<String>,
    pub role: Role,
    pub is_logged_in: bool,
    pub is_registered: bool,
    pub sync: SyncMarker,
}

impl BusinessSnapshot {
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn product_mut(&mut self, id: &ProductId) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn transaction(&self, id: &TransactionId) -> Option<&Transaction> {
        self.transactions.iter().find(|t| &t.id == id)
    }

    #[must_use]
    pub fn expenditure(&self, id: &ExpenditureId) -> Option<&Expenditure> {
        self.expenditures.iter().find(|e| &e.id == id)
    }

    /// Whether this is the fresh-install state (nothing registered yet).
    #[must_use]
    pub const fn is_unregistered(&self) -> bool {
        !self.is_registered
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_web_client_state_loads() {
        let json = r##"{
            "products": [],
            "transactions": [],
            "role": "owner",
            "isLoggedIn": true,
            "isRegistered": true,
            "business": {
                "name": "Test Business",
                "address": "123 Test St",
                "phone": "+2348000000000",
                "email": "test@business.com",
                "isSubscribed": false,
                "theme": { "primaryColor": "#4f46e5", "fontFamily": "'Inter', sans-serif" },
                "staffPermissions": {}
            },
            "expenditures": []
        }"##;
        let snapshot: BusinessSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.is_registered);
        assert_eq!(snapshot.business.name, "Test Business");
        assert!(snapshot.categories.is_empty());
        assert!(!snapshot.sync.stale);
    }

    #[test]
    fn test_default_is_unregistered() {
        let snapshot = BusinessSnapshot::default();
        assert!(snapshot.is_unregistered());
        assert!(!snapshot.is_logged_in);
    }
}
