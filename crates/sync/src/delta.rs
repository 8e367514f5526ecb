//! Outbound change sets.
//!
//! A delta is what a working copy changed relative to its baseline. It is
//! the unit sent on push, and it can be re-applied onto a newer snapshot to
//! carry edits made while a commit was in flight.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use ginvoice_core::{
    BusinessProfile, BusinessSnapshot, Expenditure, ExpenditureId, Product, ProductId, Theme,
    Transaction, TransactionId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// One editable field of the business profile, with its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileField {
    Name(String),
    Address(String),
    Phone(String),
    Email(String),
    IsSubscribed(bool),
    Theme(Theme),
    StaffPermissions(BTreeMap<String, bool>),
}

impl ProfileField {
    /// Write this field into `profile`.
    pub fn apply(self, profile: &mut BusinessProfile) {
        match self {
            Self::Name(v) => profile.name = v,
            Self::Address(v) => profile.address = v,
            Self::Phone(v) => profile.phone = v,
            Self::Email(v) => profile.email = v,
            Self::IsSubscribed(v) => profile.is_subscribed = v,
            Self::Theme(v) => profile.theme = v,
            Self::StaffPermissions(v) => profile.staff_permissions = v,
        }
    }
}

/// Changed profile fields only.
///
/// Serializes to just the fields that differ, e.g.
/// `{"name":"Test Business Updated"}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_subscribed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_permissions: Option<BTreeMap<String, bool>>,
}

fn changed<T: PartialEq + Clone>(baseline: &T, working: &T) -> Option<T> {
    (baseline != working).then(|| working.clone())
}

impl ProfileDelta {
    /// Field-by-field comparison of two profiles.
    #[must_use]
    pub fn between(baseline: &BusinessProfile, working: &BusinessProfile) -> Self {
        Self {
            name: changed(&baseline.name, &working.name),
            address: changed(&baseline.address, &working.address),
            phone: changed(&baseline.phone, &working.phone),
            email: changed(&baseline.email, &working.email),
            is_subscribed: changed(&baseline.is_subscribed, &working.is_subscribed),
            theme: changed(&baseline.theme, &working.theme),
            staff_permissions: changed(&baseline.staff_permissions, &working.staff_permissions),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the changed fields in `profile`.
    pub fn apply_to(&self, profile: &mut BusinessProfile) {
        for field in self.fields() {
            field.apply(profile);
        }
    }

    /// The changed fields as [`ProfileField`]s.
    #[must_use]
    pub fn fields(&self) -> Vec<ProfileField> {
        let mut fields = Vec::new();
        if let Some(v) = &self.name {
            fields.push(ProfileField::Name(v.clone()));
        }
        if let Some(v) = &self.address {
            fields.push(ProfileField::Address(v.clone()));
        }
        if let Some(v) = &self.phone {
            fields.push(ProfileField::Phone(v.clone()));
        }
        if let Some(v) = &self.email {
            fields.push(ProfileField::Email(v.clone()));
        }
        if let Some(v) = self.is_subscribed {
            fields.push(ProfileField::IsSubscribed(v));
        }
        if let Some(v) = &self.theme {
            fields.push(ProfileField::Theme(v.clone()));
        }
        if let Some(v) = &self.staff_permissions {
            fields.push(ProfileField::StaffPermissions(v.clone()));
        }
        fields
    }
}

/// Entities addressable by a stable id.
pub trait Keyed {
    type Key: Clone + Eq + Hash + Debug + Serialize + DeserializeOwned;

    fn key(&self) -> &Self::Key;
}

impl Keyed for Product {
    type Key = ProductId;

    fn key(&self) -> &ProductId {
        &self.id
    }
}

impl Keyed for Transaction {
    type Key = TransactionId;

    fn key(&self) -> &TransactionId {
        &self.id
    }
}

impl Keyed for Expenditure {
    type Key = ExpenditureId;

    fn key(&self) -> &ExpenditureId {
        &self.id
    }
}

/// Whole-entity changes to one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(
    serialize = "T: Serialize, T::Key: Serialize",
    deserialize = "T: Deserialize<'de>, T::Key: Deserialize<'de>"
))]
pub struct CollectionDelta<T: Keyed> {
    /// New or modified entities, in working-copy order.
    #[serde(default)]
    pub upserts: Vec<T>,
    #[serde(default)]
    pub deletes: Vec<T::Key>,
}

impl<T: Keyed> Default for CollectionDelta<T> {
    fn default() -> Self {
        Self {
            upserts: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

impl<T: Keyed + Clone + PartialEq> CollectionDelta<T> {
    /// Compare two versions of a collection by id.
    #[must_use]
    pub fn between(baseline: &[T], working: &[T]) -> Self {
        let upserts = working
            .iter()
            .filter(|item| {
                baseline
                    .iter()
                    .find(|b| b.key() == item.key())
                    .is_none_or(|b| b != *item)
            })
            .cloned()
            .collect();

        let live: HashSet<&T::Key> = working.iter().map(|item| item.key()).collect();
        let deletes = baseline
            .iter()
            .map(|item| item.key())
            .filter(|key| !live.contains(key))
            .cloned()
            .collect();

        Self { upserts, deletes }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Apply deletes, then replace or append upserts.
    pub fn apply_to(&self, items: &mut Vec<T>) {
        items.retain(|item| !self.deletes.contains(item.key()));
        for upsert in &self.upserts {
            match items.iter_mut().find(|item| item.key() == upsert.key()) {
                Some(existing) => *existing = upsert.clone(),
                None => items.push(upsert.clone()),
            }
        }
    }
}

/// Everything a snapshot working copy changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotDelta {
    #[serde(skip_serializing_if = "ProfileDelta::is_empty")]
    pub business: ProfileDelta,
    #[serde(skip_serializing_if = "CollectionDelta::is_empty")]
    pub products: CollectionDelta<Product>,
    #[serde(skip_serializing_if = "CollectionDelta::is_empty")]
    pub transactions: CollectionDelta<Transaction>,
    #[serde(skip_serializing_if = "CollectionDelta::is_empty")]
    pub expenditures: CollectionDelta<Expenditure>,
    /// Full replacement category list, when it changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl SnapshotDelta {
    /// Compare the syncable parts of two snapshots.
    ///
    /// Device session flags (role, login state) and sync bookkeeping are not
    /// business data and never appear in a delta.
    #[must_use]
    pub fn between(baseline: &BusinessSnapshot, working: &BusinessSnapshot) -> Self {
        Self {
            business: ProfileDelta::between(&baseline.business, &working.business),
            products: CollectionDelta::between(&baseline.products, &working.products),
            transactions: CollectionDelta::between(&baseline.transactions, &working.transactions),
            expenditures: CollectionDelta::between(&baseline.expenditures, &working.expenditures),
            categories: changed(&baseline.categories, &working.categories),
        }
    }

    /// A delta that only touches the business profile.
    #[must_use]
    pub fn from_profile(business: ProfileDelta) -> Self {
        Self {
            business,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.business.is_empty()
            && self.products.is_empty()
            && self.transactions.is_empty()
            && self.expenditures.is_empty()
            && self.categories.is_none()
    }

    /// Re-apply this delta onto `snapshot`.
    pub fn apply_to(&self, snapshot: &mut BusinessSnapshot) {
        self.business.apply_to(&mut snapshot.business);
        self.products.apply_to(&mut snapshot.products);
        self.transactions.apply_to(&mut snapshot.transactions);
        self.expenditures.apply_to(&mut snapshot.expenditures);
        if let Some(categories) = &self.categories {
            snapshot.categories.clone_from(categories);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: &str, stock: i64) -> Product {
        Product::new(id, "Piece", Decimal::ONE, Decimal::TWO)
            .with_id(id)
            .with_stock(Decimal::from(stock))
    }

    #[test]
    fn test_profile_delta_serializes_only_changed_fields() {
        let baseline = BusinessProfile::named("Test Business");
        let mut working = baseline.clone();
        working.name = "Test Business Updated".into();

        let delta = ProfileDelta::between(&baseline, &working);
        assert_eq!(
            serde_json::to_value(&delta).unwrap(),
            serde_json::json!({ "name": "Test Business Updated" })
        );
    }

    #[test]
    fn test_profile_delta_empty_for_equal_profiles() {
        let profile = BusinessProfile::named("Shop");
        assert!(ProfileDelta::between(&profile, &profile.clone()).is_empty());
    }

    #[test]
    fn test_collection_delta_detects_upserts_and_deletes() {
        let baseline = vec![product("1", 10), product("2", 20), product("3", 30)];
        let working = vec![product("1", 10), product("3", 25), product("4", 5)];

        let delta = CollectionDelta::between(&baseline, &working);
        let upserted: Vec<&str> = delta.upserts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(upserted, ["3", "4"]);
        assert_eq!(delta.deletes, [ProductId::from("2")]);

        let mut replayed = baseline;
        delta.apply_to(&mut replayed);
        assert_eq!(replayed, working);
    }

    #[test]
    fn test_snapshot_delta_ignores_session_flags() {
        let baseline = BusinessSnapshot::default();
        let mut working = baseline.clone();
        working.is_logged_in = true;
        working.sync.stale = true;
        assert!(SnapshotDelta::between(&baseline, &working).is_empty());
    }

    #[test]
    fn test_snapshot_delta_apply_round_trip() {
        let mut baseline = BusinessSnapshot::default();
        baseline.products.push(product("1", 10));
        let mut working = baseline.clone();
        working.business.phone = "+2348000000000".into();
        working.products.clear();
        working.categories.push("Fruits".into());

        let delta = SnapshotDelta::between(&baseline, &working);
        let mut replayed = baseline.clone();
        delta.apply_to(&mut replayed);
        assert_eq!(replayed, working);
    }
}
