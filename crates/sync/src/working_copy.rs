//! Working copies: a committed baseline paired with an editable shadow.
//!
//! Dirtiness is never tracked with a "touched" flag. It is recomputed as
//! structural inequality between baseline and working value, so editing a
//! field and then typing the original value back makes the copy clean again.

use ginvoice_core::{BusinessProfile, BusinessSnapshot};

use crate::delta::{ProfileDelta, ProfileField, SnapshotDelta};

/// Values that can produce a delta against an older version of themselves.
pub trait Diff: Clone + PartialEq {
    type Delta;

    fn diff(baseline: &Self, working: &Self) -> Self::Delta;
}

impl Diff for BusinessProfile {
    type Delta = ProfileDelta;

    fn diff(baseline: &Self, working: &Self) -> ProfileDelta {
        ProfileDelta::between(baseline, working)
    }
}

impl Diff for BusinessSnapshot {
    type Delta = SnapshotDelta;

    fn diff(baseline: &Self, working: &Self) -> SnapshotDelta {
        SnapshotDelta::between(baseline, working)
    }
}

/// An editable shadow of a committed value.
///
/// Created when an edit surface opens; dropped (or [`discard`]ed) when it
/// closes. Dropping has no side effects.
///
/// [`discard`]: WorkingCopy::discard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy<T> {
    baseline: T,
    working: T,
}

impl<T: Diff> WorkingCopy<T> {
    /// Open a copy of `committed`. A fresh copy is never dirty.
    #[must_use]
    pub fn begin(committed: T) -> Self {
        Self {
            working: committed.clone(),
            baseline: committed,
        }
    }

    /// The last committed value.
    #[must_use]
    pub const fn baseline(&self) -> &T {
        &self.baseline
    }

    /// The value being edited.
    #[must_use]
    pub const fn working(&self) -> &T {
        &self.working
    }

    /// Whether the working value differs from the baseline.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.baseline != self.working
    }

    /// What changed since the baseline.
    #[must_use]
    pub fn delta(&self) -> T::Delta {
        T::diff(&self.baseline, &self.working)
    }

    /// Mutate the working value in place.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.working)
    }

    /// Mutate a scratch copy and keep it only if `f` succeeds, so a failed
    /// edit leaves the working value exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns on failure.
    pub fn try_edit<R, E>(&mut self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E> {
        let mut scratch = self.working.clone();
        let out = f(&mut scratch)?;
        self.working = scratch;
        Ok(out)
    }

    /// Adopt `committed` as both baseline and working value.
    pub fn rebase(&mut self, committed: T) {
        self.working = committed.clone();
        self.baseline = committed;
    }

    /// Adopt `committed` as the baseline, then let `replay` put edits that
    /// were not part of the commit back on top of it.
    pub fn rebase_with(&mut self, committed: T, replay: impl FnOnce(&mut T)) {
        let mut working = committed.clone();
        replay(&mut working);
        self.baseline = committed;
        self.working = working;
    }

    /// Throw away edits, keeping the copy open.
    pub fn revert(&mut self) {
        self.working = self.baseline.clone();
    }

    /// Close the copy without committing.
    pub fn discard(self) {}

    /// Split into `(baseline, working)`.
    #[must_use]
    pub fn into_parts(self) -> (T, T) {
        (self.baseline, self.working)
    }
}

impl WorkingCopy<BusinessProfile> {
    /// Set one profile field.
    pub fn set_field(&mut self, field: ProfileField) {
        field.apply(&mut self.working);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn profile() -> BusinessProfile {
        BusinessProfile {
            name: "Test Business".into(),
            address: "123 Test St".into(),
            phone: "+2348000000000".into(),
            email: "test@business.com".into(),
            ..BusinessProfile::default()
        }
    }

    #[test]
    fn test_fresh_copy_is_clean() {
        let copy = WorkingCopy::begin(profile());
        assert!(!copy.is_dirty());
        assert!(copy.delta().is_empty());
    }

    #[test]
    fn test_first_differing_edit_makes_dirty() {
        let mut copy = WorkingCopy::begin(profile());
        copy.set_field(ProfileField::Name("Test Business Updated".into()));
        assert!(copy.is_dirty());
        assert_eq!(copy.delta().name.as_deref(), Some("Test Business Updated"));
        assert!(copy.delta().address.is_none());
    }

    #[test]
    fn test_setting_same_value_is_not_dirty() {
        let mut copy = WorkingCopy::begin(profile());
        copy.set_field(ProfileField::Address("123 Test St".into()));
        assert!(!copy.is_dirty());
    }

    #[test]
    fn test_reverting_to_baseline_clears_dirty() {
        let mut copy = WorkingCopy::begin(profile());
        for name in ["T", "Te", "Test Shop", "Test Business"] {
            copy.set_field(ProfileField::Name(name.into()));
        }
        copy.set_field(ProfileField::IsSubscribed(true));
        copy.set_field(ProfileField::IsSubscribed(false));
        assert!(!copy.is_dirty());
    }

    #[test]
    fn test_rebase_resets_dirty() {
        let mut copy = WorkingCopy::begin(profile());
        copy.set_field(ProfileField::Phone("+2349000000000".into()));
        let committed = copy.working().clone();
        copy.rebase(committed);
        assert!(!copy.is_dirty());
        assert_eq!(copy.baseline().phone, "+2349000000000");
    }

    #[test]
    fn test_failed_try_edit_leaves_copy_untouched() {
        let mut copy = WorkingCopy::begin(profile());
        let result: Result<(), &str> = copy.try_edit(|p| {
            p.name = "half applied".into();
            Err("rejected")
        });
        assert!(result.is_err());
        assert!(!copy.is_dirty());
    }

    #[test]
    fn test_rebase_with_keeps_pending_edits() {
        let mut copy = WorkingCopy::begin(profile());
        copy.set_field(ProfileField::Phone("+1".into()));
        let pending = copy.delta();

        let mut server = profile();
        server.address = "9 Server Rd".into();
        copy.rebase_with(server, |p| pending.apply_to(p));

        assert_eq!(copy.baseline().address, "9 Server Rd");
        assert_eq!(copy.working().phone, "+1");
        assert!(copy.is_dirty());
    }
}
