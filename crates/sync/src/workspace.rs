//! The device workspace: one committed snapshot, one working copy, and the
//! pipeline that moves edits from the second to the first.
//!
//! Every mutation is vetted by the [`ConnectivityGate`] before it touches
//! the working copy, and every change reaches the [`LocalStore`] only
//! through [`SyncCoordinator::commit_and_sync`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ginvoice_core::{
    BusinessProfile, BusinessSnapshot, Expenditure, ExpenditureId, ModelError, Product, ProductId,
    Transaction, TransactionId,
};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::connectivity::{ConnectivityGate, MutatingAction};
use crate::coordinator::{CommitOutcome, SyncCoordinator};
use crate::delta::{ProfileField, SnapshotDelta};
use crate::error::SyncError;
use crate::notice::Notice;
use crate::remote::{AuthSession, Credentials, RemoteBackend};
use crate::store::LocalStore;
use crate::working_copy::WorkingCopy;

const UNREADABLE_CACHE: &str = "Saved data on this device could not be read. Starting fresh.";

/// Owns the device snapshot for the lifetime of a session.
#[derive(Debug)]
pub struct Workspace<S, R> {
    coordinator: SyncCoordinator<S, R>,
    gate: ConnectivityGate,
    copy: RwLock<WorkingCopy<BusinessSnapshot>>,
    /// Bumped by every logout; results of syncs started before it are dropped.
    resets: AtomicU64,
}

impl<S: LocalStore, R: RemoteBackend> Workspace<S, R> {
    /// Load the stored snapshot and open a clean working copy on it.
    ///
    /// Unreadable storage opens as a fresh install and tells the user so.
    /// Storage and sync problems are reported through the gate's notice sink.
    pub async fn open(coordinator: SyncCoordinator<S, R>, gate: ConnectivityGate) -> Self {
        let coordinator = coordinator.with_notices(Arc::clone(gate.notices()));
        let committed = match coordinator.store().read().await {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "stored snapshot unusable, starting fresh");
                gate.notices().notify(Notice::error(UNREADABLE_CACHE));
                BusinessSnapshot::default()
            }
        };
        info!(
            registered = committed.is_registered,
            stale = committed.sync.stale,
            "workspace opened"
        );
        Self {
            coordinator,
            gate,
            copy: RwLock::new(WorkingCopy::begin(committed)),
            resets: AtomicU64::new(0),
        }
    }

    fn resets(&self) -> u64 {
        self.resets.load(Ordering::SeqCst)
    }

    #[must_use]
    pub const fn gate(&self) -> &ConnectivityGate {
        &self.gate
    }

    #[must_use]
    pub const fn coordinator(&self) -> &SyncCoordinator<S, R> {
        &self.coordinator
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.gate.is_online()
    }

    /// The last committed snapshot.
    pub async fn snapshot(&self) -> BusinessSnapshot {
        self.copy.read().await.baseline().clone()
    }

    /// The snapshot including uncommitted edits.
    pub async fn working(&self) -> BusinessSnapshot {
        self.copy.read().await.working().clone()
    }

    /// Drives the "Save Changes" affordance.
    pub async fn is_dirty(&self) -> bool {
        self.copy.read().await.is_dirty()
    }

    pub async fn pending_delta(&self) -> SnapshotDelta {
        self.copy.read().await.delta()
    }

    /// Drop all uncommitted edits.
    pub async fn revert(&self) {
        self.copy.write().await.revert();
    }

    async fn stage<T>(
        &self,
        action: MutatingAction,
        f: impl FnOnce(&mut BusinessSnapshot) -> Result<T, ModelError>,
    ) -> Result<T, SyncError> {
        let mut copy = self.copy.write().await;
        self.gate
            .guard(action, || copy.try_edit(f).map_err(SyncError::from))
    }

    /// Record a sale, taking its base quantities out of stock.
    ///
    /// # Errors
    ///
    /// `Blocked` offline; `Model` if a product is missing or short on stock,
    /// or a line's quantity or unit does not fit the product as it is now.
    /// The working copy is unchanged on error.
    #[instrument(skip_all, fields(transaction = %transaction.id))]
    pub async fn create_transaction(
        &self,
        transaction: Transaction,
    ) -> Result<TransactionId, SyncError> {
        self.stage(MutatingAction::CreateTransaction, move |snapshot| {
            transaction.subtotal()?;
            for line in &transaction.items {
                let product = snapshot
                    .product_mut(&line.product_id)
                    .ok_or_else(|| ModelError::ProductNotFound(line.product_id.clone()))?;
                line.check_against(product)?;
                product.remove_stock(line.base_quantity()?)?;
            }
            let id = transaction.id.clone();
            snapshot.transactions.push(transaction);
            Ok(id)
        })
        .await
    }

    /// Void a sale and return its stock.
    ///
    /// # Errors
    ///
    /// `Blocked` offline; `Model` if the transaction does not exist.
    #[instrument(skip(self))]
    pub async fn delete_transaction(&self, id: &TransactionId) -> Result<Transaction, SyncError> {
        self.stage(MutatingAction::DeleteTransaction, |snapshot| {
            let index = snapshot
                .transactions
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| ModelError::TransactionNotFound(id.clone()))?;
            let removed = snapshot.transactions.remove(index);
            // Products deleted since the sale have no stock to return.
            for line in &removed.items {
                if let Some(product) = snapshot.product_mut(&line.product_id) {
                    product.restore_stock(line.base_quantity()?)?;
                }
            }
            Ok(removed)
        })
        .await
    }

    /// Add a product or replace the one with the same id.
    ///
    /// # Errors
    ///
    /// `Blocked` offline; `Model` if the product breaks a catalog invariant.
    #[instrument(skip_all, fields(product = %product.id))]
    pub async fn upsert_product(&self, product: Product) -> Result<(), SyncError> {
        self.stage(MutatingAction::UpsertProduct, move |snapshot| {
            product.validate()?;
            if !product.category.is_empty() && !snapshot.categories.contains(&product.category) {
                snapshot.categories.push(product.category.clone());
            }
            match snapshot.product_mut(&product.id) {
                Some(existing) => *existing = product,
                None => snapshot.products.push(product),
            }
            Ok(())
        })
        .await
    }

    /// Remove a product from the catalog. Past sales keep their lines.
    ///
    /// # Errors
    ///
    /// `Blocked` offline; `Model` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<Product, SyncError> {
        self.stage(MutatingAction::DeleteProduct, |snapshot| {
            let index = snapshot
                .products
                .iter()
                .position(|p| &p.id == id)
                .ok_or_else(|| ModelError::ProductNotFound(id.clone()))?;
            Ok(snapshot.products.remove(index))
        })
        .await
    }

    /// # Errors
    ///
    /// `Blocked` offline; `Model` if the amount is not positive.
    #[instrument(skip_all, fields(expenditure = %expenditure.id))]
    pub async fn record_expenditure(&self, expenditure: Expenditure) -> Result<(), SyncError> {
        self.stage(MutatingAction::RecordExpenditure, move |snapshot| {
            if expenditure.amount <= rust_decimal::Decimal::ZERO {
                return Err(ModelError::NonPositiveAmount(expenditure.amount));
            }
            snapshot.expenditures.push(expenditure);
            Ok(())
        })
        .await
    }

    /// # Errors
    ///
    /// `Blocked` offline; `Model` if the expenditure does not exist.
    #[instrument(skip(self))]
    pub async fn delete_expenditure(&self, id: &ExpenditureId) -> Result<Expenditure, SyncError> {
        self.stage(MutatingAction::DeleteExpenditure, |snapshot| {
            let index = snapshot
                .expenditures
                .iter()
                .position(|e| &e.id == id)
                .ok_or_else(|| ModelError::ExpenditureNotFound(id.clone()))?;
            Ok(snapshot.expenditures.remove(index))
        })
        .await
    }

    /// Push pending edits, then adopt the refreshed snapshot.
    ///
    /// Edits staged while the commit was in flight stay pending on top of
    /// the new baseline.
    ///
    /// # Errors
    ///
    /// `Blocked` offline, `CommitInProgress`, or the push error. On error the
    /// working copy keeps its delta so the same commit can be retried.
    #[instrument(skip(self))]
    pub async fn commit(&self) -> Result<CommitOutcome, SyncError> {
        self.gate
            .guard_async(MutatingAction::Commit, || async move {
                let (base, sent, delta, resets) = {
                    let copy = self.copy.read().await;
                    let resets = self.resets();
                    (copy.baseline().clone(), copy.working().clone(), copy.delta(), resets)
                };

                let outcome = self.coordinator.commit_and_sync(&base, &delta).await?;
                if let Some(committed) = outcome.snapshot() {
                    let mut copy = self.copy.write().await;
                    if self.resets() == resets {
                        let later = SnapshotDelta::between(&sent, copy.working());
                        copy.rebase_with(committed.clone(), |working| later.apply_to(working));
                    } else {
                        info!("device was reset during the commit, not adopting its result");
                    }
                }
                Ok::<_, SyncError>(outcome)
            })
            .await
    }

    /// Pull the canonical snapshot (e.g. at app start), keeping pending edits.
    ///
    /// # Errors
    ///
    /// `CommitInProgress`, `Network` or `Storage`; nothing changes on error.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<BusinessSnapshot, SyncError> {
        let (current, resets) = {
            let copy = self.copy.read().await;
            (copy.baseline().clone(), self.resets())
        };
        let canonical = self.coordinator.refresh(&current).await?;

        let mut copy = self.copy.write().await;
        if self.resets() == resets {
            let pending = copy.delta();
            copy.rebase_with(canonical.clone(), |working| pending.apply_to(working));
        } else {
            info!("device was reset during the refresh, not adopting its result");
        }
        Ok(canonical)
    }

    /// Open a settings edit surface on the committed business profile.
    pub async fn begin_profile_edit(&self) -> WorkingCopy<BusinessProfile> {
        WorkingCopy::begin(self.copy.read().await.baseline().business.clone())
    }

    /// Change one settings field.
    ///
    /// # Errors
    ///
    /// `Blocked` offline, leaving `copy` untouched.
    pub fn edit_profile(
        &self,
        copy: &mut WorkingCopy<BusinessProfile>,
        field: ProfileField,
    ) -> Result<(), SyncError> {
        self.gate.guard(MutatingAction::ChangeSettings, || {
            copy.set_field(field);
            Ok(())
        })
    }

    /// Commit a settings edit.
    ///
    /// Only the changed fields are pushed. On success `copy` is rebased and
    /// clean; on error it keeps its edits.
    ///
    /// # Errors
    ///
    /// `Blocked` offline, `CommitInProgress`, or the push error.
    #[instrument(skip_all)]
    pub async fn commit_profile(
        &self,
        copy: &mut WorkingCopy<BusinessProfile>,
    ) -> Result<CommitOutcome, SyncError> {
        self.gate
            .guard_async(MutatingAction::ChangeSettings, move || async move {
                let delta = SnapshotDelta::from_profile(copy.delta());
                let (base, resets) = {
                    let main = self.copy.read().await;
                    (main.baseline().clone(), self.resets())
                };

                let outcome = self.coordinator.commit_and_sync(&base, &delta).await?;
                if let Some(committed) = outcome.snapshot() {
                    let mut main = self.copy.write().await;
                    if self.resets() == resets {
                        copy.rebase(committed.business.clone());
                        let pending = main.delta();
                        main.rebase_with(committed.clone(), |working| pending.apply_to(working));
                    } else {
                        info!("device was reset during the commit, not adopting its result");
                    }
                }
                Ok::<_, SyncError>(outcome)
            })
            .await
    }

    /// Sign in and mark the device session as logged in.
    ///
    /// The working copy stays locked for the whole exchange, so no edit or
    /// sync can interleave with the session being saved.
    ///
    /// # Errors
    ///
    /// `CommitInProgress`, `VerificationRequired`, `Unauthorized`, `Network`,
    /// or `Storage` if the session flags cannot be persisted.
    #[instrument(skip_all, fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthSession, SyncError> {
        let mut copy = self.copy.write().await;
        let (session, committed) = self
            .coordinator
            .login(credentials, copy.baseline())
            .await?;

        let pending = copy.delta();
        copy.rebase_with(committed, |working| pending.apply_to(working));
        info!("signed in");
        Ok(session)
    }

    /// Forget the device's data (logout or reset).
    ///
    /// # Errors
    ///
    /// `CommitInProgress` while a commit or refresh is in flight, or
    /// `Storage` if the stored snapshot cannot be removed. In-memory state
    /// is left as it was on error.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), SyncError> {
        let mut copy = self.copy.write().await;
        self.coordinator.reset().await?;
        self.resets.fetch_add(1, Ordering::SeqCst);
        copy.rebase(BusinessSnapshot::default());
        info!("local state cleared");
        Ok(())
    }
}
