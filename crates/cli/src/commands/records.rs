//! Sales, catalog and expenditure commands.
//!
//! Each command stages one change on the working copy and commits it
//! straight away.
//!
//! # Usage
//!
//! ```bash
//! gv sale create -p sneakers -u Pair -q 2 -c "Walk-in"
//! gv sale delete 3f2a...
//! gv product delete sneakers
//! gv expense record -a 2500 -c Transport -d "Delivery van"
//! gv expense delete 9b1c...
//! ```

use ginvoice_core::{
    Expenditure, ExpenditureId, ModelError, ProductId, Transaction, TransactionId,
    TransactionLine,
};
use ginvoice_sync::SyncError;
use rust_decimal::Decimal;
use tracing::info;

use super::DeviceWorkspace;
use super::session::report_outcome;

async fn commit(workspace: &DeviceWorkspace) -> Result<(), SyncError> {
    // Uncommitted edits do not outlive the process, so a failed commit
    // here means the change was not recorded anywhere.
    report_outcome(&workspace.commit().await?);
    Ok(())
}

/// Sell `quantity` of a product in the given unit.
///
/// # Errors
///
/// Returns `Blocked` offline, `Model` for an unknown product/unit or
/// insufficient stock, or the commit error.
pub async fn sell(
    workspace: &DeviceWorkspace,
    product_id: &str,
    unit: Option<&str>,
    quantity: Decimal,
    customer: &str,
) -> Result<(), SyncError> {
    let id = ProductId::from(product_id);
    let working = workspace.working().await;
    let product = working
        .product(&id)
        .ok_or_else(|| ModelError::ProductNotFound(id.clone()))?;

    let line = TransactionLine::for_product(product, unit, quantity)?;
    let transaction = Transaction::new(customer, vec![line])?;
    let total = transaction.total_amount;

    let tx_id = workspace.create_transaction(transaction).await?;
    info!(transaction = %tx_id, %total, "sale recorded");
    commit(workspace).await
}

/// # Errors
///
/// Returns `Blocked` offline, `Model` if the sale does not exist, or the
/// commit error.
pub async fn delete_sale(workspace: &DeviceWorkspace, id: &str) -> Result<(), SyncError> {
    let removed = workspace.delete_transaction(&TransactionId::from(id)).await?;
    info!(transaction = %removed.id, "sale voided");
    commit(workspace).await
}

/// # Errors
///
/// Returns `Blocked` offline, `Model` if the product does not exist, or the
/// commit error.
pub async fn delete_product(workspace: &DeviceWorkspace, id: &str) -> Result<(), SyncError> {
    let removed = workspace.delete_product(&ProductId::from(id)).await?;
    info!(product = %removed.id, name = %removed.name, "product deleted");
    commit(workspace).await
}

/// # Errors
///
/// Returns `Blocked` offline, `Model` for a non-positive amount, or the
/// commit error.
pub async fn record_expense(
    workspace: &DeviceWorkspace,
    amount: Decimal,
    category: &str,
    description: &str,
) -> Result<(), SyncError> {
    let expenditure = Expenditure::new(amount, category, description)?;
    let id = expenditure.id.clone();
    workspace.record_expenditure(expenditure).await?;
    info!(expenditure = %id, %amount, "expenditure recorded");
    commit(workspace).await
}

/// # Errors
///
/// Returns `Blocked` offline, `Model` if the expenditure does not exist, or
/// the commit error.
pub async fn delete_expense(workspace: &DeviceWorkspace, id: &str) -> Result<(), SyncError> {
    let removed = workspace.delete_expenditure(&ExpenditureId::from(id)).await?;
    info!(expenditure = %removed.id, "expenditure deleted");
    commit(workspace).await
}
