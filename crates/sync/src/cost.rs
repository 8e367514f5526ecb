//! Unit-cost resolution.
//!
//! This is the only place cost of goods is computed. Dashboards, reports
//! and receipts all call into here.

use ginvoice_core::{ModelError, Product, TransactionLine};
use rust_decimal::Decimal;

/// Cost of one selected unit on `line`.
///
/// `product.cost_price` is per base unit; the multiplier is the one recorded
/// on the line when it was sold, so removing or re-pricing a unit variant
/// later does not rewrite history.
///
/// # Errors
///
/// Returns `ModelError::Overflow` if the cost does not fit a decimal. Both
/// inputs come from cached or server data, so this is reported rather than
/// trusted.
pub fn resolve_line_cost(product: &Product, line: &TransactionLine) -> Result<Decimal, ModelError> {
    product
        .cost_price
        .checked_mul(line.multiplier())
        .ok_or(ModelError::Overflow("unit cost"))
}

/// Cost of the whole line (`resolve_line_cost × quantity`).
///
/// # Errors
///
/// Returns `ModelError::Overflow` if the cost does not fit a decimal.
pub fn extended_line_cost(product: &Product, line: &TransactionLine) -> Result<Decimal, ModelError> {
    resolve_line_cost(product, line)?
        .checked_mul(line.quantity)
        .ok_or(ModelError::Overflow("line cost"))
}
