//! Profit and loss report over the cached snapshot.
//!
//! Reads the local cache only, so it works offline and without a backend
//! configured.

use chrono::Utc;
use ginvoice_core::ModelError;
use ginvoice_sync::analytics::{ReportPeriod, low_stock, summarize_period};
use ginvoice_sync::{LocalStore, SyncConfig};
use rust_decimal::Decimal;

/// Print the sales summary for `period` and, optionally, the low-stock list.
///
/// # Errors
///
/// Returns `Overflow` if the cached amounts are too large to total.
#[allow(clippy::print_stdout)]
pub async fn print(
    config: &SyncConfig,
    period: ReportPeriod,
    low_stock_threshold: Option<Decimal>,
) -> Result<(), ModelError> {
    let snapshot = config.file_store().load().await;
    let summary = summarize_period(
        &snapshot.transactions,
        &snapshot.products,
        &snapshot.expenditures,
        period,
        Utc::now(),
    )?;

    println!("Period:         {period}");
    println!("Sales:          {}", summary.transaction_count);
    println!("Revenue:        {:.2}", summary.revenue);
    println!("Cost of goods:  {:.2}", summary.cost_of_goods);
    println!("Gross profit:   {:.2}", summary.gross_profit);
    println!("Expenses:       {:.2}", summary.expenses);
    println!("Net profit:     {:.2}", summary.net_profit);

    if let Some(threshold) = low_stock_threshold {
        let low = low_stock(&snapshot.products, threshold);
        if low.is_empty() {
            println!("\nNo products at or below {threshold}.");
            return Ok(());
        }
        println!("\nLow stock:");
        for product in low {
            println!(
                "  {:<24} {:>8} {}",
                product.name, product.current_stock, product.base_unit
            );
        }
    }
    Ok(())
}
