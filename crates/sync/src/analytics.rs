//! Dashboard and report aggregations.
//!
//! Every cost figure goes through [`crate::cost`]. Totals use checked
//! arithmetic because the figures come straight from cached or server data.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Days, Months, NaiveDate, NaiveTime, Utc};
use ginvoice_core::{Expenditure, ModelError, Product, ProductId, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::cost::extended_line_cost;

/// Profit and loss over a set of sales and expenditures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub revenue: Decimal,
    pub cost_of_goods: Decimal,
    pub gross_profit: Decimal,
    pub expenses: Decimal,
    pub net_profit: Decimal,
    pub transaction_count: usize,
}

/// Window a report covers, in UTC calendar days.
///
/// Parses from the dashboard's range presets: `all`, `today`, `<n>d`
/// (today and the `n - 1` days before it) or a `YYYY-MM` month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportPeriod {
    #[default]
    All,
    Today,
    LastDays(u32),
    /// Calendar month starting on the given first day.
    Month(NaiveDate),
}

impl ReportPeriod {
    /// Half-open `[start, end)` window, or `None` for all history.
    #[must_use]
    pub fn bounds(self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = now.date_naive();
        let (first, last) = match self {
            Self::All => return None,
            Self::Today => (today, today),
            Self::LastDays(days) => (
                today
                    .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
                    .unwrap_or(NaiveDate::MIN),
                today,
            ),
            Self::Month(first) => (
                first,
                first
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .unwrap_or(NaiveDate::MAX),
            ),
        };
        let end = last.succ_opt().map_or(DateTime::<Utc>::MAX_UTC, start_of);
        Some((start_of(first), end))
    }

    /// Whether `at` falls inside the window.
    #[must_use]
    pub fn contains(self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.bounds(now)
            .is_none_or(|(start, end)| start <= at && at < end)
    }
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

impl FromStr for ReportPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "all" => return Ok(Self::All),
            "today" => return Ok(Self::Today),
            _ => {}
        }
        if let Some(days) = s.strip_suffix('d') {
            return match days.parse::<u32>() {
                Ok(0) | Err(_) => Err(format!("expected a positive day count, got `{s}`")),
                Ok(days) => Ok(Self::LastDays(days)),
            };
        }
        NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
            .map(Self::Month)
            .map_err(|_| format!("expected `all`, `today`, `<n>d` or `YYYY-MM`, got `{s}`"))
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Today => f.write_str("today"),
            Self::LastDays(days) => write!(f, "{days}d"),
            Self::Month(first) => write!(f, "{}", first.format("%Y-%m")),
        }
    }
}

fn add(sum: Decimal, value: Decimal, what: &'static str) -> Result<Decimal, ModelError> {
    sum.checked_add(value).ok_or(ModelError::Overflow(what))
}

fn aggregate<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
    products: &[Product],
    expenditures: impl IntoIterator<Item = &'a Expenditure>,
) -> Result<SalesSummary, ModelError> {
    let catalog: HashMap<&ProductId, &Product> = products.iter().map(|p| (&p.id, p)).collect();
    let mut summary = SalesSummary::default();

    for transaction in transactions {
        summary.transaction_count += 1;
        for line in &transaction.items {
            summary.revenue = add(summary.revenue, line.line_total()?, "revenue")?;
            match catalog.get(&line.product_id) {
                Some(product) => {
                    let cost = extended_line_cost(product, line)?;
                    summary.cost_of_goods = add(summary.cost_of_goods, cost, "cost of goods")?;
                }
                None => debug!(
                    transaction = %transaction.id,
                    product = %line.product_id,
                    "line references a deleted product, costed at zero"
                ),
            }
        }
    }

    for expenditure in expenditures {
        summary.expenses = add(summary.expenses, expenditure.amount, "expenses")?;
    }
    summary.gross_profit = summary
        .revenue
        .checked_sub(summary.cost_of_goods)
        .ok_or(ModelError::Overflow("gross profit"))?;
    summary.net_profit = summary
        .gross_profit
        .checked_sub(summary.expenses)
        .ok_or(ModelError::Overflow("net profit"))?;
    Ok(summary)
}

/// Aggregate sales against the current catalog.
///
/// Lines whose product has since been deleted still count as revenue but
/// contribute no cost, since there is no cost price left to resolve.
///
/// # Errors
///
/// Returns `ModelError::Overflow` if a total does not fit a decimal.
pub fn summarize(
    transactions: &[Transaction],
    products: &[Product],
    expenditures: &[Expenditure],
) -> Result<SalesSummary, ModelError> {
    aggregate(transactions, products, expenditures)
}

/// [`summarize`] restricted to sales and expenditures dated inside `period`.
///
/// Records cached without a date carry [`ginvoice_core::unrecorded_time`]
/// and so only show up under [`ReportPeriod::All`].
///
/// # Errors
///
/// Returns `ModelError::Overflow` if a total does not fit a decimal.
pub fn summarize_period(
    transactions: &[Transaction],
    products: &[Product],
    expenditures: &[Expenditure],
    period: ReportPeriod,
    now: DateTime<Utc>,
) -> Result<SalesSummary, ModelError> {
    aggregate(
        transactions
            .iter()
            .filter(|t| period.contains(t.created_at, now)),
        products,
        expenditures.iter().filter(|e| period.contains(e.date, now)),
    )
}

/// Products at or below `threshold` base units, lowest stock first.
#[must_use]
pub fn low_stock(products: &[Product], threshold: Decimal) -> Vec<&Product> {
    let mut low: Vec<&Product> = products
        .iter()
        .filter(|p| p.current_stock <= threshold)
        .collect();
    low.sort_by(|a, b| a.current_stock.cmp(&b.current_stock));
    low
}
