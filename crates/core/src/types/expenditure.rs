//! Business expenditures (rent, restocking trips, utilities).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::id::ExpenditureId;
use super::sale::unrecorded_time;

/// Money spent by the business outside of stock purchases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expenditure {
    pub id: ExpenditureId,
    #[serde(default = "unrecorded_time")]
    pub date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
}

impl Expenditure {
    /// Record an expenditure made now.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::NonPositiveAmount` if `amount <= 0`.
    pub fn new(
        amount: Decimal,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ModelError> {
        if amount <= Decimal::ZERO {
            return Err(ModelError::NonPositiveAmount(amount));
        }
        Ok(Self {
            id: ExpenditureId::generate(),
            date: Utc::now(),
            amount,
            category: category.into(),
            description: description.into(),
        })
    }
}
