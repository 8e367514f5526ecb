//! Sales (transactions) and their lines.
//!
//! A transaction is a historical record. Each line copies the unit it was
//! sold in, *including the multiplier*, so later catalog edits never change
//! what a past sale meant.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalog::Product;
use super::error::ModelError;
use super::id::{ProductId, TransactionId};
use super::status::PaymentMethod;

/// The unit a line was sold in, frozen at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedUnit {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub multiplier: Decimal,
}

/// One product line of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLine {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: String,
    /// Quantity in the selected unit.
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    /// Price per selected unit.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Absent on lines sold in the base unit by older clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_unit: Option<SelectedUnit>,
}

impl TransactionLine {
    /// Build a line for `quantity` of `product` sold in `unit`.
    ///
    /// `None` sells in the base unit. The unit's multiplier is copied into
    /// the line and the price is the base selling price scaled by it.
    ///
    /// # Errors
    ///
    /// Returns an error if `quantity` is not positive or the unit is neither
    /// the base unit nor one of the product's declared variants.
    pub fn for_product(
        product: &Product,
        unit: Option<&str>,
        quantity: Decimal,
    ) -> Result<Self, ModelError> {
        if quantity <= Decimal::ZERO {
            return Err(ModelError::NonPositiveQuantity(quantity));
        }
        let unit_name = unit.unwrap_or(&product.base_unit);
        let multiplier =
            product
                .unit_multiplier(unit_name)
                .ok_or_else(|| ModelError::UnknownUnit {
                    product: product.id.clone(),
                    unit: unit_name.to_string(),
                })?;

        let price = product
            .selling_price
            .checked_mul(multiplier)
            .ok_or(ModelError::Overflow("line price"))?;

        Ok(Self {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity,
            price,
            selected_unit: Some(SelectedUnit {
                name: unit_name.to_string(),
                multiplier,
            }),
        })
    }

    /// Multiplier recorded at sale time; 1 for base-unit lines.
    #[must_use]
    pub fn multiplier(&self) -> Decimal {
        self.selected_unit
            .as_ref()
            .map_or(Decimal::ONE, |unit| unit.multiplier)
    }

    /// Check the line can be applied to `product` as it is now.
    ///
    /// The quantity must be positive and the selected unit must be the base
    /// unit or a declared variant with the multiplier the line recorded.
    ///
    /// # Errors
    ///
    /// Returns `NonPositiveQuantity`, `UnknownUnit` or `UnitMismatch`.
    pub fn check_against(&self, product: &Product) -> Result<(), ModelError> {
        if self.quantity <= Decimal::ZERO {
            return Err(ModelError::NonPositiveQuantity(self.quantity));
        }
        let unit = self
            .selected_unit
            .as_ref()
            .map_or(product.base_unit.as_str(), |u| u.name.as_str());
        let declared = product
            .unit_multiplier(unit)
            .ok_or_else(|| ModelError::UnknownUnit {
                product: product.id.clone(),
                unit: unit.to_string(),
            })?;
        let recorded = self.multiplier();
        if declared != recorded {
            return Err(ModelError::UnitMismatch {
                product: product.id.clone(),
                unit: unit.to_string(),
                recorded,
                declared,
            });
        }
        Ok(())
    }

    /// Quantity converted to base units, for stock movements.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Overflow` if the product does not fit a decimal.
    pub fn base_quantity(&self) -> Result<Decimal, ModelError> {
        self.quantity
            .checked_mul(self.multiplier())
            .ok_or(ModelError::Overflow("base quantity"))
    }

    /// Revenue for this line.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Overflow` if the product does not fit a decimal.
    pub fn line_total(&self) -> Result<Decimal, ModelError> {
        self.price
            .checked_mul(self.quantity)
            .ok_or(ModelError::Overflow("line total"))
    }
}

/// Stand-in timestamp for records cached before they carried one.
///
/// Fixed so that loading the same cache twice yields the same snapshot.
#[must_use]
pub const fn unrecorded_time() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(default = "unrecorded_time")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub items: Vec<TransactionLine>,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_name: Option<String>,
}

impl Transaction {
    /// Create a sale from its lines, with a fresh id and the current time.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Overflow` if the lines do not sum to a decimal.
    pub fn new(
        customer_name: impl Into<String>,
        items: Vec<TransactionLine>,
    ) -> Result<Self, ModelError> {
        let mut transaction = Self {
            id: TransactionId::generate(),
            created_at: Utc::now(),
            customer_name: customer_name.into(),
            items,
            total_amount: Decimal::ZERO,
            payment_method: PaymentMethod::default(),
            staff_name: None,
        };
        transaction.total_amount = transaction.subtotal()?;
        Ok(transaction)
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<TransactionId>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub const fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    /// Sum of line totals.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Overflow` if the sum does not fit a decimal.
    pub fn subtotal(&self) -> Result<Decimal, ModelError> {
        self.items.iter().try_fold(Decimal::ZERO, |sum, line| {
            sum.checked_add(line.line_total()?)
                .ok_or(ModelError::Overflow("transaction total"))
        })
    }
}
