//! Model invariant violations.

use rust_decimal::Decimal;
use thiserror::Error;

use super::id::{ExpenditureId, ProductId, TransactionId};

/// A value broke one of the data model's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A unit variant multiplier was zero or negative.
    #[error("unit '{unit}' must have a positive multiplier, got {multiplier}")]
    NonPositiveMultiplier { unit: String, multiplier: Decimal },

    /// A product's stock went below zero.
    #[error("product {0} cannot have negative stock")]
    NegativeStock(ProductId),

    /// A quantity was zero or negative.
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    /// A monetary amount was zero or negative.
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// The selected unit is neither the base unit nor a declared variant.
    #[error("unit '{unit}' is not defined for product {product}")]
    UnknownUnit { product: ProductId, unit: String },

    /// The line's recorded multiplier disagrees with the product's unit.
    #[error("unit '{unit}' of product {product} is x{declared}, line recorded x{recorded}")]
    UnitMismatch {
        product: ProductId,
        unit: String,
        recorded: Decimal,
        declared: Decimal,
    },

    /// Decimal arithmetic left the representable range.
    #[error("{0} is out of range")]
    Overflow(&'static str),

    /// Not enough stock to fulfil a sale line.
    #[error("insufficient stock for product {product}: need {needed}, have {available}")]
    InsufficientStock {
        product: ProductId,
        needed: Decimal,
        available: Decimal,
    },

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("expenditure not found: {0}")]
    ExpenditureNotFound(ExpenditureId),
}
