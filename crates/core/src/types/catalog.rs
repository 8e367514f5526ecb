//! Product catalog types.
//!
//! A product is stocked and costed in its *base unit*. Alternate units
//! (a carton of 12, a half bag) are declared as [`UnitVariant`]s whose
//! multiplier converts one of that unit into base units.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::id::ProductId;

const DEFAULT_BASE_UNIT: &str = "Piece";

fn default_base_unit() -> String {
    DEFAULT_BASE_UNIT.to_string()
}

/// An alternate measurement unit for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitVariant {
    pub name: String,
    /// Base units per one of this unit. Always positive.
    #[serde(with = "rust_decimal::serde::float")]
    pub multiplier: Decimal,
}

impl UnitVariant {
    /// Create a unit variant.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::NonPositiveMultiplier` if `multiplier <= 0`.
    pub fn new(name: impl Into<String>, multiplier: Decimal) -> Result<Self, ModelError> {
        let name = name.into();
        if multiplier <= Decimal::ZERO {
            return Err(ModelError::NonPositiveMultiplier {
                unit: name,
                multiplier,
            });
        }
        Ok(Self { name, multiplier })
    }
}

/// A stocked product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub category: String,
    /// Stock on hand, in base units.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub current_stock: Decimal,
    /// Selling price per base unit.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub selling_price: Decimal,
    /// Cost price per base unit.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub cost_price: Decimal,
    #[serde(default = "default_base_unit")]
    pub base_unit: String,
    #[serde(default)]
    pub units: Vec<UnitVariant>,
}

impl Product {
    /// Create a product with a fresh id, no stock and no alternate units.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        base_unit: impl Into<String>,
        cost_price: Decimal,
        selling_price: Decimal,
    ) -> Self {
        Self {
            id: ProductId::generate(),
            name: name.into(),
            category: String::new(),
            current_stock: Decimal::ZERO,
            selling_price,
            cost_price,
            base_unit: base_unit.into(),
            units: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<ProductId>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub const fn with_stock(mut self, stock: Decimal) -> Self {
        self.current_stock = stock;
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: UnitVariant) -> Self {
        self.units.push(unit);
        self
    }

    /// Multiplier for a unit of this product, by name.
    ///
    /// The base unit always resolves to 1. Returns `None` for units the
    /// product does not declare.
    #[must_use]
    pub fn unit_multiplier(&self, unit: &str) -> Option<Decimal> {
        if unit == self.base_unit {
            return Some(Decimal::ONE);
        }
        self.units
            .iter()
            .find(|variant| variant.name == unit)
            .map(|variant| variant.multiplier)
    }

    /// Check the catalog invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if any variant multiplier is not positive or stock is
    /// negative.
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(bad) = self.units.iter().find(|u| u.multiplier <= Decimal::ZERO) {
            return Err(ModelError::NonPositiveMultiplier {
                unit: bad.name.clone(),
                multiplier: bad.multiplier,
            });
        }
        if self.current_stock < Decimal::ZERO {
            return Err(ModelError::NegativeStock(self.id.clone()));
        }
        Ok(())
    }

    /// Take `base_quantity` base units out of stock.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::InsufficientStock` and leaves stock untouched if
    /// there is not enough on hand.
    pub fn remove_stock(&mut self, base_quantity: Decimal) -> Result<(), ModelError> {
        if base_quantity > self.current_stock {
            return Err(ModelError::InsufficientStock {
                product: self.id.clone(),
                needed: base_quantity,
                available: self.current_stock,
            });
        }
        self.current_stock = self
            .current_stock
            .checked_sub(base_quantity)
            .ok_or(ModelError::Overflow("stock"))?;
        Ok(())
    }

    /// Put `base_quantity` base units back into stock (e.g. a voided sale).
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Overflow` and leaves stock untouched if the new
    /// level does not fit a decimal.
    pub fn restore_stock(&mut self, base_quantity: Decimal) -> Result<(), ModelError> {
        self.current_stock = self
            .current_stock
            .checked_add(base_quantity)
            .ok_or(ModelError::Overflow("stock"))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rice() -> Product {
        Product::new("Rice", "kg", Decimal::from(900), Decimal::from(1200))
            .with_id("18")
            .with_stock(Decimal::from(100))
            .with_unit(UnitVariant::new("Bag", Decimal::from(50)).unwrap())
    }

    #[test]
    fn test_unit_variant_rejects_non_positive_multiplier() {
        assert!(UnitVariant::new("Half", Decimal::ZERO).is_err());
        assert!(UnitVariant::new("Debt", Decimal::from(-2)).is_err());
        assert!(UnitVariant::new("Pair", Decimal::TWO).is_ok());
    }

    #[test]
    fn test_unit_multiplier_resolves_base_and_variants() {
        let product = rice();
        assert_eq!(product.unit_multiplier("kg"), Some(Decimal::ONE));
        assert_eq!(product.unit_multiplier("Bag"), Some(Decimal::from(50)));
        assert_eq!(product.unit_multiplier("Crate"), None);
    }

    #[test]
    fn test_validate_catches_bad_variant_from_cache() {
        let mut product = rice();
        product.units.push(UnitVariant {
            name: "Broken".into(),
            multiplier: Decimal::ZERO,
        });
        assert!(matches!(
            product.validate(),
            Err(ModelError::NonPositiveMultiplier { .. })
        ));
    }

    #[test]
    fn test_remove_stock_is_all_or_nothing() {
        let mut product = rice();
        let err = product.remove_stock(Decimal::from(101)).unwrap_err();
        assert!(matches!(err, ModelError::InsufficientStock { .. }));
        assert_eq!(product.current_stock, Decimal::from(100));

        product.remove_stock(Decimal::from(50)).unwrap();
        assert_eq!(product.current_stock, Decimal::from(50));
        product.restore_stock(Decimal::from(50)).unwrap();
        assert_eq!(product.current_stock, Decimal::from(100));
    }

    #[test]
    fn test_deserializes_web_client_product() {
        let json = r#"{"id":"1","name":"Apple","category":"Fruits","currentStock":10,
            "sellingPrice":100,"baseUnit":"Piece","units":[]}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id.as_str(), "1");
        assert_eq!(product.current_stock, Decimal::from(10));
        assert_eq!(product.cost_price, Decimal::ZERO);
        assert!(product.units.is_empty());
    }
}
