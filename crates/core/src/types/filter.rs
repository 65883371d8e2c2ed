//! Price and stock range filters for catalog listings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product::Product;

/// Errors raised for malformed filter bounds.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// A price bound is below zero.
    #[error("{field} cannot be negative (got {value})")]
    NegativePrice {
        /// Query field that carried the bound.
        field: &'static str,
        /// The rejected value.
        value: Decimal,
    },
}

/// How bounds the caller left out are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterDefaults {
    /// Missing bounds are zero. With one-sided comparisons this makes a bare
    /// listing return only free, out-of-stock products.
    #[default]
    Zero,
    /// Missing lower bounds are zero and missing upper bounds are unlimited.
    Unbounded,
}

/// Caller-supplied listing filter. Every bound is inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub min_stock: Option<u32>,
    pub max_stock: Option<u32>,
}

impl ProductFilter {
    /// Check that the supplied bounds are well formed.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::NegativePrice` if a price bound is negative.
    pub fn validate(&self) -> Result<(), FilterError> {
        for (field, bound) in [("minPrice", self.min_price), ("maxPrice", self.max_price)] {
            if let Some(value) = bound
                && value.is_sign_negative()
                && !value.is_zero()
            {
                return Err(FilterError::NegativePrice { field, value });
            }
        }
        Ok(())
    }

    /// Fill in missing bounds.
    #[must_use]
    pub fn resolve(&self, defaults: FilterDefaults) -> ResolvedFilter {
        let (max_price, max_stock) = match defaults {
            FilterDefaults::Zero => (
                self.max_price.unwrap_or(Decimal::ZERO),
                self.max_stock.unwrap_or(0),
            ),
            FilterDefaults::Unbounded => (
                self.max_price.unwrap_or(Decimal::MAX),
                self.max_stock.unwrap_or(u32::MAX),
            ),
        };

        ResolvedFilter {
            min_price: self.min_price.unwrap_or(Decimal::ZERO),
            max_price,
            min_stock: self.min_stock.unwrap_or(0),
            max_stock,
        }
    }
}

/// A filter with every bound present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFilter {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub min_stock: u32,
    pub max_stock: u32,
}

impl ResolvedFilter {
    /// Whether the product falls inside every bound.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        product.price >= self.min_price
            && product.price <= self.max_price
            && product.quantity >= self.min_stock
            && product.quantity <= self.max_stock
    }
}
