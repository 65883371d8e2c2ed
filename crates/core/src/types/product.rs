//! Catalog product records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;

/// Errors raised when validating product data supplied by a caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// The product name is blank.
    #[error("product name cannot be empty")]
    EmptyName,
    /// The price is below zero.
    #[error("product price cannot be negative (got {0})")]
    NegativePrice(Decimal),
}

/// A product as stored in the catalog.
///
/// Serialized with an `_id` key so snapshots written by earlier releases load
/// unchanged; `id` is accepted on input as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
}

impl Product {
    /// Copy the mutable fields of `other` into this record, keeping the ID.
    pub fn overwrite_from(&mut self, other: &Self) {
        self.name.clone_from(&other.name);
        self.description.clone_from(&other.description);
        self.price = other.price;
        self.quantity = other.quantity;
    }
}

/// Product payload received from a caller.
///
/// The ID is optional: creation assigns one, updates must name one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(default, rename = "_id", alias = "id")]
    pub id: Option<ProductId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
}

impl ProductDraft {
    /// Check the caller-supplied fields.
    ///
    /// # Errors
    ///
    /// Returns `ProductError` if the name is blank or the price is negative.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() {
            return Err(ProductError::EmptyName);
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(ProductError::NegativePrice(self.price));
        }
        Ok(())
    }

    /// Turn the draft into a stored record under the given ID.
    #[must_use]
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            quantity: self.quantity,
        }
    }
}
