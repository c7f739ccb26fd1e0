//! Domain types shared across skuflow crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Issuance-order sequence number. Strictly increasing, one per accepted event.
pub type Sequence = u64;

/// Identifier of a product.
pub type ProductId = String;

/// A partial product update.
///
/// Absent fields mean "no change requested". The `sequence` is never
/// read from the wire; it is stamped by the sequencer right before the
/// event is queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductEvent {
    #[serde(default)]
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip)]
    pub sequence: Sequence,
}

impl ProductEvent {
    /// An event for `product_id` with no field changes and sequence 0.
    pub fn new(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: product_id.into(),
            price: None,
            stock: None,
            sequence: 0,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.stock = Some(stock);
        self
    }

    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = sequence;
        self
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.product_id.is_empty() {
            return Err(ValidationError::MissingProductId);
        }
        if let Some(price) = self.price
            && !(price >= 0.0 && price.is_finite())
        {
            return Err(ValidationError::NegativePrice);
        }
        if let Some(stock) = self.stock
            && stock < 0
        {
            return Err(ValidationError::NegativeStock);
        }
        Ok(())
    }
}

/// Reasons an incoming event is rejected before it reaches the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("product_id is required")]
    MissingProductId,
    #[error("price must be >= 0")]
    NegativePrice,
    #[error("stock must be >= 0")]
    NegativeStock,
}

/// Fully merged, externally visible product state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub price: f64,
    pub stock: i64,
}

impl Product {
    /// A product with every field at its default.
    pub fn empty(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: product_id.into(),
            price: 0.0,
            stock: 0,
        }
    }

    /// Overwrite only the fields present on `event`.
    pub fn apply(&mut self, event: &ProductEvent) {
        if let Some(price) = event.price {
            self.price = price;
        }
        if let Some(stock) = event.stock {
            self.stock = stock;
        }
    }
}
