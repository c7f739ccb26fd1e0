//! ProductStore — in-memory product state guarded by sequence numbers.
//!
//! A single reader/writer lock covers the whole map. Reads run
//! concurrently with each other; every upsert is exclusive, even across
//! different products. Updates are O(1) and never block on I/O.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use skuflow_core::{Product, ProductEvent, ProductId, Sequence};

/// What `upsert` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First event for this product; entry created.
    Created,
    /// Newer than the stored state; present fields merged.
    Applied,
    /// Sequence at or below the stored one; discarded.
    Stale,
    /// Empty product id; nothing to do.
    Ignored,
}

/// Internal per-product record. `last_sequence` never leaves the store.
#[derive(Debug, Clone)]
struct ProductState {
    product: Product,
    last_sequence: Sequence,
}

/// Thread-safe product store.
#[derive(Clone, Default)]
pub struct ProductStore {
    products: Arc<RwLock<HashMap<ProductId, ProductState>>>,
}

impl ProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current merged snapshot for a product.
    pub fn get(&self, product_id: &str) -> Option<Product> {
        let products = self
            .products
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        products.get(product_id).map(|s| s.product.clone())
    }

    /// Apply a partial update under last-writer-wins by sequence.
    pub fn upsert(&self, event: &ProductEvent) -> UpsertOutcome {
        if event.product_id.is_empty() {
            return UpsertOutcome::Ignored;
        }

        let mut products = self
            .products
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match products.get_mut(&event.product_id) {
            Some(state) => {
                if event.sequence <= state.last_sequence {
                    trace!(
                        product_id = %event.product_id,
                        sequence = event.sequence,
                        last_sequence = state.last_sequence,
                        "stale event discarded"
                    );
                    return UpsertOutcome::Stale;
                }
                state.product.apply(event);
                state.last_sequence = event.sequence;
                UpsertOutcome::Applied
            }
            None => {
                let mut product = Product::empty(event.product_id.clone());
                product.apply(event);
                products.insert(
                    event.product_id.clone(),
                    ProductState {
                        product,
                        last_sequence: event.sequence,
                    },
                );
                UpsertOutcome::Created
            }
        }
    }

    /// Number of products with state.
    pub fn len(&self) -> usize {
        self.products
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
