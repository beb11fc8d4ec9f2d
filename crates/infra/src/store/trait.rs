use std::sync::Arc;

use thiserror::Error;

use allocation_core::{BatchReference, ExpectedVersion, Sku};
use allocation_domain::Product;

/// A product to persist together with the version it is expected to replace.
#[derive(Debug, Clone)]
pub struct ProductChange {
    pub product: Product,
    pub expected: ExpectedVersion,
}

/// Store operation error.
///
/// These are infrastructure errors, as opposed to domain errors (validation,
/// invariants). Only `Concurrency` is worth retrying.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Committed product state, addressable by SKU or by batch reference.
///
/// ## Save semantics
///
/// `save()`:
/// - checks every change's `ExpectedVersion` against the stored product
/// - rejects a batch reference already owned by a different product
/// - applies all changes or none
///
/// Stored products never carry pending events.
pub trait ProductStore: Send + Sync {
    fn load(&self, sku: &Sku) -> Result<Option<Product>, StoreError>;

    /// SKU of the product owning `reference`, if any.
    fn sku_for_batch(&self, reference: &BatchReference) -> Result<Option<Sku>, StoreError>;

    fn save(&self, changes: Vec<ProductChange>) -> Result<(), StoreError>;

    /// Every committed product, ordered by SKU.
    fn list(&self) -> Result<Vec<Product>, StoreError>;
}

impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    fn load(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        (**self).load(sku)
    }

    fn sku_for_batch(&self, reference: &BatchReference) -> Result<Option<Sku>, StoreError> {
        (**self).sku_for_batch(reference)
    }

    fn save(&self, changes: Vec<ProductChange>) -> Result<(), StoreError> {
        (**self).save(changes)
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list()
    }
}
