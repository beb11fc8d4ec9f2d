use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use allocation_core::{BatchReference, Sku};
use allocation_domain::Product;

use super::r#trait::{ProductChange, ProductStore, StoreError};

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<Sku, Product>,
    batch_owners: HashMap<BatchReference, Sku>,
}

/// In-memory product store.
///
/// Intended for tests/dev and for running the service without a database.
/// Safe to share between threads (`Arc<InMemoryProductStore>`).
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    state: RwLock<State>,
    saves: AtomicU64,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ProductStore for InMemoryProductStore {
    fn load(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.products.get(sku).cloned())
    }

    fn sku_for_batch(&self, reference: &BatchReference) -> Result<Option<Sku>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.batch_owners.get(reference).cloned())
    }

    fn save(&self, changes: Vec<ProductChange>) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        // Validate everything before touching state (all or nothing).
        for change in &changes {
            let sku = change.product.sku();
            let current = state.products.get(sku).map(Product::version_number);
            if !change.expected.matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "product {sku}: expected {:?}, found {current:?}",
                    change.expected
                )));
            }

            for batch in change.product.batches() {
                let claimed_elsewhere = state
                    .batch_owners
                    .get(batch.reference())
                    .is_some_and(|owner| owner != sku);
                let claimed_in_change = changes.iter().any(|other| {
                    other.product.sku() != sku && other.product.batch(batch.reference()).is_some()
                });
                if claimed_elsewhere || claimed_in_change {
                    return Err(StoreError::Integrity(format!(
                        "batch {} cannot belong to more than one product",
                        batch.reference()
                    )));
                }
            }
        }

        for change in changes {
            let product = change.product.persisted_copy();
            let sku = product.sku().clone();
            for batch in product.batches() {
                state.batch_owners.insert(batch.reference().clone(), sku.clone());
            }
            state.products.insert(sku, product);
        }

        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.products.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use allocation_core::ExpectedVersion;
    use allocation_domain::{Batch, OrderLine};

    use super::*;

    fn product(sku: &str, batch: &str) -> Product {
        let mut product = Product::new(sku);
        product.add_batch(Batch::new(batch, sku, 10, None)).unwrap();
        product
    }

    fn create(product: Product) -> ProductChange {
        ProductChange {
            product,
            expected: ExpectedVersion::Absent,
        }
    }

    #[test]
    fn saved_products_can_be_loaded_by_sku_and_batch() {
        let store = InMemoryProductStore::new();
        store.save(vec![create(product("sku1", "b1"))]).unwrap();

        let loaded = store.load(&"sku1".into()).unwrap().unwrap();
        assert_eq!(loaded.batches().len(), 1);
        assert_eq!(store.sku_for_batch(&"b1".into()).unwrap(), Some(Sku::new("sku1")));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn stale_version_is_a_concurrency_error_and_changes_nothing() {
        let store = InMemoryProductStore::new();
        store.save(vec![create(product("sku1", "b1"))]).unwrap();

        let mut winner = store.load(&"sku1".into()).unwrap().unwrap();
        let mut loser = store.load(&"sku1".into()).unwrap().unwrap();
        let expected = ExpectedVersion::Exact(winner.version_number());

        winner.allocate(OrderLine::new("o1", "sku1", 1)).unwrap();
        store.save(vec![ProductChange { product: winner, expected }]).unwrap();

        loser.allocate(OrderLine::new("o2", "sku1", 1)).unwrap();
        let err = store.save(vec![ProductChange { product: loser, expected }]).unwrap_err();

        assert!(matches!(err, StoreError::Concurrency(_)));
        let stored = store.load(&"sku1".into()).unwrap().unwrap();
        assert_eq!(stored.batches()[0].allocations().len(), 1);
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn creating_an_existing_product_conflicts() {
        let store = InMemoryProductStore::new();
        store.save(vec![create(product("sku1", "b1"))]).unwrap();

        let err = store.save(vec![create(product("sku1", "b2"))]).unwrap_err();

        assert!(matches!(err, StoreError::Concurrency(_)));
    }

    #[test]
    fn batch_reference_cannot_move_between_products() {
        let store = InMemoryProductStore::new();
        store.save(vec![create(product("sku1", "b1"))]).unwrap();

        let err = store.save(vec![create(product("sku2", "b1"))]).unwrap_err();

        assert!(matches!(err, StoreError::Integrity(_)));
        assert!(store.load(&"sku2".into()).unwrap().is_none());
    }

    #[test]
    fn stored_products_have_no_pending_events() {
        let store = InMemoryProductStore::new();
        let mut p = product("sku1", "b1");
        p.allocate(OrderLine::new("o1", "sku1", 1)).unwrap();
        store.save(vec![create(p)]).unwrap();

        let loaded = store.load(&"sku1".into()).unwrap().unwrap();
        assert_eq!(loaded.pending_events().count(), 0);
    }

    #[test]
    fn list_is_ordered_by_sku() {
        let store = InMemoryProductStore::new();
        store
            .save(vec![create(product("sku2", "b2")), create(product("sku1", "b1"))])
            .unwrap();

        let skus: Vec<_> = store.list().unwrap().iter().map(|p| p.sku().to_string()).collect();
        assert_eq!(skus, vec!["sku1", "sku2"]);
    }
}
