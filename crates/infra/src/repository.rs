//! Session-scoped access to products.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use allocation_core::{BatchReference, ExpectedVersion, Sku};
use allocation_domain::Product;

use crate::store::{ProductChange, ProductStore, StoreError};

/// Collection-like access to the products touched by one unit of work.
///
/// Everything added or returned is remembered until the session ends; `seen()`
/// yields those products (ordered by SKU) so their events can be harvested at
/// commit.
pub trait Repository {
    /// Track a newly created product and hand back the tracked instance.
    fn add(&mut self, product: Product) -> &mut Product;

    fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, StoreError>;

    /// The product for `sku`, created (and tracked as new) when none exists yet.
    fn get_or_create(&mut self, sku: &Sku) -> Result<&mut Product, StoreError>;

    /// The product owning the batch `reference`, if any.
    fn get_by_batchref(&mut self, reference: &BatchReference) -> Result<Option<&mut Product>, StoreError>;

    fn seen(&mut self) -> impl Iterator<Item = &mut Product>;
}

/// Repository over a `ProductStore` session.
///
/// Products are loaded on first access and cached for the rest of the session,
/// together with the version they were loaded at. `pending_changes()` turns
/// the modified ones into a save request.
#[derive(Debug)]
pub struct TrackedRepository<S> {
    store: S,
    seen: BTreeMap<Sku, Product>,
    expected: HashMap<Sku, ExpectedVersion>,
}

impl<S: ProductStore> TrackedRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            seen: BTreeMap::new(),
            expected: HashMap::new(),
        }
    }

    /// Products created or modified in this session, with their expected versions.
    pub fn pending_changes(&self) -> Vec<ProductChange> {
        self.seen
            .iter()
            .filter_map(|(sku, product)| {
                let expected = self.expected.get(sku).copied().unwrap_or(ExpectedVersion::Absent);
                let modified = match expected {
                    ExpectedVersion::Absent => true,
                    ExpectedVersion::Exact(version) => product.version_number() != version,
                };
                modified.then(|| ProductChange {
                    product: product.persisted_copy(),
                    expected,
                })
            })
            .collect()
    }

    /// Record that the current state is now the committed state.
    pub fn mark_committed(&mut self) {
        for (sku, product) in &self.seen {
            self.expected
                .insert(sku.clone(), ExpectedVersion::Exact(product.version_number()));
        }
    }

    /// Forget every uncommitted change (and any pending events with it).
    pub fn discard(&mut self) {
        self.seen.clear();
        self.expected.clear();
    }
}

impl<S: ProductStore> Repository for TrackedRepository<S> {
    fn add(&mut self, product: Product) -> &mut Product {
        let sku = product.sku().clone();
        self.expected.entry(sku.clone()).or_insert(ExpectedVersion::Absent);
        match self.seen.entry(sku) {
            Entry::Occupied(mut entry) => {
                entry.insert(product);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(product),
        }
    }

    fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, StoreError> {
        if !self.seen.contains_key(sku) {
            let Some(product) = self.store.load(sku)? else {
                return Ok(None);
            };
            self.expected
                .insert(sku.clone(), ExpectedVersion::Exact(product.version_number()));
            self.seen.insert(sku.clone(), product);
        }
        Ok(self.seen.get_mut(sku))
    }

    fn get_or_create(&mut self, sku: &Sku) -> Result<&mut Product, StoreError> {
        match self.seen.entry(sku.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let (product, expected) = match self.store.load(sku)? {
                    Some(product) => {
                        let version = product.version_number();
                        (product, ExpectedVersion::Exact(version))
                    }
                    None => (Product::new(sku.clone()), ExpectedVersion::Absent),
                };
                self.expected.insert(sku.clone(), expected);
                Ok(entry.insert(product))
            }
        }
    }

    fn get_by_batchref(&mut self, reference: &BatchReference) -> Result<Option<&mut Product>, StoreError> {
        let tracked = self
            .seen
            .values()
            .find(|p| p.batch(reference).is_some())
            .map(|p| p.sku().clone());

        let sku = match tracked {
            Some(sku) => sku,
            None => match self.store.sku_for_batch(reference)? {
                Some(sku) => sku,
                None => return Ok(None),
            },
        };
        self.get(&sku)
    }

    fn seen(&mut self) -> impl Iterator<Item = &mut Product> {
        self.seen.values_mut()
    }
}
