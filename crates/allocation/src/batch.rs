use chrono::NaiveDate;

use allocation_core::{BatchReference, Entity, Sku};

use crate::OrderLine;

/// A quantity of one SKU bought on a single purchase order.
///
/// Batches are owned by their `Product`; every mutator is crate-private so
/// stock can only change through the aggregate.
///
/// Identity is the reference: two batches with the same reference are the same
/// batch whatever their quantities.
#[derive(Debug, Clone)]
pub struct Batch {
    reference: BatchReference,
    sku: Sku,
    eta: Option<NaiveDate>,
    purchased_quantity: u32,
    /// Allocation order is kept; deallocation pops the newest line first.
    allocations: Vec<OrderLine>,
}

impl Batch {
    pub fn new(
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            eta,
            purchased_quantity,
            allocations: Vec::new(),
        }
    }

    pub fn reference(&self) -> &BatchReference {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    pub fn allocations(&self) -> &[OrderLine] {
        &self.allocations
    }

    pub fn allocated_quantity(&self) -> i64 {
        self.allocations.iter().map(|l| i64::from(l.quantity)).sum()
    }

    /// Negative only transiently, while a quantity change is being resolved.
    pub fn available_quantity(&self) -> i64 {
        i64::from(self.purchased_quantity) - self.allocated_quantity()
    }

    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == line.sku && self.available_quantity() >= i64::from(line.quantity)
    }

    /// Sort key for allocation preference.
    ///
    /// Warehouse stock (`eta = None`) sorts before every shipment; shipments
    /// sort by arrival date.
    pub fn allocation_priority(&self) -> (bool, Option<NaiveDate>) {
        (self.eta.is_some(), self.eta)
    }

    /// Adds the line if it fits. Re-adding a held line is a no-op.
    pub(crate) fn allocate(&mut self, line: OrderLine) {
        if self.is_allocated(&line) || !self.can_allocate(&line) {
            return;
        }
        self.allocations.push(line);
    }

    /// Removes the most recently allocated line.
    pub(crate) fn deallocate_newest(&mut self) -> Option<OrderLine> {
        self.allocations.pop()
    }

    pub(crate) fn set_purchased_quantity(&mut self, quantity: u32) {
        self.purchased_quantity = quantity;
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

impl Eq for Batch {}

impl core::hash::Hash for Batch {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

impl Entity for Batch {
    type Id = BatchReference;

    fn id(&self) -> &Self::Id {
        &self.reference
    }
}
