use std::collections::VecDeque;

use allocation_core::{AggregateRoot, BatchReference, DomainError, DomainResult, Sku};

use crate::{Allocated, AllocationEvent, Batch, Deallocated, OrderLine, OutOfStock};

/// Aggregate root: Product.
///
/// One product per SKU owns every batch of that SKU and is the unit of
/// transactional consistency. Operations never perform IO; anything the outside
/// world should react to is queued as an event and drained by the unit of work
/// at commit.
#[derive(Debug, Clone)]
pub struct Product {
    sku: Sku,
    batches: Vec<Batch>,
    version_number: u64,
    events: VecDeque<AllocationEvent>,
}

impl Product {
    /// A product with no stock yet.
    pub fn new(sku: impl Into<Sku>) -> Self {
        Self {
            sku: sku.into(),
            batches: Vec::new(),
            version_number: 0,
            events: VecDeque::new(),
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// Batches in the order they were added.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, reference: &BatchReference) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    /// Optimistic concurrency token; bumped by every state change.
    pub fn version_number(&self) -> u64 {
        self.version_number
    }

    /// Events recorded since the last drain, oldest first.
    pub fn pending_events(&self) -> impl Iterator<Item = &AllocationEvent> {
        self.events.iter()
    }

    /// Remove and yield pending events in emission order.
    pub fn drain_events(&mut self) -> impl Iterator<Item = AllocationEvent> + '_ {
        self.events.drain(..)
    }

    /// A copy suitable for storage: same state, no pending events.
    pub fn persisted_copy(&self) -> Self {
        Self {
            sku: self.sku.clone(),
            batches: self.batches.clone(),
            version_number: self.version_number,
            events: VecDeque::new(),
        }
    }

    pub fn add_batch(&mut self, batch: Batch) -> DomainResult<()> {
        if batch.sku() != &self.sku {
            return Err(DomainError::validation(format!(
                "batch {} is for sku {}, not {}",
                batch.reference(),
                batch.sku(),
                self.sku
            )));
        }
        if self.batch(batch.reference()).is_some() {
            return Err(DomainError::conflict(format!(
                "batch {} already exists",
                batch.reference()
            )));
        }

        self.batches.push(batch);
        self.version_number += 1;
        Ok(())
    }

    /// Allocate `line` to the preferred batch that can hold it.
    ///
    /// Returns `Ok(None)` and records `OutOfStock` when nothing fits. A line
    /// already held by one of this product's batches is reported where it is,
    /// without a second allocation.
    pub fn allocate(&mut self, line: OrderLine) -> DomainResult<Option<BatchReference>> {
        if line.sku != self.sku {
            return Err(DomainError::validation(format!(
                "order line for sku {} sent to product {}",
                line.sku, self.sku
            )));
        }
        if line.quantity == 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }

        if let Some(holder) = self.batches.iter().find(|b| b.is_allocated(&line)) {
            return Ok(Some(holder.reference().clone()));
        }

        let Some(batch) = self
            .batches
            .iter_mut()
            .filter(|b| b.can_allocate(&line))
            .min_by_key(|b| b.allocation_priority())
        else {
            self.events.push_back(
                OutOfStock {
                    sku: self.sku.clone(),
                }
                .into(),
            );
            return Ok(None);
        };

        let reference = batch.reference().clone();
        batch.allocate(line.clone());
        self.version_number += 1;
        self.events.push_back(
            Allocated {
                order_id: line.order_id,
                sku: line.sku,
                qty: line.quantity,
                batch_reference: reference.clone(),
            }
            .into(),
        );
        Ok(Some(reference))
    }

    /// Set a batch's purchased quantity, shedding allocations that no longer fit.
    ///
    /// Lines are removed newest first until the batch is no longer
    /// over-allocated; each removal records `Deallocated` so the line can be
    /// allocated again elsewhere.
    pub fn change_batch_quantity(&mut self, reference: &BatchReference, quantity: u32) -> DomainResult<()> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.reference() == reference)
            .ok_or_else(|| DomainError::not_found(format!("batch {reference}")))?;

        batch.set_purchased_quantity(quantity);
        while batch.available_quantity() < 0 {
            let line = batch.deallocate_newest().ok_or_else(|| {
                DomainError::invariant(format!("batch {reference} is over-allocated with nothing to shed"))
            })?;
            self.events.push_back(
                Deallocated {
                    order_id: line.order_id,
                    sku: line.sku,
                    qty: line.quantity,
                }
                .into(),
            );
        }

        self.version_number += 1;
        Ok(())
    }
}

impl AggregateRoot for Product {
    type Id = Sku;

    fn id(&self) -> &Self::Id {
        &self.sku
    }

    fn version(&self) -> u64 {
        self.version_number
    }
}
