//! Read side: queries answered straight from committed state, bypassing the bus.

use serde::{Deserialize, Serialize};

use allocation_core::{BatchReference, OrderId, Sku};

use crate::store::StoreError;
use crate::unit_of_work::UnitOfWork;

/// One allocated line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationView {
    pub sku: Sku,
    #[serde(rename = "batchref")]
    pub batch_reference: BatchReference,
}

/// Where each line of `order_id` is allocated, ordered by SKU then batch.
pub fn allocations<U: UnitOfWork>(order_id: &OrderId, uow: &U) -> Result<Vec<AllocationView>, StoreError> {
    let products = uow.snapshot()?;

    Ok(products
        .iter()
        .flat_map(|product| product.batches())
        .filter(|batch| batch.allocations().iter().any(|line| &line.order_id == order_id))
        .map(|batch| AllocationView {
            sku: batch.sku().clone(),
            batch_reference: batch.reference().clone(),
        })
        .collect())
}
