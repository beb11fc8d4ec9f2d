//! Message handlers: one per command, zero or more per event.
//!
//! Command handlers run inside a unit of work and commit at most once; the
//! events harvested by that commit are dispatched after they return. Event
//! handlers perform side effects or raise follow-up commands.

use thiserror::Error;

use allocation_core::{BatchReference, DomainError, Sku};
use allocation_domain::{
    Allocate, Allocated, AllocationEvent, AllocationInbox, Batch, ChangeBatchQuantity, CreateBatch, Deallocated,
    OrderLine, OutOfStock,
};
use allocation_events::Event;

use crate::bootstrap::Dependencies;
use crate::repository::Repository;
use crate::store::StoreError;
use crate::unit_of_work::UnitOfWork;

/// Handler failure.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Invalid sku {0}")]
    InvalidSku(Sku),

    #[error("Unknown batch {0}")]
    UnknownBatch(BatchReference),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("side effect failed: {0}")]
    SideEffect(anyhow::Error),
}

impl HandlerError {
    /// Whether running the failed command again may succeed (a lost optimistic race).
    ///
    /// The failed command is not necessarily the one the caller sent: resume
    /// from the dispatch error (`AllocationService::retry`), not by re-sending.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HandlerError::Store(StoreError::Concurrency(_)))
    }
}

pub fn add_batch<U: UnitOfWork>(
    command: CreateBatch,
    deps: &Dependencies<U>,
    inbox: &mut AllocationInbox,
) -> Result<(), HandlerError> {
    let CreateBatch { reference, sku, qty, eta } = command;

    let mut uow = deps.uow.start(inbox);
    let products = uow.products();
    if let Some(owner) = products.get_by_batchref(&reference)? {
        return Err(DomainError::conflict(format!(
            "batch {reference} already exists for sku {}",
            owner.sku()
        ))
        .into());
    }
    let product = products.get_or_create(&sku)?;
    product.add_batch(Batch::new(reference.clone(), sku.clone(), qty, eta))?;
    uow.commit()?;

    tracing::info!(batch = %reference, sku = %sku, qty, "batch added");
    Ok(())
}

pub fn allocate<U: UnitOfWork>(
    command: Allocate,
    deps: &Dependencies<U>,
    inbox: &mut AllocationInbox,
) -> Result<(), HandlerError> {
    let line = OrderLine::new(command.order_id, command.sku, command.qty);
    let sku = line.sku.clone();
    let order_id = line.order_id.clone();

    let mut uow = deps.uow.start(inbox);
    let product = uow
        .products()
        .get(&sku)?
        .ok_or_else(|| HandlerError::InvalidSku(sku.clone()))?;
    let batch = product.allocate(line)?;
    uow.commit()?;

    match batch {
        Some(batch) => tracing::info!(order = %order_id, sku = %sku, batch = %batch, "line allocated"),
        None => tracing::info!(order = %order_id, sku = %sku, "line not allocated: out of stock"),
    }
    Ok(())
}

pub fn change_batch_quantity<U: UnitOfWork>(
    command: ChangeBatchQuantity,
    deps: &Dependencies<U>,
    inbox: &mut AllocationInbox,
) -> Result<(), HandlerError> {
    let ChangeBatchQuantity { reference, qty } = command;

    let mut uow = deps.uow.start(inbox);
    let product = uow
        .products()
        .get_by_batchref(&reference)?
        .ok_or_else(|| HandlerError::UnknownBatch(reference.clone()))?;
    product.change_batch_quantity(&reference, qty)?;
    uow.commit()?;

    tracing::info!(batch = %reference, qty, "batch quantity changed");
    Ok(())
}

pub fn send_out_of_stock_notification<U: UnitOfWork>(
    event: &OutOfStock,
    deps: &Dependencies<U>,
    _inbox: &mut AllocationInbox,
) -> Result<(), HandlerError> {
    let destination = &deps.config.out_of_stock_destination;
    deps.notifications
        .send(destination, &format!("Out of stock for {}", event.sku))
        .map_err(HandlerError::SideEffect)?;

    tracing::info!(sku = %event.sku, destination = %destination, "out of stock notification sent");
    Ok(())
}

/// Publishes on the channel named after the event type.
pub fn publish_allocated_event<U: UnitOfWork>(
    event: &Allocated,
    deps: &Dependencies<U>,
    _inbox: &mut AllocationInbox,
) -> Result<(), HandlerError> {
    let event = AllocationEvent::from(event.clone());
    deps.publisher
        .publish(event.event_type(), &event)
        .map_err(HandlerError::SideEffect)
}

/// A shed line goes back through normal allocation.
pub fn reallocate<U: UnitOfWork>(
    event: &Deallocated,
    _deps: &Dependencies<U>,
    inbox: &mut AllocationInbox,
) -> Result<(), HandlerError> {
    inbox.push_command(
        Allocate {
            order_id: event.order_id.clone(),
            sku: event.sku.clone(),
            qty: event.qty,
        }
        .into(),
    );
    Ok(())
}
