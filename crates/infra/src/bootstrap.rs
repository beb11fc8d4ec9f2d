//! Composition root: wires handlers to the bus and exposes the service facade.

use std::sync::Arc;

use chrono::NaiveDate;

use allocation_core::{BatchReference, OrderId, Sku};
use allocation_domain::{
    Allocate, Allocated, AllocationCommand, AllocationEvent, AllocationMessage, ChangeBatchQuantity, CreateBatch,
    Deallocated, OutOfStock,
};
use allocation_events::{DispatchError, MessageBus, RegistryError};

use crate::config::AllocationConfig;
use crate::handlers::{self, HandlerError};
use crate::notifications::NotificationSink;
use crate::publish::Publisher;
use crate::store::StoreError;
use crate::unit_of_work::UnitOfWork;
use crate::views::{self, AllocationView};

/// Everything a handler may need, passed explicitly on every dispatch.
pub struct Dependencies<U> {
    pub uow: U,
    pub notifications: Arc<dyn NotificationSink>,
    pub publisher: Arc<dyn Publisher>,
    pub config: AllocationConfig,
}

pub type AllocationBus<U> = MessageBus<AllocationCommand, AllocationEvent, Dependencies<U>, HandlerError>;

pub type AllocationError = DispatchError<AllocationCommand, AllocationEvent, HandlerError>;

pub type AllocationResult<T> = Result<T, AllocationError>;

/// Register every handler.
///
/// | message               | handler(s)                         |
/// |-----------------------|------------------------------------|
/// | `CreateBatch`         | `add_batch`                        |
/// | `Allocate`            | `allocate`                         |
/// | `ChangeBatchQuantity` | `change_batch_quantity`            |
/// | `OutOfStock`          | `send_out_of_stock_notification`   |
/// | `Allocated`           | `publish_allocated_event`          |
/// | `Deallocated`         | `reallocate`                       |
pub fn build_bus<U: UnitOfWork + 'static>() -> Result<AllocationBus<U>, RegistryError> {
    let mut bus = AllocationBus::new();

    bus.on_command::<CreateBatch, _>("add_batch", handlers::add_batch::<U>)?
        .on_command::<Allocate, _>("allocate", handlers::allocate::<U>)?
        .on_command::<ChangeBatchQuantity, _>("change_batch_quantity", handlers::change_batch_quantity::<U>)?;

    bus.on_event::<OutOfStock, _>("send_out_of_stock_notification", handlers::send_out_of_stock_notification::<U>)
        .on_event::<Allocated, _>("publish_allocated_event", handlers::publish_allocated_event::<U>)
        .on_event::<Deallocated, _>("reallocate", handlers::reallocate::<U>);

    Ok(bus)
}

/// Build a ready-to-use service around `uow` and the outbound sinks.
pub fn bootstrap<U: UnitOfWork + 'static>(
    uow: U,
    notifications: Arc<dyn NotificationSink>,
    publisher: Arc<dyn Publisher>,
    config: AllocationConfig,
) -> Result<AllocationService<U>, RegistryError> {
    let bus = build_bus()?;
    tracing::info!(
        stock_destination = %config.out_of_stock_destination,
        "allocation service bootstrapped"
    );

    Ok(AllocationService {
        bus,
        deps: Dependencies {
            uow,
            notifications,
            publisher,
            config,
        },
    })
}

/// Command/query facade over the message bus.
pub struct AllocationService<U> {
    bus: AllocationBus<U>,
    deps: Dependencies<U>,
}

impl<U: UnitOfWork + 'static> AllocationService<U> {
    /// Dispatch any message and everything it raises.
    pub fn handle(&self, message: impl Into<AllocationMessage>) -> AllocationResult<()> {
        self.bus.handle(message.into(), &self.deps)
    }

    /// Redo the work a failed dispatch left undone: the failed command, then
    /// everything that was queued behind it.
    ///
    /// Worth calling when the failure is retryable (a lost optimistic race); a
    /// follow-up command such as a reallocation is replayed even though the
    /// command originally sent has already committed.
    pub fn retry(&self, failure: AllocationError) -> AllocationResult<()> {
        let remaining = failure.into_remaining();
        tracing::info!(messages = remaining.len(), "retrying unfinished work");
        self.bus.resume(remaining, &self.deps)
    }

    pub fn add_batch(
        &self,
        reference: impl Into<BatchReference>,
        sku: impl Into<Sku>,
        qty: u32,
        eta: Option<NaiveDate>,
    ) -> AllocationResult<()> {
        self.handle(AllocationCommand::from(CreateBatch {
            reference: reference.into(),
            sku: sku.into(),
            qty,
            eta,
        }))
    }

    pub fn allocate(&self, order_id: impl Into<OrderId>, sku: impl Into<Sku>, qty: u32) -> AllocationResult<()> {
        self.handle(AllocationCommand::from(Allocate {
            order_id: order_id.into(),
            sku: sku.into(),
            qty,
        }))
    }

    pub fn change_batch_quantity(&self, reference: impl Into<BatchReference>, qty: u32) -> AllocationResult<()> {
        self.handle(AllocationCommand::from(ChangeBatchQuantity {
            reference: reference.into(),
            qty,
        }))
    }

    /// Current allocations of an order (read side).
    pub fn allocations(&self, order_id: impl Into<OrderId>) -> Result<Vec<AllocationView>, StoreError> {
        views::allocations(&order_id.into(), &self.deps.uow)
    }

    pub fn bus(&self) -> &AllocationBus<U> {
        &self.bus
    }

    pub fn dependencies(&self) -> &Dependencies<U> {
        &self.deps
    }
}
