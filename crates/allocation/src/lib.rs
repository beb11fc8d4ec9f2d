//! Allocation domain module.
//!
//! Business rules for allocating order lines to stock batches, implemented as
//! deterministic domain logic (no IO, no storage). Side effects are requested by
//! recording events on the `Product` aggregate.

pub mod batch;
pub mod commands;
pub mod events;
pub mod order_line;
pub mod product;

pub use batch::Batch;
pub use commands::{Allocate, AllocationCommand, ChangeBatchQuantity, CommandKind, CreateBatch};
pub use events::{AllocationEvent, Allocated, Deallocated, EventKind, OutOfStock};
pub use order_line::OrderLine;
pub use product::Product;

/// A message handled by the allocation service.
pub type AllocationMessage = allocation_events::Message<AllocationCommand, AllocationEvent>;

/// Messages raised while one allocation handler runs.
pub type AllocationInbox = allocation_events::Inbox<AllocationCommand, AllocationEvent>;
