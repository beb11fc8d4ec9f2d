//! Messaging mechanics: commands, events, the message bus and pub/sub fan-out.
//!
//! Nothing in here knows about stock or orders; domain crates implement the
//! traits and infrastructure wires concrete handlers.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod message;
pub mod message_bus;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use message::{CommandVariant, EventVariant, Inbox, Message};
pub use message_bus::{DispatchError, MessageBus, RegistryError};
