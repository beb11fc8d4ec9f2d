//! Infrastructure layer: persistence, unit of work, handlers, sinks, wiring.

pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod notifications;
pub mod publish;
pub mod repository;
pub mod store;
pub mod unit_of_work;
pub mod views;

#[cfg(test)]
mod integration_tests;

pub use bootstrap::{AllocationBus, AllocationError, AllocationResult, AllocationService, Dependencies, bootstrap, build_bus};
pub use config::AllocationConfig;
pub use handlers::HandlerError;
pub use notifications::{InMemoryNotifications, LoggingNotifications, NotificationSink, SentNotification};
pub use publish::{EventBusPublisher, PublishedEnvelope, Publisher};
pub use repository::{Repository, TrackedRepository};
pub use store::{InMemoryProductStore, ProductChange, ProductStore, StoreError};
pub use unit_of_work::{StoreUnitOfWork, UnitOfWork, UnitOfWorkScope, UnitOfWorkStats};
pub use views::AllocationView;
