//! Product persistence boundary.
//!
//! A `ProductStore` is the transactional context a unit of work opens sessions
//! against: it loads committed products and atomically saves a session's
//! changes under an optimistic version check.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryProductStore;
pub use r#trait::{ProductChange, ProductStore, StoreError};
