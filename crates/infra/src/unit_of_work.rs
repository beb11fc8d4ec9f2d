//! Unit of work: atomic boundary around a repository session.
//!
//! ```text
//! start(inbox) ──► scope { repo }
//!                    │
//!                    ├─ commit()   persist, then drain product events → inbox
//!                    └─ drop       rollback unless committed
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use allocation_domain::{AllocationInbox, Product};

use crate::repository::{Repository, TrackedRepository};
use crate::store::{ProductStore, StoreError};

/// Transaction boundary over product persistence.
pub trait UnitOfWork: Send + Sync {
    type Repo: Repository;

    /// Open a fresh repository bound to a fresh session.
    fn begin(&self) -> Self::Repo;

    /// Persist every change made through `repo`. All or nothing.
    fn commit(&self, repo: &mut Self::Repo) -> Result<(), StoreError>;

    /// Discard every uncommitted change made through `repo`.
    fn rollback(&self, repo: &mut Self::Repo);

    /// Committed products, ordered by SKU (read side).
    fn snapshot(&self) -> Result<Vec<Product>, StoreError>;

    /// Begin a scoped session whose harvested events land in `inbox`.
    fn start<'a>(&'a self, inbox: &'a mut AllocationInbox) -> UnitOfWorkScope<'a, Self>
    where
        Self: Sized,
    {
        UnitOfWorkScope {
            uow: self,
            repo: self.begin(),
            inbox,
            finished: false,
        }
    }
}

/// A running unit of work.
///
/// Dropping the scope without a successful `commit()` rolls back, including
/// on early return through `?`.
pub struct UnitOfWorkScope<'a, U: UnitOfWork> {
    uow: &'a U,
    repo: U::Repo,
    inbox: &'a mut AllocationInbox,
    finished: bool,
}

impl<U: UnitOfWork> UnitOfWorkScope<'_, U> {
    pub fn products(&mut self) -> &mut U::Repo {
        &mut self.repo
    }

    /// Persist, then hand every seen product's pending events to the inbox.
    ///
    /// Events are drained in SKU order, each product's in emission order. A
    /// failed save drains nothing.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        self.uow.commit(&mut self.repo)?;
        self.finished = true;
        for product in self.repo.seen() {
            self.inbox.extend_events(product.drain_events());
        }
        Ok(())
    }

    pub fn rollback(mut self) {
        self.finish_with_rollback();
    }

    fn finish_with_rollback(&mut self) {
        if !self.finished {
            self.finished = true;
            self.uow.rollback(&mut self.repo);
        }
    }
}

impl<U: UnitOfWork> Drop for UnitOfWorkScope<'_, U> {
    fn drop(&mut self) {
        self.finish_with_rollback();
    }
}

/// Commit/rollback counters of a [`StoreUnitOfWork`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOfWorkStats {
    pub commits: u64,
    pub rollbacks: u64,
}

/// Unit of work over any `ProductStore` (typically `Arc<InMemoryProductStore>`).
#[derive(Debug, Default)]
pub struct StoreUnitOfWork<S> {
    store: S,
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl<S: ProductStore + Clone> StoreUnitOfWork<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            commits: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> UnitOfWorkStats {
        UnitOfWorkStats {
            commits: self.commits.load(Ordering::SeqCst),
            rollbacks: self.rollbacks.load(Ordering::SeqCst),
        }
    }
}

impl<S: ProductStore + Clone> UnitOfWork for StoreUnitOfWork<S> {
    type Repo = TrackedRepository<S>;

    fn begin(&self) -> Self::Repo {
        TrackedRepository::new(self.store.clone())
    }

    fn commit(&self, repo: &mut Self::Repo) -> Result<(), StoreError> {
        let changes = repo.pending_changes();
        let changed = changes.len();
        if changed > 0 {
            self.store.save(changes)?;
        }
        repo.mark_committed();
        self.commits.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(products = changed, "unit of work committed");
        Ok(())
    }

    fn rollback(&self, repo: &mut Self::Repo) {
        repo.discard();
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("unit of work rolled back");
    }

    fn snapshot(&self) -> Result<Vec<Product>, StoreError> {
        self.store.list()
    }
}
