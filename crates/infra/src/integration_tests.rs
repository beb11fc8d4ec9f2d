//! End-to-end tests of the allocation pipeline.
//!
//! Tests: Command → MessageBus → handler → UnitOfWork → ProductStore → events → sinks
//!
//! Verifies:
//! - Commands commit exactly once and surface their failures
//! - Events reach their handlers (notifications, publication, reallocation)
//! - Event handler failures are isolated
//! - Optimistic concurrency conflicts are detected and retryable

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;

    use allocation_core::{BatchReference, DomainError, ExpectedVersion, OrderId, Sku};
    use allocation_domain::{Allocate, AllocationCommand, AllocationEvent, EventKind, OrderLine, Product};
    use allocation_events::{DispatchError, EventBus, InMemoryEventBus, RegistryError, Subscription};

    use crate::bootstrap::{AllocationService, bootstrap, build_bus};
    use crate::config::AllocationConfig;
    use crate::handlers::HandlerError;
    use crate::notifications::{InMemoryNotifications, NotificationSink, SentNotification};
    use crate::publish::{EventBusPublisher, PublishedEnvelope};
    use crate::store::{InMemoryProductStore, ProductChange, ProductStore, StoreError};
    use crate::unit_of_work::StoreUnitOfWork;
    use crate::views::AllocationView;

    type Service<S> = AllocationService<StoreUnitOfWork<S>>;

    struct Harness<S> {
        service: Service<S>,
        notifications: Arc<InMemoryNotifications>,
        published: Subscription<PublishedEnvelope>,
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn harness_with<S: ProductStore + Clone + 'static>(store: S) -> Harness<S> {
        allocation_observability::init_with_default(&AllocationConfig::from_env().log_filter);
        let config = AllocationConfig::default();

        let notifications = Arc::new(InMemoryNotifications::new());
        let bus = Arc::new(InMemoryEventBus::<PublishedEnvelope>::new());
        let published = bus.subscribe();
        let service = bootstrap(
            StoreUnitOfWork::new(store),
            notifications.clone(),
            Arc::new(EventBusPublisher::new(bus)),
            config,
        )
        .unwrap();

        Harness {
            service,
            notifications,
            published,
        }
    }

    fn harness() -> Harness<Arc<InMemoryProductStore>> {
        harness_with(Arc::new(InMemoryProductStore::new()))
    }

    fn product(service: &Service<Arc<InMemoryProductStore>>, sku: &str) -> Option<Product> {
        service.dependencies().uow.store().load(&Sku::new(sku)).unwrap()
    }

    fn available(service: &Service<Arc<InMemoryProductStore>>, sku: &str, batch: &str) -> i64 {
        product(service, sku)
            .unwrap()
            .batch(&BatchReference::new(batch))
            .unwrap()
            .available_quantity()
    }

    #[test]
    fn add_batch_for_new_product() {
        let h = harness();

        h.service.add_batch("b1", "CRUNCHY-ARMCHAIR", 100, None).unwrap();

        assert!(product(&h.service, "CRUNCHY-ARMCHAIR").is_some());
        assert_eq!(h.service.dependencies().uow.stats().commits, 1);
    }

    #[test]
    fn add_batch_for_existing_product() {
        let h = harness();

        h.service.add_batch("b1", "GARISH-RUG", 100, None).unwrap();
        h.service.add_batch("b2", "GARISH-RUG", 99, None).unwrap();

        let rug = product(&h.service, "GARISH-RUG").unwrap();
        let refs: Vec<_> = rug.batches().iter().map(|b| b.reference().to_string()).collect();
        assert_eq!(refs, vec!["b1", "b2"]);
    }

    #[test]
    fn batch_reference_cannot_be_reused_for_another_sku() {
        let h = harness();
        h.service.add_batch("b1", "sku1", 10, None).unwrap();

        let err = h.service.add_batch("b1", "sku2", 10, None).unwrap_err();

        assert!(matches!(
            err.handler_error(),
            Some(HandlerError::Domain(DomainError::Conflict(_)))
        ));
        assert!(product(&h.service, "sku2").is_none());
    }

    #[test]
    fn allocate_allocates_and_commits() {
        let h = harness();
        h.service.add_batch("batch1", "COMPLICATED-LAMP", 100, None).unwrap();

        h.service.allocate("o1", "COMPLICATED-LAMP", 10).unwrap();

        assert_eq!(available(&h.service, "COMPLICATED-LAMP", "batch1"), 90);
        assert_eq!(h.service.dependencies().uow.stats().commits, 2);
    }

    #[test]
    fn allocate_prefers_stock_in_the_warehouse() {
        let h = harness();
        h.service
            .add_batch("shipment", "RETRO-CLOCK", 100, Some(today()))
            .unwrap();
        h.service.add_batch("in-stock", "RETRO-CLOCK", 100, None).unwrap();

        h.service.allocate("o1", "RETRO-CLOCK", 10).unwrap();

        assert_eq!(available(&h.service, "RETRO-CLOCK", "in-stock"), 90);
        assert_eq!(available(&h.service, "RETRO-CLOCK", "shipment"), 100);
    }

    #[test]
    fn allocate_for_invalid_sku_fails_without_committing() {
        let h = harness();
        h.service.add_batch("b1", "AREALSKU", 100, None).unwrap();

        let err = h.service.allocate("o1", "NONEXISTENTSKU", 10).unwrap_err();

        assert_eq!(err.to_string(), "Invalid sku NONEXISTENTSKU");
        let stats = h.service.dependencies().uow.stats();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.rollbacks, 1);
    }

    #[test]
    fn out_of_stock_sends_one_notification_and_still_commits() {
        let h = harness();
        h.service.add_batch("b1", "POPULAR-CURTAINS", 9, None).unwrap();

        h.service.allocate("o1", "POPULAR-CURTAINS", 10).unwrap();

        assert_eq!(
            h.notifications.sent(),
            vec![SentNotification {
                destination: "stock@made.com".to_string(),
                message: "Out of stock for POPULAR-CURTAINS".to_string(),
            }]
        );
        assert_eq!(h.service.dependencies().uow.stats().commits, 2);
        assert_eq!(available(&h.service, "POPULAR-CURTAINS", "b1"), 9);
    }

    #[test]
    fn allocated_event_is_published_on_its_channel() {
        let h = harness();
        h.service.add_batch("b1", "sku1", 10, None).unwrap();

        h.service.allocate("o1", "sku1", 3).unwrap();

        let published = h.published.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].channel(), "allocation.line_allocated");
        let event: AllocationEvent = serde_json::from_value(published[0].payload().clone()).unwrap();
        match event {
            AllocationEvent::Allocated(allocated) => {
                assert_eq!(allocated.order_id, OrderId::new("o1"));
                assert_eq!(allocated.batch_reference, BatchReference::new("b1"));
                assert_eq!(allocated.qty, 3);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn change_batch_quantity_changes_available_quantity() {
        let h = harness();
        h.service.add_batch("batch1", "ADORABLE-SETTEE", 100, None).unwrap();
        assert_eq!(available(&h.service, "ADORABLE-SETTEE", "batch1"), 100);

        h.service.change_batch_quantity("batch1", 50).unwrap();

        assert_eq!(available(&h.service, "ADORABLE-SETTEE", "batch1"), 50);
    }

    #[test]
    fn change_batch_quantity_for_unknown_batch_fails() {
        let h = harness();

        let err = h.service.change_batch_quantity("missing", 5).unwrap_err();

        assert!(matches!(err.handler_error(), Some(HandlerError::UnknownBatch(r)) if r.as_str() == "missing"));
    }

    #[test]
    fn change_batch_quantity_reallocates_if_necessary() {
        let h = harness();
        h.service.add_batch("b1", "INDIFFERENT-TABLE", 50, None).unwrap();
        h.service
            .add_batch("b2", "INDIFFERENT-TABLE", 50, Some(today()))
            .unwrap();
        h.service.allocate("o1", "INDIFFERENT-TABLE", 20).unwrap();
        h.service.allocate("o2", "INDIFFERENT-TABLE", 20).unwrap();
        assert_eq!(available(&h.service, "INDIFFERENT-TABLE", "b1"), 10);
        assert_eq!(available(&h.service, "INDIFFERENT-TABLE", "b2"), 50);
        h.published.drain();

        h.service.change_batch_quantity("b1", 25).unwrap();

        // o2 went back through allocation and landed on b2
        assert_eq!(available(&h.service, "INDIFFERENT-TABLE", "b1"), 5);
        assert_eq!(available(&h.service, "INDIFFERENT-TABLE", "b2"), 30);
        let channels: Vec<_> = h.published.drain().iter().map(|e| e.channel().to_string()).collect();
        assert_eq!(channels, vec!["allocation.line_allocated"]);
    }

    struct FailingNotifications;

    impl NotificationSink for FailingNotifications {
        fn send(&self, _destination: &str, _message: &str) -> anyhow::Result<()> {
            anyhow::bail!("smtp unavailable")
        }
    }

    #[test]
    fn event_handler_failure_does_not_fail_the_command() {
        let bus = Arc::new(InMemoryEventBus::<PublishedEnvelope>::new());
        let service = bootstrap(
            StoreUnitOfWork::new(Arc::new(InMemoryProductStore::new())),
            Arc::new(FailingNotifications),
            Arc::new(EventBusPublisher::new(bus)),
            AllocationConfig::default(),
        )
        .unwrap();
        service.add_batch("b1", "sku1", 1, None).unwrap();

        service.allocate("o1", "sku1", 5).unwrap();

        assert_eq!(service.dependencies().uow.stats().commits, 2);
    }

    /// Store that lets a competing writer win just before one chosen save.
    struct RacingStore {
        inner: InMemoryProductStore,
        countdown: AtomicUsize,
    }

    impl RacingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryProductStore::new(),
                countdown: AtomicUsize::new(0),
            }
        }

        /// The `nth` save from now (1-based) loses its race.
        fn race_on_save(&self, nth: usize) {
            self.countdown.store(nth, Ordering::SeqCst);
        }
    }

    impl ProductStore for RacingStore {
        fn load(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
            self.inner.load(sku)
        }

        fn sku_for_batch(&self, reference: &BatchReference) -> Result<Option<Sku>, StoreError> {
            self.inner.sku_for_batch(reference)
        }

        fn save(&self, changes: Vec<ProductChange>) -> Result<(), StoreError> {
            let countdown = self.countdown.load(Ordering::SeqCst);
            if countdown > 0 {
                self.countdown.store(countdown - 1, Ordering::SeqCst);
            }
            if countdown == 1 {
                for change in &changes {
                    if let ExpectedVersion::Exact(version) = change.expected {
                        let mut rival = self.inner.load(change.product.sku())?.unwrap();
                        rival
                            .allocate(OrderLine::new("rival", change.product.sku().clone(), 1))
                            .unwrap();
                        self.inner.save(vec![ProductChange {
                            product: rival,
                            expected: ExpectedVersion::Exact(version),
                        }])?;
                    }
                }
            }
            self.inner.save(changes)
        }

        fn list(&self) -> Result<Vec<Product>, StoreError> {
            self.inner.list()
        }
    }

    #[test]
    fn concurrency_conflict_is_retryable_and_publishes_nothing() {
        let store = Arc::new(RacingStore::new());
        let h = harness_with(store.clone());
        h.service.add_batch("b1", "sku1", 10, None).unwrap();

        store.race_on_save(1);
        let err = h.service.allocate("o1", "sku1", 2).unwrap_err();

        assert!(err.handler_error().is_some_and(HandlerError::is_retryable));
        assert!(h.published.drain().is_empty());
        let stored = store.load(&Sku::new("sku1")).unwrap().unwrap();
        assert_eq!(stored.batches()[0].allocations().len(), 1);

        // A retry sees the rival's write and succeeds.
        h.service.retry(err).unwrap();
        assert_eq!(h.published.drain().len(), 1);
        assert_eq!(
            h.service.allocations("o1").unwrap(),
            vec![AllocationView {
                sku: Sku::new("sku1"),
                batch_reference: BatchReference::new("b1"),
            }]
        );
    }

    #[test]
    fn conflict_on_a_reallocation_is_resumed_from_the_failed_allocate() {
        let store = Arc::new(RacingStore::new());
        let h = harness_with(store.clone());
        h.service.add_batch("b1", "sku1", 50, None).unwrap();
        h.service.add_batch("b2", "sku1", 50, Some(today())).unwrap();
        h.service.allocate("o1", "sku1", 20).unwrap();
        h.service.allocate("o2", "sku1", 20).unwrap();
        h.published.drain();

        // The quantity change commits; the Allocate raised for the shed line races.
        store.race_on_save(2);
        let err = h.service.change_batch_quantity("b1", 25).unwrap_err();

        assert!(err.handler_error().is_some_and(HandlerError::is_retryable));
        assert_eq!(
            err.failed_command(),
            Some(&AllocationCommand::Allocate(Allocate {
                order_id: OrderId::new("o2"),
                sku: Sku::new("sku1"),
                qty: 20,
            }))
        );
        assert!(err.pending().is_empty());
        assert!(h.service.allocations("o2").unwrap().is_empty());
        assert!(h.published.drain().is_empty());

        // Re-sending the original command would shed nothing; resuming places o2.
        h.service.retry(err).unwrap();

        assert_eq!(
            h.service.allocations("o2").unwrap(),
            vec![AllocationView {
                sku: Sku::new("sku1"),
                batch_reference: BatchReference::new("b2"),
            }]
        );
        let stored = store.load(&Sku::new("sku1")).unwrap().unwrap();
        let available = |r: &str| stored.batch(&BatchReference::new(r)).unwrap().available_quantity();
        assert_eq!(available("b1"), 4);
        assert_eq!(available("b2"), 30);
        assert_eq!(h.published.drain().len(), 1);
    }

    #[test]
    fn a_command_kind_cannot_be_registered_twice() {
        let mut bus = build_bus::<StoreUnitOfWork<Arc<InMemoryProductStore>>>().unwrap();

        let err = bus
            .on_command::<Allocate, _>("allocate_again", |_, _, _| Ok(()))
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::DuplicateCommandHandler {
                command: "Allocate".to_string(),
                existing: "allocate",
                rejected: "allocate_again",
            }
        );
    }

    #[test]
    fn handlers_are_wired_per_message_kind() {
        let h = harness();
        let bus = h.service.bus();

        assert_eq!(bus.event_handlers(EventKind::OutOfStock), vec!["send_out_of_stock_notification"]);
        assert_eq!(bus.event_handlers(EventKind::Allocated), vec!["publish_allocated_event"]);
        assert_eq!(bus.event_handlers(EventKind::Deallocated), vec!["reallocate"]);
    }

    #[test]
    fn dispatching_a_raw_message_works_like_the_facade() {
        let h = harness();
        h.service.add_batch("b1", "sku1", 10, None).unwrap();

        let message = AllocationEvent::from(allocation_domain::Deallocated {
            order_id: OrderId::new("o9"),
            sku: Sku::new("sku1"),
            qty: 4,
        });
        h.service.handle(message).unwrap();

        assert_eq!(available(&h.service, "sku1", "b1"), 6);
        assert!(matches!(
            h.service.allocate("o1", "unknown", 1),
            Err(DispatchError::Handler {
                error: HandlerError::InvalidSku(_),
                ..
            })
        ));
    }
}
