//! Publication of domain events to external subscribers.

use chrono::Utc;
use uuid::Uuid;

use allocation_domain::AllocationEvent;
use allocation_events::{Event, EventBus, EventEnvelope};

/// Publishes an event on a named channel.
pub trait Publisher: Send + Sync {
    fn publish(&self, channel: &str, event: &AllocationEvent) -> anyhow::Result<()>;
}

/// Envelope type carried by the outbound bus.
pub type PublishedEnvelope = EventEnvelope<serde_json::Value>;

/// Wraps events in an [`EventEnvelope`] and fans them out on an `EventBus`.
#[derive(Debug, Clone)]
pub struct EventBusPublisher<B> {
    bus: B,
}

impl<B> EventBusPublisher<B>
where
    B: EventBus<PublishedEnvelope>,
{
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B> Publisher for EventBusPublisher<B>
where
    B: EventBus<PublishedEnvelope>,
{
    fn publish(&self, channel: &str, event: &AllocationEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_value(event)?;
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            channel,
            event.event_type(),
            event.version(),
            Utc::now(),
            payload,
        );

        self.bus
            .publish(envelope)
            .map_err(|err| anyhow::anyhow!("publish on {channel} failed: {err:?}"))?;
        tracing::debug!(channel, event_type = event.event_type(), "event published");
        Ok(())
    }
}
