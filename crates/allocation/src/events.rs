use serde::{Deserialize, Serialize};

use allocation_core::{BatchReference, OrderId, Sku};
use allocation_events::{Event, EventVariant, Message};

use crate::AllocationCommand;

/// Event: Allocated. An order line now holds stock in `batch_reference`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocated {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
    pub batch_reference: BatchReference,
}

/// Event: Deallocated. An order line lost its stock and needs a new home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deallocated {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

/// Event: OutOfStock. No batch of `sku` could satisfy an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStock {
    pub sku: Sku,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationEvent {
    Allocated(Allocated),
    Deallocated(Deallocated),
    OutOfStock(OutOfStock),
}

macro_rules! event_variants {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Routing key of an [`AllocationEvent`].
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum EventKind {
            $($variant),+
        }

        impl Event for AllocationEvent {
            type Kind = EventKind;

            fn kind(&self) -> EventKind {
                match self {
                    $(AllocationEvent::$variant(_) => EventKind::$variant),+
                }
            }

            fn event_type(&self) -> &'static str {
                match self {
                    $(AllocationEvent::$variant(_) => $name),+
                }
            }

            fn version(&self) -> u32 {
                1
            }
        }

        $(
            impl EventVariant<AllocationEvent> for $variant {
                const KIND: EventKind = EventKind::$variant;

                fn from_event(event: &AllocationEvent) -> Option<&Self> {
                    match event {
                        AllocationEvent::$variant(e) => Some(e),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl From<$variant> for AllocationEvent {
                fn from(event: $variant) -> Self {
                    AllocationEvent::$variant(event)
                }
            }
        )+
    };
}

event_variants! {
    Allocated => "allocation.line_allocated",
    Deallocated => "allocation.line_deallocated",
    OutOfStock => "allocation.out_of_stock",
}

impl From<AllocationEvent> for Message<AllocationCommand, AllocationEvent> {
    fn from(event: AllocationEvent) -> Self {
        Message::Event(event)
    }
}
