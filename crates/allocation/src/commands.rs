use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use allocation_core::{BatchReference, OrderId, Sku};
use allocation_events::{Command, CommandVariant, Message};

use crate::AllocationEvent;

/// Command: CreateBatch. Registers purchased stock, creating the product on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatch {
    pub reference: BatchReference,
    pub sku: Sku,
    pub qty: u32,
    /// `None` means the stock is already in the warehouse.
    pub eta: Option<NaiveDate>,
}

/// Command: Allocate. Assigns an order line to the best available batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocate {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

/// Command: ChangeBatchQuantity. Corrects a batch's purchased quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatchQuantity {
    pub reference: BatchReference,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AllocationCommand {
    CreateBatch(CreateBatch),
    Allocate(Allocate),
    ChangeBatchQuantity(ChangeBatchQuantity),
}

macro_rules! command_variants {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Routing key of an [`AllocationCommand`].
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum CommandKind {
            $($variant),+
        }

        impl Command for AllocationCommand {
            type Kind = CommandKind;

            fn kind(&self) -> CommandKind {
                match self {
                    $(AllocationCommand::$variant(_) => CommandKind::$variant),+
                }
            }

            fn command_type(&self) -> &'static str {
                match self {
                    $(AllocationCommand::$variant(_) => $name),+
                }
            }
        }

        $(
            impl CommandVariant<AllocationCommand> for $variant {
                const KIND: CommandKind = CommandKind::$variant;

                fn from_command(command: AllocationCommand) -> Option<Self> {
                    match command {
                        AllocationCommand::$variant(c) => Some(c),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl From<$variant> for AllocationCommand {
                fn from(command: $variant) -> Self {
                    AllocationCommand::$variant(command)
                }
            }
        )+
    };
}

command_variants! {
    CreateBatch => "allocation.create_batch",
    Allocate => "allocation.allocate",
    ChangeBatchQuantity => "allocation.change_batch_quantity",
}

impl From<AllocationCommand> for Message<AllocationCommand, AllocationEvent> {
    fn from(command: AllocationCommand) -> Self {
        Message::Command(command)
    }
}
