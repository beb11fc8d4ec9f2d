//! Messages flowing through the bus, and typed routing into handlers.

use serde::{Deserialize, Serialize};

use crate::{Command, Event};

/// Anything the message bus can process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message", content = "body", rename_all = "snake_case")]
pub enum Message<C, E> {
    Command(C),
    Event(E),
}

impl<C, E> Message<C, E>
where
    C: Command,
    E: Event,
{
    /// Stable name of the wrapped command or event, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Command(c) => c.command_type(),
            Message::Event(e) => e.event_type(),
        }
    }
}

/// A concrete command payload that can be routed out of the command sum type.
///
/// Implemented once per command struct; `KIND` is the registry key and
/// `from_command` unwraps the matching variant.
pub trait CommandVariant<C: Command>: Sized + 'static {
    const KIND: C::Kind;

    fn from_command(command: C) -> Option<Self>;
}

/// A concrete event payload that can be routed out of the event sum type.
///
/// Events are borrowed because several handlers may see the same event.
pub trait EventVariant<E: Event>: 'static {
    const KIND: E::Kind;

    fn from_event(event: &E) -> Option<&Self>;
}

/// Messages raised while a single handler runs.
///
/// Handlers push follow-up commands here, and a unit of work drains the events
/// it harvested at commit into it. The bus appends the inbox to its work queue
/// once the handler returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbox<C, E> {
    messages: Vec<Message<C, E>>,
}

impl<C, E> Default for Inbox<C, E> {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
        }
    }
}

impl<C, E> Inbox<C, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_command(&mut self, command: C) {
        self.messages.push(Message::Command(command));
    }

    pub fn push_event(&mut self, event: E) {
        self.messages.push(Message::Event(event));
    }

    /// Append events in the order the iterator yields them.
    pub fn extend_events(&mut self, events: impl IntoIterator<Item = E>) {
        self.messages.extend(events.into_iter().map(Message::Event));
    }

    pub fn messages(&self) -> &[Message<C, E>] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message<C, E>> {
        self.messages
    }
}
