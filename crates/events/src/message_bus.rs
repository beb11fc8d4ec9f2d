//! Message bus: routes commands to exactly one handler and events to many.
//!
//! ## Dispatch loop
//!
//! ```text
//! handle(message)
//!   ↓
//! queue = [message]
//!   ↓
//! pop front ──► Command ──► sole handler ──► fault? return it to the caller
//!   │                                   └──► ok: append inbox to queue
//!   └─────────► Event ──► each handler in order ──► fault? log, keep going
//!                                               └──► append inbox to queue
//!   ↓
//! queue empty → done
//! ```
//!
//! Handlers receive the dependencies (`X`) explicitly plus an [`Inbox`] for
//! anything they raise. Units of work drain the events they harvest at commit
//! into that same inbox, so a commit inside a handler feeds straight back into
//! this loop.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use thiserror::Error;

use crate::message::{CommandVariant, EventVariant, Inbox, Message};
use crate::{Command, Event};

type CommandHandlerFn<C, E, X, Err> =
    Box<dyn Fn(C, &X, &mut Inbox<C, E>) -> Result<(), Failure<Err>> + Send + Sync>;

type EventHandlerFn<C, E, X, Err> =
    Box<dyn Fn(&E, &X, &mut Inbox<C, E>) -> Result<(), Failure<Err>> + Send + Sync>;

struct Registered<F> {
    name: &'static str,
    handler: F,
}

/// Why a routed handler did not complete.
enum Failure<Err> {
    Misrouted(String),
    Handler(Err),
}

impl<Err: fmt::Display> fmt::Display for Failure<Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Misrouted(route) => write!(f, "message routed to the wrong handler: {route}"),
            Failure::Handler(err) => fmt::Display::fmt(err, f),
        }
    }
}

/// Handler registration failure (startup wiring bug).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command {command} already handled by `{existing}`, cannot also register `{rejected}`")]
    DuplicateCommandHandler {
        command: String,
        existing: &'static str,
        rejected: &'static str,
    },
}

/// Failure of a dispatched message.
///
/// Only commands produce these; event handler failures are logged and dropped.
/// The failing command may be a follow-up raised by an event handler, so a
/// handler failure carries that command plus every message still queued
/// behind it. Resuming with [`DispatchError::into_remaining`] redoes exactly
/// the work that did not happen.
#[derive(Debug)]
pub enum DispatchError<C, E, Err> {
    /// No handler is registered for the command.
    NoHandler(String),
    /// A handler received a message its variant type could not unwrap.
    Misrouted(String),
    /// A command handler failed; nothing it did was committed.
    Handler {
        command: C,
        pending: Vec<Message<C, E>>,
        error: Err,
    },
}

impl<C, E, Err> DispatchError<C, E, Err> {
    /// The handler's own error, if that is what failed.
    pub fn handler_error(&self) -> Option<&Err> {
        match self {
            DispatchError::Handler { error, .. } => Some(error),
            _ => None,
        }
    }

    /// The command whose handler failed.
    pub fn failed_command(&self) -> Option<&C> {
        match self {
            DispatchError::Handler { command, .. } => Some(command),
            _ => None,
        }
    }

    /// Messages that were queued behind the failed command and never ran.
    pub fn pending(&self) -> &[Message<C, E>] {
        match self {
            DispatchError::Handler { pending, .. } => pending,
            _ => &[],
        }
    }

    /// The failed command followed by the undrained queue, ready to resume.
    pub fn into_remaining(self) -> Vec<Message<C, E>> {
        match self {
            DispatchError::Handler { command, pending, .. } => {
                let mut remaining = Vec::with_capacity(pending.len() + 1);
                remaining.push(Message::Command(command));
                remaining.extend(pending);
                remaining
            }
            _ => Vec::new(),
        }
    }
}

impl<C, E, Err: fmt::Display> fmt::Display for DispatchError<C, E, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::NoHandler(command) => write!(f, "no handler registered for command {command}"),
            DispatchError::Misrouted(route) => write!(f, "message routed to the wrong handler: {route}"),
            DispatchError::Handler { error, .. } => fmt::Display::fmt(error, f),
        }
    }
}

impl<C, E, Err> std::error::Error for DispatchError<C, E, Err>
where
    C: fmt::Debug,
    E: fmt::Debug,
    Err: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Handler { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Static command/event → handler registry plus the dispatch loop.
///
/// Generic over:
/// - `C`: the command sum type
/// - `E`: the event sum type
/// - `X`: dependencies handed to every handler (unit of work, sinks, config)
/// - `Err`: the handlers' error type
pub struct MessageBus<C: Command, E: Event, X, Err> {
    commands: HashMap<C::Kind, Registered<CommandHandlerFn<C, E, X, Err>>>,
    events: HashMap<E::Kind, Vec<Registered<EventHandlerFn<C, E, X, Err>>>>,
}

impl<C: Command, E: Event, X, Err> Default for MessageBus<C, E, X, Err> {
    fn default() -> Self {
        Self {
            commands: HashMap::new(),
            events: HashMap::new(),
        }
    }
}

impl<C: Command, E: Event, X, Err> fmt::Debug for MessageBus<C, E, X, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C, E, X, Err> MessageBus<C, E, X, Err>
where
    C: Command,
    E: Event,
    X: 'static,
    Err: fmt::Display + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single handler for command variant `V`.
    pub fn on_command<V, F>(&mut self, name: &'static str, handler: F) -> Result<&mut Self, RegistryError>
    where
        V: CommandVariant<C>,
        F: Fn(V, &X, &mut Inbox<C, E>) -> Result<(), Err> + Send + Sync + 'static,
    {
        if let Some(existing) = self.commands.get(&V::KIND) {
            return Err(RegistryError::DuplicateCommandHandler {
                command: format!("{:?}", V::KIND),
                existing: existing.name,
                rejected: name,
            });
        }

        let routed: CommandHandlerFn<C, E, X, Err> =
            Box::new(move |command: C, deps: &X, inbox: &mut Inbox<C, E>| {
                let kind = command.kind();
                let variant = V::from_command(command)
                    .ok_or_else(|| Failure::Misrouted(format!("{kind:?} -> {name}")))?;
                handler(variant, deps, inbox).map_err(Failure::Handler)
            });

        self.commands.insert(V::KIND, Registered { name, handler: routed });
        Ok(self)
    }

    /// Append a handler for event variant `V` (runs after earlier registrations).
    pub fn on_event<V, F>(&mut self, name: &'static str, handler: F) -> &mut Self
    where
        V: EventVariant<E>,
        F: Fn(&V, &X, &mut Inbox<C, E>) -> Result<(), Err> + Send + Sync + 'static,
    {
        let routed: EventHandlerFn<C, E, X, Err> =
            Box::new(move |event: &E, deps: &X, inbox: &mut Inbox<C, E>| {
                let variant = V::from_event(event)
                    .ok_or_else(|| Failure::Misrouted(format!("{:?} -> {name}", event.kind())))?;
                handler(variant, deps, inbox).map_err(Failure::Handler)
            });

        self.events
            .entry(V::KIND)
            .or_default()
            .push(Registered { name, handler: routed });
        self
    }

    /// Name of the handler registered for a command kind.
    pub fn command_handler(&self, kind: C::Kind) -> Option<&'static str> {
        self.commands.get(&kind).map(|r| r.name)
    }

    /// Names of the handlers registered for an event kind, in dispatch order.
    pub fn event_handlers(&self, kind: E::Kind) -> Vec<&'static str> {
        self.events
            .get(&kind)
            .map(|handlers| handlers.iter().map(|r| r.name).collect())
            .unwrap_or_default()
    }

    /// Process `message` and everything it transitively raises.
    ///
    /// Returns the first command failure; event handler failures never surface.
    pub fn handle(&self, message: Message<C, E>, deps: &X) -> Result<(), DispatchError<C, E, Err>> {
        self.drain(VecDeque::from([message]), deps)
    }

    /// Continue work left behind by a failed dispatch, in order.
    pub fn resume(
        &self,
        messages: impl IntoIterator<Item = Message<C, E>>,
        deps: &X,
    ) -> Result<(), DispatchError<C, E, Err>> {
        self.drain(messages.into_iter().collect(), deps)
    }

    fn drain(&self, mut queue: VecDeque<Message<C, E>>, deps: &X) -> Result<(), DispatchError<C, E, Err>> {
        while let Some(message) = queue.pop_front() {
            tracing::debug!(message = message.name(), queued = queue.len(), "dispatching");

            let mut inbox = Inbox::new();
            match message {
                Message::Command(command) => {
                    if let Err(err) = self.handle_command(command, deps, &mut inbox) {
                        return Err(match err {
                            DispatchError::Handler { command, error, .. } => DispatchError::Handler {
                                command,
                                pending: queue.into(),
                                error,
                            },
                            other => other,
                        });
                    }
                }
                Message::Event(event) => self.handle_event(&event, deps, &mut inbox),
            }
            queue.extend(inbox.into_messages());
        }

        Ok(())
    }

    fn handle_command(
        &self,
        command: C,
        deps: &X,
        inbox: &mut Inbox<C, E>,
    ) -> Result<(), DispatchError<C, E, Err>> {
        let command_type = command.command_type();
        let Some(registered) = self.commands.get(&command.kind()) else {
            return Err(DispatchError::NoHandler(command_type.to_string()));
        };

        let retained = command.clone();
        (registered.handler)(command, deps, inbox).map_err(|failure| {
            tracing::warn!(command = command_type, handler = registered.name, error = %failure, "command failed");
            match failure {
                Failure::Misrouted(route) => DispatchError::Misrouted(route),
                Failure::Handler(error) => DispatchError::Handler {
                    command: retained,
                    pending: Vec::new(),
                    error,
                },
            }
        })
    }

    fn handle_event(&self, event: &E, deps: &X, inbox: &mut Inbox<C, E>) {
        let Some(handlers) = self.events.get(&event.kind()) else {
            tracing::debug!(event = event.event_type(), "no handlers registered for event");
            return;
        };

        for registered in handlers {
            tracing::debug!(event = event.event_type(), handler = registered.name, "handling event");
            if let Err(err) = (registered.handler)(event, deps, inbox) {
                tracing::error!(
                    event = event.event_type(),
                    handler = registered.name,
                    error = %err,
                    "event handler failed"
                );
            }
        }
    }
}
