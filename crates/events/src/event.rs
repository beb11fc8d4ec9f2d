/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - handled by zero or more handlers, in registration order
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    type Kind: Copy + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync + 'static;

    /// Routing key of this event.
    fn kind(&self) -> Self::Kind;

    /// Stable event name/type identifier (e.g. "allocation.line_allocated").
    ///
    /// Also used as the pub/sub channel name when the event is broadcast.
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;
}
