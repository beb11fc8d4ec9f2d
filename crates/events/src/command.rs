/// A command: an intent that must be handled by exactly one handler.
///
/// ## Command vs Event
///
/// - **Command**: request to do something (e.g. "allocate 10 units to order o1")
/// - **Event**: fact that something happened (e.g. "o1 was allocated to batch b1")
///
/// Commands may be rejected; a failed command is reported to whoever sent it.
///
/// `Kind` is a fieldless discriminant used as the routing key of the message
/// bus, so handler lookup never needs to inspect payloads.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    type Kind: Copy + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync + 'static;

    /// Routing key of this command.
    fn kind(&self) -> Self::Kind;

    /// Stable command name for logs (e.g. "allocation.allocate").
    fn command_type(&self) -> &'static str;
}
