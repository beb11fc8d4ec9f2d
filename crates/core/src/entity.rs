//! Entities: things with identity that outlives their state.

/// An object identified by a reference rather than by its attributes.
///
/// A batch whose purchased quantity changes, or which gains and loses
/// allocations, is still the same batch as long as its reference is unchanged.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Identity comparison, ignoring every other attribute.
    fn same_identity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
