//! Identity of stored records.

/// A record the books keep by identity.
///
/// Storage keys rows by `id()`. The id never changes while the record's
/// balances, status or remaining quantities do.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}
