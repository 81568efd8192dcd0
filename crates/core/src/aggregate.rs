//! Consistency boundaries whose changes are published as event streams.

use crate::entity::Entity;
use crate::error::DomainResult;

/// An entity with a versioned change history (vouchers, stock items).
///
/// `version` counts applied changes and doubles as the stream position of the
/// events published for the aggregate.
pub trait AggregateRoot: Entity {
    fn version(&self) -> u64;
}

/// Decide/evolve split for aggregates driven by commands.
///
/// `handle` validates a command against the current state and returns the
/// resulting events without touching state; `apply` folds one event in and
/// cannot fail. Neither performs IO: the engine owns loading and persisting.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;

    fn handle(&self, command: &Self::Command) -> DomainResult<Vec<Self::Event>>;

    /// Must bump `version` by exactly one.
    fn apply(&mut self, event: &Self::Event);
}
