use hearth_core::{Aggregate, DomainResult};

/// Run a command against an aggregate in memory.
///
/// The aggregate is only mutated when `handle` accepts the command, so a
/// rejected command leaves nothing to undo. The returned events are in
/// application order; the aggregate's version afterwards is the stream
/// position of the last one.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> DomainResult<Vec<A::Event>>
where
    A: Aggregate,
{
    let events = aggregate.handle(command)?;
    let before = aggregate.version();
    for event in &events {
        aggregate.apply(event);
    }
    debug_assert_eq!(
        aggregate.version(),
        before + events.len() as u64,
        "apply must bump the version once per event"
    );
    Ok(events)
}
