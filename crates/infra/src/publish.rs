//! Post-commit publication of engine events.
//!
//! Events are published only after their transaction committed. The books are
//! the source of truth: a publication failure is logged and swallowed, it never
//! turns a committed operation into an error.

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use hearth_core::AggregateId;
use hearth_events::{Event, EventBus, EventEnvelope};

#[derive(Debug)]
pub struct EventPublisher<B> {
    bus: B,
    enabled: bool,
}

impl<B> EventPublisher<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(bus: B, enabled: bool) -> Self {
        Self { bus, enabled }
    }

    /// Publish the events an aggregate emitted in one transaction.
    ///
    /// `version_after` is the aggregate version once all of `events` were
    /// applied; each envelope gets the version its event produced.
    pub fn publish_stream<E>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        version_after: u64,
        events: &[E],
    ) where
        E: Event + Serialize,
    {
        let first = version_after.saturating_sub(events.len() as u64) + 1;
        for (offset, event) in events.iter().enumerate() {
            self.publish(aggregate_id, aggregate_type, first + offset as u64, event);
        }
    }

    pub fn publish<E>(&self, aggregate_id: AggregateId, aggregate_type: &str, sequence_number: u64, event: &E)
    where
        E: Event + Serialize,
    {
        if !self.enabled {
            return;
        }

        let payload = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(err) => {
                warn!(
                    tenant_id = %event.tenant_id(),
                    %aggregate_id,
                    event_type = event.event_type(),
                    error = %err,
                    "failed to serialize event; not published"
                );
                return;
            }
        };

        let envelope = EventEnvelope::seal(event, aggregate_id, aggregate_type, sequence_number, payload);
        if let Err(err) = self.bus.publish(envelope) {
            warn!(
                tenant_id = %event.tenant_id(),
                %aggregate_id,
                event_type = event.event_type(),
                error = ?err,
                "event publication failed after commit"
            );
        }
    }
}
