use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hearth_core::{AggregateId, TenantId};

use crate::event::Event;

/// A published event with the stream metadata subscribers route on.
///
/// `sequence_number` is the aggregate's version right after the event was
/// applied: gapless and increasing per `(aggregate_type, aggregate_id)`, so a
/// subscriber can detect missed or duplicated deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<P> {
    event_id: Uuid,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    aggregate_type: String,
    sequence_number: u64,
    event_type: String,
    schema_version: u32,
    occurred_at: DateTime<Utc>,
    payload: P,
}

impl<P> EventEnvelope<P> {
    /// Wrap `payload` (normally `event` serialized) with `event`'s metadata.
    pub fn seal<E: Event>(
        event: &E,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: P,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            tenant_id: event.tenant_id(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            event_type: event.event_type().to_string(),
            schema_version: event.schema_version(),
            occurred_at: event.occurred_at(),
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Counted {
        tenant_id: TenantId,
        at: DateTime<Utc>,
    }

    impl Event for Counted {
        fn event_type(&self) -> &'static str {
            "test.counted"
        }

        fn tenant_id(&self) -> TenantId {
            self.tenant_id
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn seal_copies_event_metadata() {
        let event = Counted {
            tenant_id: TenantId::new(),
            at: Utc::now(),
        };
        let stream = AggregateId::from_uuid(Uuid::now_v7());

        let envelope = EventEnvelope::seal(&event, stream, "test.stream", 3, 42u32);

        assert_eq!(envelope.tenant_id(), event.tenant_id);
        assert_eq!(envelope.event_type(), "test.counted");
        assert_eq!(envelope.schema_version(), 1);
        assert_eq!(envelope.occurred_at(), event.at);
        assert_eq!(envelope.aggregate_type(), "test.stream");
        assert_eq!(envelope.sequence_number(), 3);
        assert_eq!(*envelope.payload(), 42);
    }
}
