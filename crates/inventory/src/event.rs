use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hearth_core::TenantId;
use hearth_events::Event;

use crate::batch::StockBatch;
use crate::movement::StockMovement;

/// Event: a stock movement was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRecorded {
    pub tenant_id: TenantId,
    pub movement: StockMovement,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a batch was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceived {
    pub tenant_id: TenantId,
    pub batch: StockBatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StockEvent {
    MovementRecorded(MovementRecorded),
    BatchReceived(BatchReceived),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::MovementRecorded(_) => "inventory.movement.recorded",
            StockEvent::BatchReceived(_) => "inventory.batch.received",
        }
    }

    fn tenant_id(&self) -> TenantId {
        match self {
            StockEvent::MovementRecorded(e) => e.tenant_id,
            StockEvent::BatchReceived(e) => e.tenant_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::MovementRecorded(e) => e.occurred_at,
            StockEvent::BatchReceived(e) => e.occurred_at,
        }
    }
}
