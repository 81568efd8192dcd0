use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{
    BalanceRule, DocumentNumber, DomainError, DomainResult, Effect, Entity, UserId, settle,
    uuid_newtype,
};

use crate::batch::{BatchAllocation, StockBatch};
use crate::item::{StockItem, StockItemId};
use crate::location::LocationId;

uuid_newtype! {
    /// Stock movement identifier.
    pub struct MovementId;
}

/// Movement number prefix (`SM-<FY>-<6 digits>`).
pub const MOVEMENT_PREFIX: &str = "SM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    PurchaseIn,
    SalesOut,
    TransferIn,
    TransferOut,
    AdjustmentIn,
    AdjustmentOut,
    ProductionIn,
    ProductionOut,
    ReturnIn,
    ReturnOut,
    Expired,
}

impl MovementType {
    pub const ALL: [MovementType; 11] = [
        MovementType::PurchaseIn,
        MovementType::SalesOut,
        MovementType::TransferIn,
        MovementType::TransferOut,
        MovementType::AdjustmentIn,
        MovementType::AdjustmentOut,
        MovementType::ProductionIn,
        MovementType::ProductionOut,
        MovementType::ReturnIn,
        MovementType::ReturnOut,
        MovementType::Expired,
    ];

    /// `*_IN` types add stock; `*_OUT` and `EXPIRED` remove it.
    pub fn direction(self) -> Direction {
        match self {
            MovementType::PurchaseIn
            | MovementType::TransferIn
            | MovementType::AdjustmentIn
            | MovementType::ProductionIn
            | MovementType::ReturnIn => Direction::Inward,
            MovementType::SalesOut
            | MovementType::TransferOut
            | MovementType::AdjustmentOut
            | MovementType::ProductionOut
            | MovementType::ReturnOut
            | MovementType::Expired => Direction::Outward,
        }
    }

    pub fn is_transfer(self) -> bool {
        matches!(self, MovementType::TransferIn | MovementType::TransferOut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Inward,
    Outward,
}

/// Quantities are positive; the direction supplies the sign.
impl BalanceRule for Direction {
    type Line = Decimal;

    fn delta(&self, quantity: &Decimal) -> Decimal {
        match self {
            Direction::Inward => *quantity,
            Direction::Outward => -*quantity,
        }
    }
}

/// Originating business document of a movement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn purchase(id: impl Into<String>) -> Self {
        Self::new("purchase", id)
    }

    pub fn sale(order_id: impl Into<String>) -> Self {
        Self::new("sale", order_id)
    }
}

/// Caller input for a movement. `rate` is honoured for inward movements only;
/// outward movements are costed by the item's valuation method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    pub item_id: StockItemId,
    pub movement_type: MovementType,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub unit: Option<String>,
    pub rate: Decimal,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    /// Opens a batch when an inward movement hits a batch-tracked item.
    pub batch_label: Option<String>,
    pub batch_expiry: Option<NaiveDate>,
    pub reference: Option<DocumentRef>,
    pub notes: Option<String>,
    pub created_by: UserId,
}

impl MovementDraft {
    pub fn new(
        item_id: StockItemId,
        movement_type: MovementType,
        date: NaiveDate,
        quantity: Decimal,
        rate: Decimal,
        created_by: UserId,
    ) -> Self {
        Self {
            item_id,
            movement_type,
            date,
            quantity,
            unit: None,
            rate,
            from_location: None,
            to_location: None,
            batch_label: None,
            batch_expiry: None,
            reference: None,
            notes: None,
            created_by,
        }
    }

    pub fn from_location(mut self, location: LocationId) -> Self {
        self.from_location = Some(location);
        self
    }

    pub fn to_location(mut self, location: LocationId) -> Self {
        self.to_location = Some(location);
        self
    }

    pub fn with_batch(mut self, label: impl Into<String>, expiry: Option<NaiveDate>) -> Self {
        self.batch_label = Some(label.into());
        self.batch_expiry = expiry;
        self
    }

    pub fn with_reference(mut self, reference: DocumentRef) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Outcome of costing a movement against the item's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPlan {
    pub direction: Direction,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub total_amount: Decimal,
    pub balance_after: Decimal,
    pub new_average_cost: Option<Decimal>,
    pub allocations: Vec<BatchAllocation>,
}

/// Immutable stock log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub number: DocumentNumber,
    pub item_id: StockItemId,
    pub movement_type: MovementType,
    pub date: NaiveDate,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub quantity: Decimal,
    pub unit: String,
    pub rate: Decimal,
    pub total_amount: Decimal,
    pub balance_after: Decimal,
    pub batch_label: Option<String>,
    pub reference: Option<DocumentRef>,
    pub notes: Option<String>,
    /// The TRANSFER_OUT leg a TRANSFER_IN belongs to.
    pub linked_movement: Option<MovementId>,
    pub allocations: Vec<BatchAllocation>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    /// Tenant-wide creation order.
    pub position: u64,
}

impl StockMovement {
    pub fn direction(&self) -> Direction {
        self.movement_type.direction()
    }

    pub fn number_string(&self) -> String {
        self.number.to_string()
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Cost a movement and compute the item's resulting balance.
///
/// Rejects transfer types (they never change the item's global balance) and
/// any movement that would take the balance below zero.
pub fn plan_movement(
    item: &StockItem,
    open_batches: &[StockBatch],
    draft: &MovementDraft,
) -> DomainResult<MovementPlan> {
    if draft.item_id != item.id() {
        return Err(DomainError::validation(format!(
            "movement targets item {} but was planned against {}",
            draft.item_id,
            item.code()
        )));
    }
    if draft.movement_type.is_transfer() {
        return Err(DomainError::validation(
            "transfer movements are recorded through a stock transfer",
        ));
    }
    if draft.quantity <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "movement quantity must be positive, got {}",
            draft.quantity
        )));
    }

    let direction = draft.movement_type.direction();
    let balance_after = settle(item.current_stock(), direction.delta(&draft.quantity), Effect::Apply)?;
    if balance_after < Decimal::ZERO {
        return Err(DomainError::insufficient_stock(format!(
            "item {} has {} {} available, {} requested",
            item.code(),
            item.current_stock(),
            item.base_unit(),
            draft.quantity
        )));
    }

    let policy = item.valuation_method().policy();
    match direction {
        Direction::Inward => {
            if draft.rate.is_sign_negative() {
                return Err(DomainError::validation("inward rate cannot be negative"));
            }
            let total_amount = draft.quantity.checked_mul(draft.rate).ok_or_else(|| {
                DomainError::overflow(format!("value of {} {} at {}", draft.quantity, item.code(), draft.rate))
            })?;
            Ok(MovementPlan {
                direction,
                quantity: draft.quantity,
                rate: draft.rate,
                total_amount,
                balance_after,
                new_average_cost: policy.inward_average(item, draft.quantity, draft.rate)?,
                allocations: Vec::new(),
            })
        }
        Direction::Outward => {
            let cost = policy.outward_cost(item, open_batches, draft.quantity)?;
            Ok(MovementPlan {
                direction,
                quantity: draft.quantity,
                rate: cost.unit_rate(draft.quantity)?,
                total_amount: cost.total,
                balance_after,
                new_average_cost: None,
                allocations: cost.allocations,
            })
        }
    }
}
