use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{DomainError, DomainResult, Entity, uuid_newtype};

use crate::item::StockItemId;
use crate::location::LocationId;

uuid_newtype! {
    /// Stock batch identifier.
    pub struct BatchId;
}

/// Quantity taken from one batch by an outward movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAllocation {
    pub batch_id: BatchId,
    pub quantity: Decimal,
    pub rate: Decimal,
}

/// Received lot of an item, depleted oldest-first under FIFO.
///
/// A batch is active while `remaining_quantity > 0`; once it reaches zero it is
/// flagged consumed and never reopens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatch {
    id: BatchId,
    item_id: StockItemId,
    location_id: Option<LocationId>,
    label: String,
    expiry_date: Option<NaiveDate>,
    remaining_quantity: Decimal,
    cost_per_unit: Decimal,
    consumed: bool,
    /// Tenant-wide creation order (oldest first).
    position: u64,
}

impl StockBatch {
    #[allow(clippy::too_many_arguments)]
    pub fn receive(
        id: BatchId,
        item_id: StockItemId,
        location_id: Option<LocationId>,
        label: impl Into<String>,
        expiry_date: Option<NaiveDate>,
        quantity: Decimal,
        cost_per_unit: Decimal,
        position: u64,
    ) -> DomainResult<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(DomainError::validation("batch label cannot be empty"));
        }
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "batch {label} quantity must be positive"
            )));
        }
        if cost_per_unit.is_sign_negative() {
            return Err(DomainError::validation(format!(
                "batch {label} cost cannot be negative"
            )));
        }
        Ok(Self {
            id,
            item_id,
            location_id,
            label,
            expiry_date,
            remaining_quantity: quantity,
            cost_per_unit,
            consumed: false,
            position,
        })
    }

    pub fn item_id(&self) -> StockItemId {
        self.item_id
    }

    pub fn location_id(&self) -> Option<LocationId> {
        self.location_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn expiry_date(&self) -> Option<NaiveDate> {
        self.expiry_date
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.remaining_quantity
    }

    pub fn cost_per_unit(&self) -> Decimal {
        self.cost_per_unit
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Take `quantity` out of the batch, flagging it consumed at zero.
    pub fn consume(&mut self, quantity: Decimal) -> DomainResult<()> {
        if self.consumed {
            return Err(DomainError::conflict(format!("batch {} is already consumed", self.label)));
        }
        if quantity <= Decimal::ZERO || quantity > self.remaining_quantity {
            return Err(DomainError::insufficient_stock(format!(
                "batch {} has {} remaining, cannot consume {}",
                self.label, self.remaining_quantity, quantity
            )));
        }
        self.remaining_quantity -= quantity;
        if self.remaining_quantity.is_zero() {
            self.consumed = true;
        }
        Ok(())
    }
}

impl Entity for StockBatch {
    type Id = BatchId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
