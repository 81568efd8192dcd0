use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{AggregateRoot, DomainError, DomainResult, Entity, uuid_newtype};

use crate::movement::{MovementPlan, MovementType};
use crate::valuation::{CostingPolicy, Fifo, WeightedAverage};

uuid_newtype! {
    /// Stock item identifier (tenant-scoped by storage).
    pub struct StockItemId;
}

/// Policy for costing outward movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValuationMethod {
    WeightedAverage,
    Fifo,
}

impl ValuationMethod {
    /// The costing strategy implementing this method.
    pub fn policy(self) -> &'static dyn CostingPolicy {
        match self {
            ValuationMethod::WeightedAverage => &WeightedAverage,
            ValuationMethod::Fifo => &Fifo,
        }
    }
}

/// Registry input for a new stock item. Items always start at zero stock;
/// opening quantities are brought in with an `ADJUSTMENT_IN` movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockItem {
    pub code: String,
    pub name: String,
    pub base_unit: String,
    pub valuation_method: ValuationMethod,
    pub tracks_batches: bool,
    /// Cost used for outward movements before any receipt sets one.
    pub standard_cost: Decimal,
}

/// Stock item master record.
///
/// `current_stock` is never negative and only changes through
/// [`StockItem::apply_movement`], i.e. through a committed stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    id: StockItemId,
    code: String,
    name: String,
    base_unit: String,
    current_stock: Decimal,
    valuation_method: ValuationMethod,
    average_cost: Decimal,
    last_purchase_rate: Option<Decimal>,
    tracks_batches: bool,
    version: u64,
}

impl StockItem {
    pub fn register(id: StockItemId, new: NewStockItem) -> DomainResult<Self> {
        if new.code.trim().is_empty() {
            return Err(DomainError::validation("item code cannot be empty"));
        }
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        if new.base_unit.trim().is_empty() {
            return Err(DomainError::validation("base unit cannot be empty"));
        }
        if new.standard_cost.is_sign_negative() {
            return Err(DomainError::validation("standard cost cannot be negative"));
        }
        Ok(Self {
            id,
            code: new.code,
            name: new.name,
            base_unit: new.base_unit,
            current_stock: Decimal::ZERO,
            valuation_method: new.valuation_method,
            average_cost: new.standard_cost,
            last_purchase_rate: None,
            tracks_batches: new.tracks_batches,
            version: 0,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_unit(&self) -> &str {
        &self.base_unit
    }

    pub fn current_stock(&self) -> Decimal {
        self.current_stock
    }

    pub fn valuation_method(&self) -> ValuationMethod {
        self.valuation_method
    }

    pub fn average_cost(&self) -> Decimal {
        self.average_cost
    }

    pub fn last_purchase_rate(&self) -> Option<Decimal> {
        self.last_purchase_rate
    }

    pub fn tracks_batches(&self) -> bool {
        self.tracks_batches
    }

    /// Commit a planned movement onto the master record.
    pub fn apply_movement(&mut self, movement_type: MovementType, plan: &MovementPlan) {
        self.current_stock = plan.balance_after;
        if let Some(avg) = plan.new_average_cost {
            self.average_cost = avg;
        }
        if movement_type == MovementType::PurchaseIn {
            self.last_purchase_rate = Some(plan.rate);
        }
        self.version += 1;
    }

    /// Record one leg of an inter-location transfer: the stream advances but
    /// the global quantity does not change.
    pub fn apply_transfer_leg(&mut self) {
        self.version += 1;
    }
}

impl AggregateRoot for StockItem {
    fn version(&self) -> u64 {
        self.version
    }
}

impl Entity for StockItem {
    type Id = StockItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
