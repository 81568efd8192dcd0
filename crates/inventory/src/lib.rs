//! Inventory valuation domain (stock items, movements, batches, locations).
//!
//! This crate contains the costing and balance rules for stock, implemented as
//! deterministic domain logic (no IO, no storage). The infrastructure layer
//! runs them inside a transaction and persists the outcome.

pub mod batch;
pub mod bom;
pub mod event;
pub mod item;
pub mod location;
pub mod movement;
pub mod valuation;

pub use batch::{BatchAllocation, BatchId, StockBatch};
pub use bom::{BomLine, MenuItemId, Recipe};
pub use event::{BatchReceived, MovementRecorded, StockEvent};
pub use item::{NewStockItem, StockItem, StockItemId, ValuationMethod};
pub use location::{GodownStock, LocationId};
pub use movement::{
    Direction, DocumentRef, MOVEMENT_PREFIX, MovementDraft, MovementId, MovementPlan, MovementType,
    StockMovement, plan_movement,
};
pub use valuation::{CostingPolicy, Fifo, OutwardCost, WeightedAverage, fifo_cost, weighted_average_cost};
