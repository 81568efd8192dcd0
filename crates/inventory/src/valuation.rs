//! Costing of stock movements.
//!
//! Inward movements carry their own rate. Outward movements are costed by the
//! item's valuation method through a [`CostingPolicy`].
//!
//! All arithmetic is checked: a quantity or rate large enough to leave the
//! decimal range surfaces as a validation error instead of a panic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{DomainError, DomainResult, Entity};

use crate::batch::{BatchAllocation, StockBatch};
use crate::item::StockItem;

/// Cost of an outward movement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutwardCost {
    pub total: Decimal,
    /// Batches drawn from, oldest first. Empty for weighted average.
    pub allocations: Vec<BatchAllocation>,
    /// Quantity not covered by batches, priced at the item's average cost.
    pub shortfall: Decimal,
}

impl OutwardCost {
    /// Effective unit rate for `quantity`.
    pub fn unit_rate(&self, quantity: Decimal) -> DomainResult<Decimal> {
        if quantity.is_zero() {
            return Ok(Decimal::ZERO);
        }
        self.total
            .checked_div(quantity)
            .ok_or_else(|| DomainError::overflow("outward unit rate"))
    }
}

/// Strategy costing an outward movement of an item.
pub trait CostingPolicy: Send + Sync {
    fn outward_cost(
        &self,
        item: &StockItem,
        open_batches: &[StockBatch],
        quantity: Decimal,
    ) -> DomainResult<OutwardCost>;

    /// New average cost after an inward movement, if the policy maintains one.
    fn inward_average(
        &self,
        item: &StockItem,
        quantity: Decimal,
        rate: Decimal,
    ) -> DomainResult<Option<Decimal>>;
}

/// Outward movements at the item's stored average cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedAverage;

impl CostingPolicy for WeightedAverage {
    fn outward_cost(
        &self,
        item: &StockItem,
        _open_batches: &[StockBatch],
        quantity: Decimal,
    ) -> DomainResult<OutwardCost> {
        let total = quantity
            .checked_mul(item.average_cost())
            .ok_or_else(|| DomainError::overflow(format!("cost of {quantity} {}", item.code())))?;
        Ok(OutwardCost {
            total,
            allocations: Vec::new(),
            shortfall: Decimal::ZERO,
        })
    }

    fn inward_average(
        &self,
        item: &StockItem,
        quantity: Decimal,
        rate: Decimal,
    ) -> DomainResult<Option<Decimal>> {
        weighted_average_cost(item.current_stock(), item.average_cost(), quantity, rate).map(Some)
    }
}

/// Outward movements drawn from the oldest open batches first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fifo;

impl CostingPolicy for Fifo {
    fn outward_cost(
        &self,
        item: &StockItem,
        open_batches: &[StockBatch],
        quantity: Decimal,
    ) -> DomainResult<OutwardCost> {
        let own: Vec<StockBatch> = open_batches
            .iter()
            .filter(|b| b.item_id() == item.id())
            .cloned()
            .collect();
        fifo_cost(&own, quantity, item.average_cost())
    }

    fn inward_average(
        &self,
        _item: &StockItem,
        _quantity: Decimal,
        _rate: Decimal,
    ) -> DomainResult<Option<Decimal>> {
        Ok(None)
    }
}

fn product(quantity: Decimal, rate: Decimal) -> DomainResult<Decimal> {
    quantity
        .checked_mul(rate)
        .ok_or_else(|| DomainError::overflow(format!("{quantity} x {rate}")))
}

fn sum(a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::overflow(format!("{a} + {b}")))
}

/// `(q·avg + iq·ir) / (q + iq)`; an empty (or negative) starting position
/// takes the incoming rate as-is.
pub fn weighted_average_cost(
    current_quantity: Decimal,
    current_average: Decimal,
    incoming_quantity: Decimal,
    incoming_rate: Decimal,
) -> DomainResult<Decimal> {
    let total_quantity = sum(current_quantity, incoming_quantity)?;
    if current_quantity <= Decimal::ZERO || total_quantity <= Decimal::ZERO {
        return Ok(incoming_rate);
    }
    let value = sum(
        product(current_quantity, current_average)?,
        product(incoming_quantity, incoming_rate)?,
    )?;
    value
        .checked_div(total_quantity)
        .ok_or_else(|| DomainError::overflow("weighted average cost"))
}

/// Greedy oldest-first consumption of `quantity` from `batches`.
///
/// Consumed batches are skipped and the input order is ignored: batches are
/// visited by creation position. Whatever the batches cannot cover is priced at
/// `fallback_rate`. Nothing is mutated; callers decrement the batches named in
/// the allocations.
pub fn fifo_cost(
    batches: &[StockBatch],
    quantity: Decimal,
    fallback_rate: Decimal,
) -> DomainResult<OutwardCost> {
    let mut open: Vec<&StockBatch> = batches
        .iter()
        .filter(|b| !b.is_consumed() && b.remaining_quantity() > Decimal::ZERO)
        .collect();
    open.sort_by_key(|b| b.position());

    let mut remaining = quantity;
    let mut total = Decimal::ZERO;
    let mut allocations = Vec::new();

    for batch in open {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(batch.remaining_quantity());
        total = sum(total, product(take, batch.cost_per_unit())?)?;
        allocations.push(BatchAllocation {
            batch_id: batch.id(),
            quantity: take,
            rate: batch.cost_per_unit(),
        });
        remaining -= take;
    }

    let shortfall = remaining.max(Decimal::ZERO);
    total = sum(total, product(shortfall, fallback_rate)?)?;

    Ok(OutwardCost {
        total,
        allocations,
        shortfall,
    })
}
