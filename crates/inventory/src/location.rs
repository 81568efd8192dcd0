use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{DomainError, DomainResult, Entity, uuid_newtype};

use crate::item::StockItemId;

uuid_newtype! {
    /// Godown (physical or logical stock location) identifier.
    pub struct LocationId;
}

/// Quantity of one item held at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GodownStock {
    key: (LocationId, StockItemId),
    quantity: Decimal,
    average_cost: Decimal,
}

impl GodownStock {
    /// First receipt of an item at a location, valued at the movement's rate.
    pub fn open(location_id: LocationId, item_id: StockItemId, quantity: Decimal, rate: Decimal) -> Self {
        Self {
            key: (location_id, item_id),
            quantity,
            average_cost: rate,
        }
    }

    pub fn location_id(&self) -> LocationId {
        self.key.0
    }

    pub fn item_id(&self) -> StockItemId {
        self.key.1
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn average_cost(&self) -> Decimal {
        self.average_cost
    }

    pub fn receive(&mut self, quantity: Decimal) -> DomainResult<()> {
        self.quantity = self.quantity.checked_add(quantity).ok_or_else(|| {
            DomainError::overflow(format!("stock of item {} at location {}", self.key.1, self.key.0))
        })?;
        Ok(())
    }

    /// Take stock out of the location; the balance never goes negative.
    pub fn issue(&mut self, quantity: Decimal) -> DomainResult<()> {
        if quantity > self.quantity {
            return Err(DomainError::insufficient_stock(format!(
                "location {} holds {} of item {}, requested {}",
                self.key.0, self.quantity, self.key.1, quantity
            )));
        }
        self.quantity -= quantity;
        Ok(())
    }
}

impl Entity for GodownStock {
    type Id = (LocationId, StockItemId);

    fn id(&self) -> Self::Id {
        self.key
    }
}
