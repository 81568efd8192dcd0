use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{DomainError, DomainResult, Entity, uuid_newtype};

use crate::item::StockItemId;

uuid_newtype! {
    /// Sellable menu item, owned by the menu service.
    pub struct MenuItemId;
}

/// Ingredient consumed per serving of a menu item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    pub stock_item_id: StockItemId,
    pub quantity_per_serving: Decimal,
}

/// Bill of materials of one menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    menu_item_id: MenuItemId,
    lines: Vec<BomLine>,
}

impl Recipe {
    pub fn new(menu_item_id: MenuItemId, lines: Vec<BomLine>) -> DomainResult<Self> {
        let mut seen = HashSet::new();
        for line in &lines {
            if line.quantity_per_serving <= Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "ingredient {} needs a positive quantity per serving",
                    line.stock_item_id
                )));
            }
            if !seen.insert(line.stock_item_id) {
                return Err(DomainError::validation(format!(
                    "ingredient {} is listed twice",
                    line.stock_item_id
                )));
            }
        }
        Ok(Self { menu_item_id, lines })
    }

    pub fn menu_item_id(&self) -> MenuItemId {
        self.menu_item_id
    }

    pub fn lines(&self) -> &[BomLine] {
        &self.lines
    }

    /// Quantity of each ingredient needed for `servings`, in recipe order.
    pub fn requirements(&self, servings: Decimal) -> DomainResult<Vec<(StockItemId, Decimal)>> {
        self.lines
            .iter()
            .map(|l| {
                let quantity = l.quantity_per_serving.checked_mul(servings).ok_or_else(|| {
                    DomainError::overflow(format!("{servings} servings of ingredient {}", l.stock_item_id))
                })?;
                Ok((l.stock_item_id, quantity))
            })
            .collect()
    }
}

impl Entity for Recipe {
    type Id = MenuItemId;

    fn id(&self) -> Self::Id {
        self.menu_item_id
    }
}
