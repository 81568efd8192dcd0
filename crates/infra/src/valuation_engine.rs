//! Valuation Engine: stock movements, costing, batches and location balances.
//!
//! `create_movement` and `transfer_stock` are atomic. `record_purchase_receipt`
//! and `deduct_stock_for_sale` are best-effort: each line (ingredient) runs in
//! its own transaction, and a failing line is logged and reported in the
//! returned [`PartialOutcome`] without aborting the others.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tracing::{info, instrument, warn};

use hearth_accounting::DateRange;
use hearth_core::{AggregateRoot, DocumentNumber, DomainError, Entity, TenantId, UserId};
use hearth_events::{EventBus, EventEnvelope};
use hearth_inventory::{
    BatchId, BatchReceived, BomLine, Direction, DocumentRef, GodownStock, LocationId,
    MOVEMENT_PREFIX, MenuItemId, MovementDraft, MovementId, MovementRecorded, MovementType,
    NewStockItem, OutwardCost, Recipe, StockBatch, StockEvent, StockItem, StockItemId,
    StockMovement, plan_movement, weighted_average_cost,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::publish::EventPublisher;
use crate::store::{BooksStore, BooksTx, SequenceKey};

/// Aggregate type of stock item streams (movements).
pub const STOCK_ITEM_AGGREGATE: &str = "inventory.stock_item";
/// Aggregate type of batch streams.
pub const STOCK_BATCH_AGGREGATE: &str = "inventory.batch";

/// Move `quantity` of an item between two locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockTransfer {
    pub item_id: StockItemId,
    pub from_location: LocationId,
    pub to_location: LocationId,
    pub quantity: Decimal,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub created_by: UserId,
}

/// Both legs of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub outward: StockMovement,
    /// Carries `linked_movement = outward.id`.
    pub inward: StockMovement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    pub item_id: StockItemId,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub unit: Option<String>,
    pub batch_label: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub purchase_id: String,
    pub date: NaiveDate,
    pub location_id: Option<LocationId>,
    pub lines: Vec<ReceiptLine>,
    pub created_by: UserId,
}

/// One sale of a menu item whose ingredients are to be deducted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleDeduction {
    pub order_id: String,
    pub menu_item_id: MenuItemId,
    pub servings: Decimal,
    pub location_id: Option<LocationId>,
    pub date: NaiveDate,
    pub created_by: UserId,
}

/// A line (receipt line or BOM ingredient) that could not be recorded.
#[derive(Debug)]
pub struct LineFailure {
    pub line: usize,
    pub item_id: StockItemId,
    pub error: EngineError,
}

/// Result of a best-effort multi-line operation.
#[derive(Debug, Default)]
pub struct PartialOutcome {
    pub recorded: Vec<StockMovement>,
    pub failed: Vec<LineFailure>,
}

impl PartialOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Filter for `movement_history`; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub item_id: Option<StockItemId>,
    /// Matches either the source or the destination location.
    pub location_id: Option<LocationId>,
    pub movement_type: Option<MovementType>,
    pub range: DateRange,
}

impl MovementFilter {
    fn matches(&self, m: &StockMovement) -> bool {
        self.item_id.is_none_or(|id| m.item_id == id)
            && self
                .location_id
                .is_none_or(|loc| m.from_location == Some(loc) || m.to_location == Some(loc))
            && self.movement_type.is_none_or(|t| m.movement_type == t)
            && self.range.contains(m.date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPage {
    /// Matching movements before pagination.
    pub total: usize,
    /// Newest first.
    pub movements: Vec<StockMovement>,
}

/// What one committed movement changed.
struct Recorded {
    movement: StockMovement,
    item: StockItem,
    batch: Option<StockBatch>,
}

#[derive(Debug)]
pub struct ValuationEngine<S, B> {
    store: S,
    publisher: EventPublisher<B>,
    config: EngineConfig,
}

impl<S, B> ValuationEngine<S, B>
where
    S: BooksStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B, config: EngineConfig) -> Self {
        let publisher = EventPublisher::new(bus, config.publish_events);
        Self {
            store,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[instrument(skip(self, new), fields(%tenant_id, code = %new.code))]
    pub fn register_item(&self, tenant_id: TenantId, new: NewStockItem) -> EngineResult<StockItem> {
        self.store.transaction(tenant_id, |tx| {
            if tx.stock_items().iter().any(|i| i.code() == new.code) {
                return Err(DomainError::conflict(format!("item code {} already exists", new.code)).into());
            }
            let item = StockItem::register(StockItemId::new(), new)?;
            tx.put_stock_item(item.clone());
            Ok(item)
        })
    }

    /// Replace the bill of materials of a menu item.
    #[instrument(skip(self, lines), fields(%tenant_id, %menu_item_id))]
    pub fn define_recipe(
        &self,
        tenant_id: TenantId,
        menu_item_id: MenuItemId,
        lines: Vec<BomLine>,
    ) -> EngineResult<Recipe> {
        self.store.transaction(tenant_id, |tx| {
            for line in &lines {
                load_item(tx, line.stock_item_id)?;
            }
            let recipe = Recipe::new(menu_item_id, lines)?;
            tx.put_recipe(recipe.clone());
            Ok(recipe)
        })
    }

    pub fn stock_item(&self, tenant_id: TenantId, item_id: StockItemId) -> EngineResult<StockItem> {
        self.store.transaction(tenant_id, |tx| load_item(tx, item_id))
    }

    /// Balance of an item at a location; `None` if the location never held it.
    pub fn location_stock(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        item_id: StockItemId,
    ) -> EngineResult<Option<GodownStock>> {
        self.store
            .transaction(tenant_id, |tx| Ok(tx.godown_stock(location_id, item_id)))
    }

    /// Unconsumed batches of an item, oldest first.
    pub fn open_batches(&self, tenant_id: TenantId, item_id: StockItemId) -> EngineResult<Vec<StockBatch>> {
        self.store.transaction(tenant_id, |tx| {
            load_item(tx, item_id)?;
            Ok(tx.open_batches(item_id))
        })
    }

    /// Average cost the item would have after receiving `incoming_quantity`
    /// at `incoming_rate`. Read-only.
    pub fn calculate_weighted_average_cost(
        &self,
        tenant_id: TenantId,
        item_id: StockItemId,
        incoming_quantity: Decimal,
        incoming_rate: Decimal,
    ) -> EngineResult<Decimal> {
        self.store.transaction(tenant_id, |tx| {
            let item = load_item(tx, item_id)?;
            Ok(weighted_average_cost(
                item.current_stock(),
                item.average_cost(),
                incoming_quantity,
                incoming_rate,
            )?)
        })
    }

    /// FIFO cost of consuming `quantity` now. Read-only: batches are not
    /// decremented.
    pub fn calculate_fifo_cost(
        &self,
        tenant_id: TenantId,
        item_id: StockItemId,
        quantity: Decimal,
    ) -> EngineResult<OutwardCost> {
        self.store.transaction(tenant_id, |tx| {
            let item = load_item(tx, item_id)?;
            Ok(hearth_inventory::fifo_cost(
                &tx.open_batches(item_id),
                quantity,
                item.average_cost(),
            )?)
        })
    }

    /// Record one inward or outward movement atomically: the movement row,
    /// the item balance and cost, consumed batches and the location balance.
    #[instrument(
        skip(self, draft),
        fields(%tenant_id, item_id = %draft.item_id, movement_type = ?draft.movement_type, quantity = %draft.quantity)
    )]
    pub fn create_movement(&self, tenant_id: TenantId, draft: MovementDraft) -> EngineResult<StockMovement> {
        let occurred_at = Utc::now();
        let recorded = self
            .store
            .transaction(tenant_id, |tx| record_movement(tx, &self.config, &draft, occurred_at))?;

        info!(
            number = %recorded.movement.number,
            balance_after = %recorded.movement.balance_after,
            rate = %recorded.movement.rate,
            "stock movement recorded"
        );
        self.publish_recorded(tenant_id, &recorded, occurred_at);
        Ok(recorded.movement)
    }

    /// Move stock between locations. The item's global balance is unchanged;
    /// a TRANSFER_OUT and a linked TRANSFER_IN are recorded.
    #[instrument(
        skip(self, transfer),
        fields(%tenant_id, item_id = %transfer.item_id, from = %transfer.from_location, to = %transfer.to_location)
    )]
    pub fn transfer_stock(&self, tenant_id: TenantId, transfer: StockTransfer) -> EngineResult<TransferRecord> {
        if transfer.from_location == transfer.to_location {
            return Err(EngineError::StateConflict(format!(
                "cannot transfer within location {}",
                transfer.from_location
            )));
        }
        if transfer.quantity <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "transfer quantity must be positive, got {}",
                transfer.quantity
            )));
        }

        let occurred_at = Utc::now();
        let (record, item) = self.store.transaction(tenant_id, |tx| {
            let mut item = load_item(tx, transfer.item_id)?;

            let mut source = tx
                .godown_stock(transfer.from_location, transfer.item_id)
                .ok_or_else(|| {
                    EngineError::InsufficientResource(format!(
                        "location {} holds no {}",
                        transfer.from_location,
                        item.code()
                    ))
                })?;
            source.issue(transfer.quantity)?;
            let rate = source.average_cost();
            let total_amount = transfer
                .quantity
                .checked_mul(rate)
                .ok_or_else(|| DomainError::overflow(format!("value of {} {}", transfer.quantity, item.code())))?;
            tx.put_godown_stock(source);

            let destination = match tx.godown_stock(transfer.to_location, transfer.item_id) {
                Some(mut existing) => {
                    existing.receive(transfer.quantity)?;
                    existing
                }
                None => GodownStock::open(transfer.to_location, transfer.item_id, transfer.quantity, rate),
            };
            tx.put_godown_stock(destination);

            let leg = |tx: &mut dyn BooksTx, movement_type, linked| -> EngineResult<StockMovement> {
                Ok(StockMovement {
                    id: MovementId::new(),
                    number: next_movement_number(tx, &self.config, transfer.date)?,
                    item_id: transfer.item_id,
                    movement_type,
                    date: transfer.date,
                    from_location: Some(transfer.from_location),
                    to_location: Some(transfer.to_location),
                    quantity: transfer.quantity,
                    unit: item.base_unit().to_string(),
                    rate,
                    total_amount,
                    balance_after: item.current_stock(),
                    batch_label: None,
                    reference: None,
                    notes: transfer.notes.clone(),
                    linked_movement: linked,
                    allocations: Vec::new(),
                    created_by: transfer.created_by,
                    created_at: occurred_at,
                    position: tx.next_sequence(SequenceKey::Position),
                })
            };
            let outward = leg(&mut *tx, MovementType::TransferOut, None)?;
            let inward = leg(&mut *tx, MovementType::TransferIn, Some(outward.id))?;

            tx.append_movement(outward.clone());
            tx.append_movement(inward.clone());
            item.apply_transfer_leg();
            item.apply_transfer_leg();
            tx.put_stock_item(item.clone());

            Ok((TransferRecord { outward, inward }, item))
        })?;

        info!(
            out_number = %record.outward.number,
            in_number = %record.inward.number,
            "stock transferred"
        );
        let events = [
            movement_event(tenant_id, &record.outward, occurred_at),
            movement_event(tenant_id, &record.inward, occurred_at),
        ];
        self.publisher.publish_stream(
            item.id().into(),
            STOCK_ITEM_AGGREGATE,
            item.version(),
            &events,
        );
        Ok(record)
    }

    /// Receive a purchase line by line. Batch-tracked items with a batch label
    /// get a batch; each line is a PURCHASE_IN in its own transaction.
    #[instrument(skip(self, receipt), fields(%tenant_id, purchase_id = %receipt.purchase_id, lines = receipt.lines.len()))]
    pub fn record_purchase_receipt(&self, tenant_id: TenantId, receipt: PurchaseReceipt) -> PartialOutcome {
        let mut outcome = PartialOutcome::default();

        for (index, line) in receipt.lines.iter().enumerate() {
            let mut draft = MovementDraft::new(
                line.item_id,
                MovementType::PurchaseIn,
                receipt.date,
                line.quantity,
                line.rate,
                receipt.created_by,
            )
            .with_reference(DocumentRef::purchase(receipt.purchase_id.clone()));
            draft.to_location = receipt.location_id;
            draft.unit = line.unit.clone();
            if let Some(label) = &line.batch_label {
                draft = draft.with_batch(label.clone(), line.expiry_date);
            }

            match self.create_movement(tenant_id, draft) {
                Ok(movement) => outcome.recorded.push(movement),
                Err(error) => {
                    warn!(
                        %tenant_id,
                        purchase_id = %receipt.purchase_id,
                        item_id = %line.item_id,
                        line = index,
                        error = %error,
                        "purchase receipt line skipped"
                    );
                    outcome.failed.push(LineFailure {
                        line: index,
                        item_id: line.item_id,
                        error,
                    });
                }
            }
        }

        outcome
    }

    /// Deduct the ingredients of a sold menu item.
    ///
    /// Never fails because of an ingredient: insufficient stock or a missing
    /// item is logged and reported, the remaining ingredients are still
    /// deducted. Only a failure to read or scale the recipe is returned as an
    /// error.
    #[instrument(
        skip(self, sale),
        fields(%tenant_id, order_id = %sale.order_id, menu_item_id = %sale.menu_item_id, servings = %sale.servings)
    )]
    pub fn deduct_stock_for_sale(&self, tenant_id: TenantId, sale: SaleDeduction) -> EngineResult<PartialOutcome> {
        if sale.servings <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "servings must be positive, got {}",
                sale.servings
            )));
        }

        let recipe = self
            .store
            .transaction(tenant_id, |tx| Ok(tx.recipe(sale.menu_item_id)))?;
        let Some(recipe) = recipe else {
            info!("menu item has no recipe; nothing to deduct");
            return Ok(PartialOutcome::default());
        };

        let mut outcome = PartialOutcome::default();
        for (index, (item_id, quantity)) in recipe.requirements(sale.servings)?.into_iter().enumerate() {
            let mut draft = MovementDraft::new(
                item_id,
                MovementType::SalesOut,
                sale.date,
                quantity,
                Decimal::ZERO,
                sale.created_by,
            )
            .with_reference(DocumentRef::sale(sale.order_id.clone()));
            draft.from_location = sale.location_id;

            match self.create_movement(tenant_id, draft) {
                Ok(movement) => outcome.recorded.push(movement),
                Err(error) => {
                    warn!(
                        %tenant_id,
                        order_id = %sale.order_id,
                        %item_id,
                        %quantity,
                        error = %error,
                        "ingredient deduction skipped"
                    );
                    outcome.failed.push(LineFailure {
                        line: index,
                        item_id,
                        error,
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Movements matching `filter`, newest first.
    pub fn movement_history(
        &self,
        tenant_id: TenantId,
        filter: &MovementFilter,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> EngineResult<MovementPage> {
        let page = self.config.page(offset, limit);
        self.store.transaction(tenant_id, |tx| {
            let mut matching: Vec<StockMovement> =
                tx.movements().into_iter().filter(|m| filter.matches(m)).collect();
            matching.sort_by(|a, b| (b.date, b.position).cmp(&(a.date, a.position)));
            let total = matching.len();
            Ok(MovementPage {
                total,
                movements: page.slice(matching),
            })
        })
    }

    fn publish_recorded(&self, tenant_id: TenantId, recorded: &Recorded, occurred_at: DateTime<Utc>) {
        if let Some(batch) = &recorded.batch {
            let event = StockEvent::BatchReceived(BatchReceived {
                tenant_id,
                batch: batch.clone(),
                occurred_at,
            });
            self.publisher
                .publish(batch.id().into(), STOCK_BATCH_AGGREGATE, 1, &event);
        }
        self.publisher.publish(
            recorded.item.id().into(),
            STOCK_ITEM_AGGREGATE,
            recorded.item.version(),
            &movement_event(tenant_id, &recorded.movement, occurred_at),
        );
    }
}

fn movement_event(tenant_id: TenantId, movement: &StockMovement, occurred_at: DateTime<Utc>) -> StockEvent {
    StockEvent::MovementRecorded(MovementRecorded {
        tenant_id,
        movement: movement.clone(),
        occurred_at,
    })
}

fn load_item(tx: &dyn BooksTx, item_id: StockItemId) -> EngineResult<StockItem> {
    tx.stock_item(item_id)
        .ok_or_else(|| EngineError::NotFound(format!("stock item {item_id}")))
}

/// Next `SM-<FY>-<6 digits>` number for a movement dated `date`.
fn next_movement_number(
    tx: &mut dyn BooksTx,
    config: &EngineConfig,
    date: NaiveDate,
) -> EngineResult<DocumentNumber> {
    let fiscal_year = config.fiscal_year(date);
    let sequence = tx.next_sequence(SequenceKey::Movement { fiscal_year });
    Ok(DocumentNumber::new(MOVEMENT_PREFIX, fiscal_year, sequence)?)
}

fn record_movement(
    tx: &mut dyn BooksTx,
    config: &EngineConfig,
    draft: &MovementDraft,
    occurred_at: DateTime<Utc>,
) -> EngineResult<Recorded> {
    let mut item = load_item(tx, draft.item_id)?;
    let open_batches = tx.open_batches(draft.item_id);
    let plan = plan_movement(&item, &open_batches, draft)?;

    for allocation in &plan.allocations {
        let mut batch = tx
            .batch(allocation.batch_id)
            .ok_or_else(|| EngineError::NotFound(format!("batch {}", allocation.batch_id)))?;
        batch.consume(allocation.quantity)?;
        tx.put_batch(batch);
    }

    match plan.direction {
        Direction::Inward => {
            if let Some(location_id) = draft.to_location {
                let stock = match tx.godown_stock(location_id, draft.item_id) {
                    Some(mut existing) => {
                        existing.receive(plan.quantity)?;
                        existing
                    }
                    None => GodownStock::open(location_id, draft.item_id, plan.quantity, plan.rate),
                };
                tx.put_godown_stock(stock);
            }
        }
        Direction::Outward => {
            if let Some(location_id) = draft.from_location {
                let mut stock = tx.godown_stock(location_id, draft.item_id).ok_or_else(|| {
                    EngineError::NotFound(format!(
                        "no stock record for item {} at location {location_id}",
                        item.code()
                    ))
                })?;
                stock.issue(plan.quantity)?;
                tx.put_godown_stock(stock);
            }
        }
    }

    let batch = match (&draft.batch_label, plan.direction) {
        (Some(label), Direction::Inward) if item.tracks_batches() => {
            let batch = StockBatch::receive(
                BatchId::new(),
                draft.item_id,
                draft.to_location,
                label.clone(),
                draft.batch_expiry,
                plan.quantity,
                plan.rate,
                tx.next_sequence(SequenceKey::Position),
            )?;
            tx.put_batch(batch.clone());
            Some(batch)
        }
        _ => None,
    };

    item.apply_movement(draft.movement_type, &plan);

    let movement = StockMovement {
        id: MovementId::new(),
        number: next_movement_number(tx, config, draft.date)?,
        item_id: draft.item_id,
        movement_type: draft.movement_type,
        date: draft.date,
        from_location: draft.from_location,
        to_location: draft.to_location,
        quantity: plan.quantity,
        unit: draft
            .unit
            .clone()
            .unwrap_or_else(|| item.base_unit().to_string()),
        rate: plan.rate,
        total_amount: plan.total_amount,
        balance_after: plan.balance_after,
        batch_label: draft.batch_label.clone(),
        reference: draft.reference.clone(),
        notes: draft.notes.clone(),
        linked_movement: None,
        allocations: plan.allocations,
        created_by: draft.created_by,
        created_at: occurred_at,
        position: tx.next_sequence(SequenceKey::Position),
    };

    tx.append_movement(movement.clone());
    tx.put_stock_item(item.clone());

    Ok(Recorded {
        movement,
        item,
        batch,
    })
}
