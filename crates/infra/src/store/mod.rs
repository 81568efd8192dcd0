//! Transactional storage boundary for the books.
//!
//! Engines never touch storage outside [`BooksStore::transaction`]. A
//! transaction is bound to exactly one tenant: the [`BooksTx`] it hands out can
//! only reach that tenant's partition, so an id from another tenant resolves to
//! nothing. Implementations must guarantee:
//!
//! - **Atomicity**: writes become visible only if the work returns `Ok`.
//! - **Serializability per tenant**: read-modify-write of balances and
//!   sequence counters never interleaves with another transaction of the same
//!   tenant (serializable isolation or explicit locks, as the backend allows).
//! - **Read-your-writes** inside a transaction.

pub mod in_memory;

pub use in_memory::InMemoryBooksStore;

use std::sync::Arc;

use thiserror::Error;

use hearth_accounting::{Account, AccountId, Voucher, VoucherId, VoucherType};
use hearth_core::{FiscalYear, TenantId};
use hearth_inventory::{
    BatchId, GodownStock, LocationId, MenuItemId, Recipe, StockBatch, StockItem, StockItemId,
    StockMovement,
};

use crate::error::EngineError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The tenant registry lock was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),
}

/// Independent monotonic counters kept per tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKey {
    /// Voucher numbers, one series per type and fiscal year.
    Voucher {
        voucher_type: VoucherType,
        fiscal_year: FiscalYear,
    },
    /// Stock movement numbers (`SM` series) per fiscal year.
    Movement { fiscal_year: FiscalYear },
    /// Creation order of log rows (ledger entries, movements, batches).
    Position,
}

/// One tenant's books inside a transaction.
pub trait BooksTx {
    fn account(&self, id: AccountId) -> Option<Account>;
    fn accounts(&self) -> Vec<Account>;
    fn put_account(&mut self, account: Account);

    fn voucher(&self, id: VoucherId) -> Option<Voucher>;
    fn vouchers(&self) -> Vec<Voucher>;
    fn put_voucher(&mut self, voucher: Voucher);

    fn stock_item(&self, id: StockItemId) -> Option<StockItem>;
    fn stock_items(&self) -> Vec<StockItem>;
    fn put_stock_item(&mut self, item: StockItem);

    fn movements(&self) -> Vec<StockMovement>;
    /// Movements are append-only: there is no update.
    fn append_movement(&mut self, movement: StockMovement);

    fn batch(&self, id: BatchId) -> Option<StockBatch>;
    /// Unconsumed batches of an item, oldest first.
    fn open_batches(&self, item_id: StockItemId) -> Vec<StockBatch>;
    fn put_batch(&mut self, batch: StockBatch);

    fn godown_stock(&self, location_id: LocationId, item_id: StockItemId) -> Option<GodownStock>;
    fn godown_stocks(&self) -> Vec<GodownStock>;
    fn put_godown_stock(&mut self, stock: GodownStock);

    fn recipe(&self, menu_item_id: MenuItemId) -> Option<Recipe>;
    fn put_recipe(&mut self, recipe: Recipe);

    /// Increment and return the counter for `key` (first value is 1).
    fn next_sequence(&mut self, key: SequenceKey) -> u64;
}

/// Storage holding every tenant's books.
pub trait BooksStore: Send + Sync {
    /// Run `work` atomically against `tenant_id`'s partition.
    fn transaction<T, F>(&self, tenant_id: TenantId, work: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut dyn BooksTx) -> Result<T, EngineError>;
}

impl<S> BooksStore for Arc<S>
where
    S: BooksStore,
{
    fn transaction<T, F>(&self, tenant_id: TenantId, work: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut dyn BooksTx) -> Result<T, EngineError>,
    {
        (**self).transaction(tenant_id, work)
    }
}
