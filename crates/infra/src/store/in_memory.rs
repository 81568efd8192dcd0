use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use hearth_accounting::{Account, AccountId, Voucher, VoucherId};
use hearth_core::{Entity, TenantId};
use hearth_inventory::{
    BatchId, GodownStock, LocationId, MenuItemId, Recipe, StockBatch, StockItem, StockItemId,
    StockMovement,
};

use super::{BooksStore, BooksTx, SequenceKey, StoreError};
use crate::error::EngineError;

/// Rows of one entity type, keyed by identity.
#[derive(Debug)]
struct Table<E: Entity> {
    rows: HashMap<E::Id, E>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<E: Entity + Clone> Table<E> {
    fn put(&mut self, row: E) {
        self.rows.insert(row.id(), row);
    }

    /// Row `id` as seen through the staged rows in `self` over `committed`.
    fn lookup(&self, committed: &Self, id: &E::Id) -> Option<E> {
        self.rows.get(id).or_else(|| committed.rows.get(id)).cloned()
    }

    /// Every row of `committed` not shadowed by `self`, then the staged rows.
    fn merged<'a>(&'a self, committed: &'a Self) -> impl Iterator<Item = &'a E> {
        committed
            .rows
            .iter()
            .filter(|(id, _)| !self.rows.contains_key(id))
            .map(|(_, row)| row)
            .chain(self.rows.values())
    }

    fn absorb(&mut self, staged: Self) {
        self.rows.extend(staged.rows);
    }
}

/// One tenant's partition.
#[derive(Debug, Default)]
struct TenantBooks {
    accounts: Table<Account>,
    vouchers: Table<Voucher>,
    items: Table<StockItem>,
    movements: Table<StockMovement>,
    batches: Table<StockBatch>,
    godowns: Table<GodownStock>,
    recipes: Table<Recipe>,
    sequences: HashMap<SequenceKey, u64>,
}

impl TenantBooks {
    /// Commit a transaction's writes.
    fn absorb(&mut self, staged: TenantBooks) {
        self.accounts.absorb(staged.accounts);
        self.vouchers.absorb(staged.vouchers);
        self.items.absorb(staged.items);
        self.movements.absorb(staged.movements);
        self.batches.absorb(staged.batches);
        self.godowns.absorb(staged.godowns);
        self.recipes.absorb(staged.recipes);
        self.sequences.extend(staged.sequences);
    }
}

/// A transaction's view: writes land in `staged`, reads see them over the
/// committed partition, which stays untouched until commit.
struct StagedBooks<'a> {
    committed: &'a TenantBooks,
    staged: TenantBooks,
}

impl BooksTx for StagedBooks<'_> {
    fn account(&self, id: AccountId) -> Option<Account> {
        self.staged.accounts.lookup(&self.committed.accounts, &id)
    }

    fn accounts(&self) -> Vec<Account> {
        self.staged.accounts.merged(&self.committed.accounts).cloned().collect()
    }

    fn put_account(&mut self, account: Account) {
        self.staged.accounts.put(account);
    }

    fn voucher(&self, id: VoucherId) -> Option<Voucher> {
        self.staged.vouchers.lookup(&self.committed.vouchers, &id)
    }

    fn vouchers(&self) -> Vec<Voucher> {
        self.staged.vouchers.merged(&self.committed.vouchers).cloned().collect()
    }

    fn put_voucher(&mut self, voucher: Voucher) {
        self.staged.vouchers.put(voucher);
    }

    fn stock_item(&self, id: StockItemId) -> Option<StockItem> {
        self.staged.items.lookup(&self.committed.items, &id)
    }

    fn stock_items(&self) -> Vec<StockItem> {
        self.staged.items.merged(&self.committed.items).cloned().collect()
    }

    fn put_stock_item(&mut self, item: StockItem) {
        self.staged.items.put(item);
    }

    fn movements(&self) -> Vec<StockMovement> {
        let mut rows: Vec<StockMovement> = self
            .staged
            .movements
            .merged(&self.committed.movements)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.position);
        rows
    }

    fn append_movement(&mut self, movement: StockMovement) {
        self.staged.movements.put(movement);
    }

    fn batch(&self, id: BatchId) -> Option<StockBatch> {
        self.staged.batches.lookup(&self.committed.batches, &id)
    }

    fn open_batches(&self, item_id: StockItemId) -> Vec<StockBatch> {
        let mut rows: Vec<StockBatch> = self
            .staged
            .batches
            .merged(&self.committed.batches)
            .filter(|b| b.item_id() == item_id && !b.is_consumed())
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.position());
        rows
    }

    fn put_batch(&mut self, batch: StockBatch) {
        self.staged.batches.put(batch);
    }

    fn godown_stock(&self, location_id: LocationId, item_id: StockItemId) -> Option<GodownStock> {
        self.staged
            .godowns
            .lookup(&self.committed.godowns, &(location_id, item_id))
    }

    fn godown_stocks(&self) -> Vec<GodownStock> {
        self.staged.godowns.merged(&self.committed.godowns).cloned().collect()
    }

    fn put_godown_stock(&mut self, stock: GodownStock) {
        self.staged.godowns.put(stock);
    }

    fn recipe(&self, menu_item_id: MenuItemId) -> Option<Recipe> {
        self.staged.recipes.lookup(&self.committed.recipes, &menu_item_id)
    }

    fn put_recipe(&mut self, recipe: Recipe) {
        self.staged.recipes.put(recipe);
    }

    fn next_sequence(&mut self, key: SequenceKey) -> u64 {
        let current = self
            .staged
            .sequences
            .get(&key)
            .or_else(|| self.committed.sequences.get(&key))
            .copied()
            .unwrap_or(0);
        let next = current + 1;
        self.staged.sequences.insert(key, next);
        next
    }
}

/// In-memory books, partitioned by tenant.
///
/// Intended for tests/dev. Each tenant has its own mutex, so transactions of
/// one tenant run one at a time while tenants never block each other. Work
/// writes into a private overlay that is merged into the partition only on
/// success, so the committed rows never hold a half-applied transaction.
#[derive(Debug, Default)]
pub struct InMemoryBooksStore {
    tenants: RwLock<HashMap<TenantId, Arc<Mutex<TenantBooks>>>>,
}

impl InMemoryBooksStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, tenant_id: TenantId) -> Result<Arc<Mutex<TenantBooks>>, StoreError> {
        {
            let tenants = self
                .tenants
                .read()
                .map_err(|_| StoreError::Poisoned("tenant registry".to_string()))?;
            if let Some(books) = tenants.get(&tenant_id) {
                return Ok(books.clone());
            }
        }

        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| StoreError::Poisoned("tenant registry".to_string()))?;
        Ok(tenants.entry(tenant_id).or_default().clone())
    }
}

impl BooksStore for InMemoryBooksStore {
    fn transaction<T, F>(&self, tenant_id: TenantId, work: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut dyn BooksTx) -> Result<T, EngineError>,
    {
        let partition = self.partition(tenant_id)?;
        // A panic in `work` only drops the overlay, so a poisoned partition
        // still holds committed books.
        let mut books = partition.lock().unwrap_or_else(PoisonError::into_inner);

        let mut tx = StagedBooks {
            committed: &*books,
            staged: TenantBooks::default(),
        };
        let out = work(&mut tx)?;
        let StagedBooks { staged, .. } = tx;
        books.absorb(staged);
        Ok(out)
    }
}
