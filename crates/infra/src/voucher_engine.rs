//! Voucher Engine: double-entry vouchers over a tenant's chart of accounts.
//!
//! ## Execution
//!
//! Every mutating call runs one store transaction:
//!
//! ```text
//! load voucher/accounts (tenant partition)
//!   ↓
//! decide + evolve the Voucher aggregate (pure)
//!   ↓
//! fold balance effects onto the referenced accounts
//!   ↓
//! commit, then publish the voucher events
//! ```
//!
//! Any error before commit discards every staged write, including the
//! sequence number drawn for a new voucher.

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument};

use hearth_accounting::{
    Account, AccountId, AccountStatement, CancelVoucher, CreateVoucher, DateRange, DayBook,
    LedgerEntry, LedgerEntryDraft, LedgerEntryId, NewAccount, PlannedEntry, PostVoucher, Voucher,
    VoucherCommand, VoucherEvent, VoucherId, VoucherType, account_statement, day_book,
    validate_double_entry,
};
use hearth_core::{AggregateRoot, DocumentNumber, DomainError, Entity, TenantId, UserId};
use hearth_events::{EventBus, EventEnvelope, execute};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::publish::EventPublisher;
use crate::store::{BooksStore, BooksTx, SequenceKey};

/// Aggregate type recorded on voucher event envelopes.
pub const VOUCHER_AGGREGATE: &str = "accounting.voucher";

/// Caller input for `create_voucher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVoucher {
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    pub narration: String,
    pub party: Option<String>,
    pub entries: Vec<LedgerEntryDraft>,
    /// Post in the same transaction instead of leaving a DRAFT.
    pub auto_post: bool,
    pub created_by: UserId,
}

#[derive(Debug)]
pub struct VoucherEngine<S, B> {
    store: S,
    publisher: EventPublisher<B>,
    config: EngineConfig,
}

impl<S, B> VoucherEngine<S, B>
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

    /// Register an account in the tenant's chart (current balance starts at
    /// the opening balance).
    #[instrument(skip(self, new), fields(%tenant_id, code = %new.code))]
    pub fn open_account(&self, tenant_id: TenantId, new: NewAccount) -> EngineResult<Account> {
        self.store.transaction(tenant_id, |tx| {
            if tx.accounts().iter().any(|a| a.code() == new.code) {
                return Err(DomainError::conflict(format!("account code {} already exists", new.code)).into());
            }
            let account = Account::open(AccountId::new(), new)?;
            tx.put_account(account.clone());
            Ok(account)
        })
    }

    pub fn account(&self, tenant_id: TenantId, account_id: AccountId) -> EngineResult<Account> {
        self.store
            .transaction(tenant_id, |tx| load_account(tx, account_id))
    }

    pub fn voucher(&self, tenant_id: TenantId, voucher_id: VoucherId) -> EngineResult<Voucher> {
        self.store
            .transaction(tenant_id, |tx| load_voucher(tx, voucher_id))
    }

    /// Create a voucher in DRAFT, or POSTED when `auto_post` is set.
    ///
    /// Every leg must reference an existing account of the tenant that accepts
    /// direct postings. The number is drawn from the `(type, fiscal year)`
    /// series of the voucher date.
    #[instrument(
        skip(self, input),
        fields(%tenant_id, voucher_type = ?input.voucher_type, date = %input.date, auto_post = input.auto_post)
    )]
    pub fn create_voucher(&self, tenant_id: TenantId, input: NewVoucher) -> EngineResult<Voucher> {
        let occurred_at = Utc::now();

        let (voucher, events) = self.store.transaction(tenant_id, |tx| {
            validate_double_entry(&input.entries)?;
            for draft in &input.entries {
                load_account(tx, draft.account_id)?.ensure_postable()?;
            }

            let fiscal_year = self.config.fiscal_year(input.date);
            let sequence = tx.next_sequence(SequenceKey::Voucher {
                voucher_type: input.voucher_type,
                fiscal_year,
            });
            let number = DocumentNumber::new(input.voucher_type.prefix(), fiscal_year, sequence)?;

            let mut entries = Vec::with_capacity(input.entries.len());
            for draft in &input.entries {
                entries.push(PlannedEntry {
                    entry_id: LedgerEntryId::new(),
                    position: tx.next_sequence(SequenceKey::Position),
                    draft: draft.clone(),
                });
            }

            let voucher_id = VoucherId::new();
            let mut voucher = Voucher::empty(voucher_id);
            let command = VoucherCommand::Create(CreateVoucher {
                tenant_id,
                voucher_id,
                number,
                voucher_type: input.voucher_type,
                date: input.date,
                narration: input.narration.clone(),
                party: input.party.clone(),
                entries,
                auto_post: input.auto_post,
                created_by: input.created_by,
                occurred_at,
            });
            let events = execute(&mut voucher, &command)?;
            apply_balance_effects(tx, &voucher, &events)?;
            tx.put_voucher(voucher.clone());
            Ok((voucher, events))
        })?;

        info!(
            number = %voucher.number_string(),
            status = ?voucher.status(),
            total = %voucher.total_amount(),
            "voucher created"
        );
        self.publish(&voucher, &events);
        Ok(voucher)
    }

    /// DRAFT → POSTED, applying every leg to its account.
    #[instrument(skip(self), fields(%tenant_id, %voucher_id))]
    pub fn post_voucher(
        &self,
        tenant_id: TenantId,
        voucher_id: VoucherId,
        posted_by: UserId,
    ) -> EngineResult<Voucher> {
        let command = VoucherCommand::Post(PostVoucher {
            tenant_id,
            voucher_id,
            posted_by,
            occurred_at: Utc::now(),
        });
        let voucher = self.transition(tenant_id, voucher_id, command)?;
        info!(number = %voucher.number_string(), "voucher posted");
        Ok(voucher)
    }

    /// DRAFT or POSTED → CANCELLED. Balances are reversed only if the voucher
    /// was posted; its entries are kept.
    #[instrument(skip(self, reason), fields(%tenant_id, %voucher_id))]
    pub fn cancel_voucher(
        &self,
        tenant_id: TenantId,
        voucher_id: VoucherId,
        reason: impl Into<String>,
        cancelled_by: UserId,
    ) -> EngineResult<Voucher> {
        let command = VoucherCommand::Cancel(CancelVoucher {
            tenant_id,
            voucher_id,
            reason: reason.into(),
            cancelled_by,
            occurred_at: Utc::now(),
        });
        let voucher = self.transition(tenant_id, voucher_id, command)?;
        info!(number = %voucher.number_string(), "voucher cancelled");
        Ok(voucher)
    }

    /// Posted ledger of one account with running balances.
    ///
    /// `offset`/`limit` page the lines; totals and the closing balance always
    /// cover the whole window.
    #[instrument(skip(self, range), fields(%tenant_id, %account_id))]
    pub fn account_ledger(
        &self,
        tenant_id: TenantId,
        account_id: AccountId,
        range: DateRange,
        offset: Option<usize>,
        limit: Option<usize>,
    ) -> EngineResult<AccountStatement> {
        let page = self.config.page(offset, limit);
        self.store.transaction(tenant_id, |tx| {
            let account = load_account(tx, account_id)?;
            let entries: Vec<LedgerEntry> = tx
                .vouchers()
                .iter()
                .flat_map(|v| v.entries().iter().filter(|e| e.account_id == account_id).cloned())
                .collect();
            debug!(entries = entries.len(), "folding account ledger");
            Ok(account_statement(&account, entries, &range, Some(page))?)
        })
    }

    pub fn day_book(&self, tenant_id: TenantId, date: NaiveDate) -> EngineResult<DayBook> {
        self.store
            .transaction(tenant_id, |tx| Ok(day_book(date, tx.vouchers())?))
    }

    fn transition(
        &self,
        tenant_id: TenantId,
        voucher_id: VoucherId,
        command: VoucherCommand,
    ) -> EngineResult<Voucher> {
        let (voucher, events) = self.store.transaction(tenant_id, |tx| {
            let mut voucher = load_voucher(tx, voucher_id)?;
            let events = execute(&mut voucher, &command)?;
            apply_balance_effects(tx, &voucher, &events)?;
            tx.put_voucher(voucher.clone());
            Ok((voucher, events))
        })?;

        self.publish(&voucher, &events);
        Ok(voucher)
    }

    fn publish(&self, voucher: &Voucher, events: &[VoucherEvent]) {
        self.publisher.publish_stream(
            voucher.id().into(),
            VOUCHER_AGGREGATE,
            voucher.version(),
            events,
        );
    }
}

fn load_account(tx: &dyn BooksTx, account_id: AccountId) -> EngineResult<Account> {
    tx.account(account_id)
        .ok_or_else(|| EngineError::NotFound(format!("account {account_id}")))
}

fn load_voucher(tx: &dyn BooksTx, voucher_id: VoucherId) -> EngineResult<Voucher> {
    tx.voucher(voucher_id)
        .ok_or_else(|| EngineError::NotFound(format!("voucher {voucher_id}")))
}

/// Fold the balance effect of each event onto the accounts the voucher's
/// entries reference.
fn apply_balance_effects(
    tx: &mut dyn BooksTx,
    voucher: &Voucher,
    events: &[VoucherEvent],
) -> EngineResult<()> {
    for effect in events.iter().filter_map(VoucherEvent::balance_effect) {
        for entry in voucher.entries() {
            let mut account = load_account(tx, entry.account_id)?;
            account.apply_entry(&entry.amount, effect)?;
            tx.put_account(account);
        }
    }
    Ok(())
}
