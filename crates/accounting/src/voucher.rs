use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{
    Aggregate, AggregateRoot, DocumentNumber, DomainError, Effect, Entity, TenantId, UserId,
    uuid_newtype,
};
use hearth_events::Event;

use crate::entry::{LedgerEntry, LedgerEntryDraft, LedgerEntryId, validate_double_entry};

uuid_newtype! {
    /// Voucher identifier (tenant-scoped by storage).
    pub struct VoucherId;
}

/// Voucher type; each has its own number series per fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherType {
    Payment,
    Receipt,
    Contra,
    Journal,
    Sales,
    Purchase,
    CreditNote,
    DebitNote,
}

impl VoucherType {
    pub const ALL: [VoucherType; 8] = [
        VoucherType::Payment,
        VoucherType::Receipt,
        VoucherType::Contra,
        VoucherType::Journal,
        VoucherType::Sales,
        VoucherType::Purchase,
        VoucherType::CreditNote,
        VoucherType::DebitNote,
    ];

    /// Number prefix, e.g. `PMT` in `PMT-2026-000001`.
    pub fn prefix(self) -> &'static str {
        match self {
            VoucherType::Payment => "PMT",
            VoucherType::Receipt => "RCT",
            VoucherType::Contra => "CTR",
            VoucherType::Journal => "JRN",
            VoucherType::Sales => "SLS",
            VoucherType::Purchase => "PUR",
            VoucherType::CreditNote => "CN",
            VoucherType::DebitNote => "DN",
        }
    }
}

/// Voucher lifecycle: DRAFT → POSTED → CANCELLED, or DRAFT → CANCELLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    Draft,
    Posted,
    Cancelled,
}

/// Entry leg with its storage-assigned identity and creation position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedEntry {
    pub entry_id: LedgerEntryId,
    pub position: u64,
    pub draft: LedgerEntryDraft,
}

/// Aggregate root: Voucher (double-entry transaction header + its legs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    id: VoucherId,
    tenant_id: Option<TenantId>,
    number: Option<DocumentNumber>,
    voucher_type: VoucherType,
    date: NaiveDate,
    status: VoucherStatus,
    total_amount: Decimal,
    narration: String,
    party: Option<String>,
    entries: Vec<LedgerEntry>,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    posted_by: Option<UserId>,
    posted_at: Option<DateTime<Utc>>,
    cancelled_by: Option<UserId>,
    cancelled_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Voucher {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: VoucherId) -> Self {
        Self {
            id,
            tenant_id: None,
            number: None,
            voucher_type: VoucherType::Journal,
            date: NaiveDate::MIN,
            status: VoucherStatus::Draft,
            total_amount: Decimal::ZERO,
            narration: String::new(),
            party: None,
            entries: Vec::new(),
            created_by: None,
            created_at: None,
            posted_by: None,
            posted_at: None,
            cancelled_by: None,
            cancelled_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn number(&self) -> Option<&DocumentNumber> {
        self.number.as_ref()
    }

    /// Rendered number, or an empty string for a not-yet-created voucher.
    pub fn number_string(&self) -> String {
        self.number.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    pub fn voucher_type(&self) -> VoucherType {
        self.voucher_type
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn status(&self) -> VoucherStatus {
        self.status
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn narration(&self) -> &str {
        &self.narration
    }

    pub fn party(&self) -> Option<&str> {
        self.party.as_deref()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn posted_by(&self) -> Option<UserId> {
        self.posted_by
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.posted_at
    }

    pub fn cancelled_by(&self) -> Option<UserId> {
        self.cancelled_by
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Voucher {
    fn version(&self) -> u64 {
        self.version
    }
}

impl Entity for Voucher {
    type Id = VoucherId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Command: CreateVoucher (optionally posting it in the same step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVoucher {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub number: DocumentNumber,
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    pub narration: String,
    pub party: Option<String>,
    pub entries: Vec<PlannedEntry>,
    pub auto_post: bool,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PostVoucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostVoucher {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub posted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelVoucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelVoucher {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub reason: String,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoucherCommand {
    Create(CreateVoucher),
    Post(PostVoucher),
    Cancel(CancelVoucher),
}

/// Event: VoucherCreated (always in DRAFT; auto-post follows with `VoucherPosted`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherCreated {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub number: DocumentNumber,
    pub voucher_type: VoucherType,
    pub date: NaiveDate,
    pub narration: String,
    pub party: Option<String>,
    pub entries: Vec<LedgerEntry>,
    pub total_amount: Decimal,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VoucherPosted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherPosted {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub posted_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VoucherCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherCancelled {
    pub tenant_id: TenantId,
    pub voucher_id: VoucherId,
    pub reason: String,
    /// True when the voucher had been posted, i.e. balances must be reversed.
    pub was_posted: bool,
    pub cancelled_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoucherEvent {
    Created(VoucherCreated),
    Posted(VoucherPosted),
    Cancelled(VoucherCancelled),
}

impl VoucherEvent {
    /// How this event moves account balances, if at all.
    pub fn balance_effect(&self) -> Option<Effect> {
        match self {
            VoucherEvent::Created(_) => None,
            VoucherEvent::Posted(_) => Some(Effect::Apply),
            VoucherEvent::Cancelled(e) if e.was_posted => Some(Effect::Reverse),
            VoucherEvent::Cancelled(_) => None,
        }
    }
}

impl Event for VoucherEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VoucherEvent::Created(_) => "accounting.voucher.created",
            VoucherEvent::Posted(_) => "accounting.voucher.posted",
            VoucherEvent::Cancelled(_) => "accounting.voucher.cancelled",
        }
    }

    fn tenant_id(&self) -> TenantId {
        match self {
            VoucherEvent::Created(e) => e.tenant_id,
            VoucherEvent::Posted(e) => e.tenant_id,
            VoucherEvent::Cancelled(e) => e.tenant_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VoucherEvent::Created(e) => e.occurred_at,
            VoucherEvent::Posted(e) => e.occurred_at,
            VoucherEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Voucher {
    type Command = VoucherCommand;
    type Event = VoucherEvent;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VoucherEvent::Created(e) => {
                self.id = e.voucher_id;
                self.tenant_id = Some(e.tenant_id);
                self.number = Some(e.number.clone());
                self.voucher_type = e.voucher_type;
                self.date = e.date;
                self.status = VoucherStatus::Draft;
                self.total_amount = e.total_amount;
                self.narration = e.narration.clone();
                self.party = e.party.clone();
                self.entries = e.entries.clone();
                self.created_by = Some(e.created_by);
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            VoucherEvent::Posted(e) => {
                self.status = VoucherStatus::Posted;
                self.posted_by = Some(e.posted_by);
                self.posted_at = Some(e.occurred_at);
                for entry in &mut self.entries {
                    entry.posted = true;
                }
            }
            VoucherEvent::Cancelled(e) => {
                self.status = VoucherStatus::Cancelled;
                self.cancelled_by = Some(e.cancelled_by);
                self.cancelled_at = Some(e.occurred_at);
                self.narration = if self.narration.is_empty() {
                    format!("Cancelled: {}", e.reason)
                } else {
                    format!("{} | Cancelled: {}", self.narration, e.reason)
                };
                for entry in &mut self.entries {
                    entry.posted = false;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, DomainError> {
        match command {
            VoucherCommand::Create(cmd) => self.handle_create(cmd),
            VoucherCommand::Post(cmd) => self.handle_post(cmd),
            VoucherCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Voucher {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::tenant_isolation("voucher belongs to another tenant"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("voucher {}", self.id)));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateVoucher) -> Result<Vec<VoucherEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict(format!("voucher {} already exists", self.id)));
        }
        if cmd.number.prefix() != cmd.voucher_type.prefix() {
            return Err(DomainError::validation(format!(
                "number {} does not belong to {:?} series",
                cmd.number, cmd.voucher_type
            )));
        }

        let drafts: Vec<LedgerEntryDraft> = cmd.entries.iter().map(|e| e.draft.clone()).collect();
        let totals = validate_double_entry(&drafts)?;

        let entries = cmd
            .entries
            .iter()
            .map(|planned| {
                Ok(LedgerEntry {
                    id: planned.entry_id,
                    voucher_id: cmd.voucher_id,
                    voucher_number: cmd.number.clone(),
                    account_id: planned.draft.account_id,
                    date: cmd.date,
                    amount: planned.draft.amount()?,
                    cost_center: planned.draft.cost_center.clone(),
                    posted: false,
                    position: planned.position,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        let mut events = vec![VoucherEvent::Created(VoucherCreated {
            tenant_id: cmd.tenant_id,
            voucher_id: cmd.voucher_id,
            number: cmd.number.clone(),
            voucher_type: cmd.voucher_type,
            date: cmd.date,
            narration: cmd.narration.clone(),
            party: cmd.party.clone(),
            entries,
            total_amount: totals.total_debit,
            created_by: cmd.created_by,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.auto_post {
            events.push(VoucherEvent::Posted(VoucherPosted {
                tenant_id: cmd.tenant_id,
                voucher_id: cmd.voucher_id,
                posted_by: cmd.created_by,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_post(&self, cmd: &PostVoucher) -> Result<Vec<VoucherEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;

        match self.status {
            VoucherStatus::Draft => {}
            VoucherStatus::Posted => {
                return Err(DomainError::conflict(format!(
                    "voucher {} is already posted",
                    self.number_string()
                )));
            }
            VoucherStatus::Cancelled => {
                return Err(DomainError::conflict(format!(
                    "voucher {} is cancelled and cannot be posted",
                    self.number_string()
                )));
            }
        }

        Ok(vec![VoucherEvent::Posted(VoucherPosted {
            tenant_id: cmd.tenant_id,
            voucher_id: self.id,
            posted_by: cmd.posted_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelVoucher) -> Result<Vec<VoucherEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_tenant(cmd.tenant_id)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason cannot be empty"));
        }
        if self.status == VoucherStatus::Cancelled {
            return Err(DomainError::conflict(format!(
                "voucher {} is already cancelled",
                self.number_string()
            )));
        }

        Ok(vec![VoucherEvent::Cancelled(VoucherCancelled {
            tenant_id: cmd.tenant_id,
            voucher_id: self.id,
            reason: cmd.reason.trim().to_string(),
            was_posted: self.status == VoucherStatus::Posted,
            cancelled_by: cmd.cancelled_by,
            occurred_at: cmd.occurred_at,
        })])
    }
}
