use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{DocumentNumber, DomainError, DomainResult, uuid_newtype};

use crate::account::AccountId;
use crate::voucher::VoucherId;

uuid_newtype! {
    /// Ledger entry identifier.
    pub struct LedgerEntryId;
}

/// Largest debit/credit difference still treated as rounding, not imbalance.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// One side of a double entry. Exactly one side, always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "side", content = "amount")]
pub enum EntryAmount {
    Debit(Decimal),
    Credit(Decimal),
}

impl EntryAmount {
    pub fn amount(&self) -> Decimal {
        match self {
            EntryAmount::Debit(a) | EntryAmount::Credit(a) => *a,
        }
    }

    pub fn debit(&self) -> Decimal {
        match self {
            EntryAmount::Debit(a) => *a,
            EntryAmount::Credit(_) => Decimal::ZERO,
        }
    }

    pub fn credit(&self) -> Decimal {
        match self {
            EntryAmount::Credit(a) => *a,
            EntryAmount::Debit(_) => Decimal::ZERO,
        }
    }
}

/// Collaborator-supplied entry leg, before validation.
///
/// Mirrors the form a caller fills in: two optional amount columns. A zero in a
/// column counts as "not populated".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntryDraft {
    pub account_id: AccountId,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub cost_center: Option<String>,
}

impl LedgerEntryDraft {
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: Some(amount),
            credit: None,
            cost_center: None,
        }
    }

    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: None,
            credit: Some(amount),
            cost_center: None,
        }
    }

    pub fn with_cost_center(mut self, cost_center: impl Into<String>) -> Self {
        self.cost_center = Some(cost_center.into());
        self
    }

    /// Resolve the two optional columns into exactly one side.
    pub fn amount(&self) -> DomainResult<EntryAmount> {
        let populated = |v: Option<Decimal>| v.filter(|a| !a.is_zero());
        match (populated(self.debit), populated(self.credit)) {
            (Some(_), Some(_)) => Err(DomainError::validation(format!(
                "entry for account {} has both debit and credit",
                self.account_id
            ))),
            (None, None) => Err(DomainError::validation(format!(
                "entry for account {} has neither debit nor credit",
                self.account_id
            ))),
            (Some(d), None) if d.is_sign_positive() => Ok(EntryAmount::Debit(d)),
            (None, Some(c)) if c.is_sign_positive() => Ok(EntryAmount::Credit(c)),
            _ => Err(DomainError::validation(format!(
                "entry for account {} has a negative amount",
                self.account_id
            ))),
        }
    }
}

/// Debit and credit totals of an entry set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryTotals {
    pub total_debit: Decimal,
    pub total_credit: Decimal,
}

impl EntryTotals {
    /// Sum both sides; fails when either total leaves the decimal range.
    pub fn of<'a>(amounts: impl IntoIterator<Item = &'a EntryAmount>) -> DomainResult<Self> {
        amounts.into_iter().try_fold(Self::default(), |acc, a| {
            Ok(Self {
                total_debit: acc
                    .total_debit
                    .checked_add(a.debit())
                    .ok_or_else(|| DomainError::overflow("total debit"))?,
                total_credit: acc
                    .total_credit
                    .checked_add(a.credit())
                    .ok_or_else(|| DomainError::overflow("total credit"))?,
            })
        })
    }

    pub fn difference(&self) -> Decimal {
        (self.total_debit - self.total_credit).abs()
    }

    pub fn is_balanced(&self) -> bool {
        self.difference() < BALANCE_TOLERANCE
    }
}

/// Central correctness gate: no voucher is committed without passing it.
///
/// Rejects an empty set, any entry with both or neither side populated, and
/// totals that differ by `BALANCE_TOLERANCE` or more. The error message carries
/// both totals so the caller can show what is off.
pub fn validate_double_entry(drafts: &[LedgerEntryDraft]) -> DomainResult<EntryTotals> {
    if drafts.is_empty() {
        return Err(DomainError::validation("voucher must have at least one entry"));
    }

    let amounts = drafts
        .iter()
        .map(LedgerEntryDraft::amount)
        .collect::<DomainResult<Vec<_>>>()?;

    let totals = EntryTotals::of(&amounts)?;
    if !totals.is_balanced() {
        return Err(DomainError::validation(format!(
            "debits must equal credits (total debit {}, total credit {}, difference {})",
            totals.total_debit,
            totals.total_credit,
            totals.difference()
        )));
    }

    Ok(totals)
}

/// One committed leg of a voucher (immutable apart from the `posted` mirror).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub voucher_id: VoucherId,
    pub voucher_number: DocumentNumber,
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub amount: EntryAmount,
    pub cost_center: Option<String>,
    /// Mirrors the owning voucher: true while it is POSTED.
    pub posted: bool,
    /// Tenant-wide creation order; breaks ties between entries on the same date.
    pub position: u64,
}
