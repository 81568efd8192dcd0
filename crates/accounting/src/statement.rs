//! Derived views over the ledger: per-account statement and day book.
//!
//! Nothing here is stored. Running balances are recomputed per query by folding
//! posted entries in `(date, position)` order, whatever order storage returned.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{BalanceRule, DomainError, DomainResult, Effect, Entity, running_balances, settle};

use crate::account::{Account, AccountId};
use crate::entry::{EntryAmount, LedgerEntry, LedgerEntryId};
use crate::voucher::{Voucher, VoucherId, VoucherStatus, VoucherType};

/// Inclusive date window; open on either side when a bound is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }

    fn is_before(&self, date: NaiveDate) -> bool {
        self.from.is_some_and(|from| date < from)
    }
}

/// Offset/limit window over an already-ordered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// One ledger line with the balance after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub entry_id: LedgerEntryId,
    pub voucher_id: VoucherId,
    pub voucher_number: String,
    pub date: NaiveDate,
    pub debit: Decimal,
    pub credit: Decimal,
    pub cost_center: Option<String>,
    pub running_balance: Decimal,
}

/// Account ledger for a date window.
///
/// `opening_balance` is the balance at the start of the window (the account's
/// opening balance plus every posted entry dated before it), so the running
/// balances of a window agree with those of the full ledger. Totals cover the
/// whole window, not just the returned page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatement {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub opening_balance: Decimal,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub closing_balance: Decimal,
    /// Number of lines in the window before pagination.
    pub line_count: usize,
    pub lines: Vec<StatementLine>,
}

fn checked_total(mut values: impl Iterator<Item = Decimal>, what: &str) -> DomainResult<Decimal> {
    values.try_fold(Decimal::ZERO, |total, v| {
        total.checked_add(v).ok_or_else(|| DomainError::overflow(what))
    })
}

/// Fold an account's entries into a statement.
///
/// Entries of other accounts and unposted entries are ignored.
pub fn account_statement(
    account: &Account,
    entries: impl IntoIterator<Item = LedgerEntry>,
    range: &DateRange,
    page: Option<Page>,
) -> DomainResult<AccountStatement> {
    let account_id = account.id();
    let rule = account.normal_balance();

    let mut posted: Vec<LedgerEntry> = entries
        .into_iter()
        .filter(|e| e.posted && e.account_id == account_id)
        .collect();
    posted.sort_by_key(|e| (e.date, e.position));

    let opening_balance = posted
        .iter()
        .filter(|e| range.is_before(e.date))
        .try_fold(account.opening_balance(), |bal, e| {
            settle(bal, rule.delta(&e.amount), Effect::Apply)
        })?;

    let window: Vec<LedgerEntry> = posted.into_iter().filter(|e| range.contains(e.date)).collect();
    let amounts: Vec<EntryAmount> = window.iter().map(|e| e.amount).collect();
    let balances = running_balances(&rule, opening_balance, amounts.iter())?;

    let total_debit = checked_total(amounts.iter().map(EntryAmount::debit), "total debit")?;
    let total_credit = checked_total(amounts.iter().map(EntryAmount::credit), "total credit")?;
    let closing_balance = balances.last().copied().unwrap_or(opening_balance);

    let lines: Vec<StatementLine> = window
        .into_iter()
        .zip(balances)
        .map(|(e, running_balance)| StatementLine {
            entry_id: e.id,
            voucher_id: e.voucher_id,
            voucher_number: e.voucher_number.to_string(),
            date: e.date,
            debit: e.amount.debit(),
            credit: e.amount.credit(),
            cost_center: e.cost_center,
            running_balance,
        })
        .collect();
    let line_count = lines.len();

    Ok(AccountStatement {
        account_id,
        account_code: account.code().to_string(),
        account_name: account.name().to_string(),
        opening_balance,
        total_debit,
        total_credit,
        closing_balance,
        line_count,
        lines: match page {
            Some(p) => p.slice(lines),
            None => lines,
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBookRow {
    pub voucher_id: VoucherId,
    pub number: String,
    pub status: VoucherStatus,
    pub narration: String,
    pub party: Option<String>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DayBookGroup {
    pub vouchers: Vec<DayBookRow>,
    pub total: Decimal,
}

/// All live (DRAFT + POSTED) vouchers of one day, grouped by type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBook {
    pub date: NaiveDate,
    pub groups: BTreeMap<VoucherType, DayBookGroup>,
    pub voucher_count: usize,
    pub grand_total: Decimal,
}

///
/// Rows within a group follow the type's number series.
pub fn day_book(date: NaiveDate, vouchers: impl IntoIterator<Item = Voucher>) -> DomainResult<DayBook> {
    let mut live: Vec<Voucher> = vouchers
        .into_iter()
        .filter(|v| v.date() == date && v.status() != VoucherStatus::Cancelled)
        .collect();
    live.sort_by_key(|v| (v.voucher_type(), v.number().map(|n| n.sequence())));

    let mut groups: BTreeMap<VoucherType, DayBookGroup> = BTreeMap::new();
    let mut grand_total = Decimal::ZERO;
    let overflow = || DomainError::overflow(format!("day book total for {date}"));

    for v in &live {
        let group = groups.entry(v.voucher_type()).or_default();
        group.total = group.total.checked_add(v.total_amount()).ok_or_else(overflow)?;
        group.vouchers.push(DayBookRow {
            voucher_id: v.id(),
            number: v.number_string(),
            status: v.status(),
            narration: v.narration().to_string(),
            party: v.party().map(str::to_string),
            total_amount: v.total_amount(),
        });
        grand_total = grand_total.checked_add(v.total_amount()).ok_or_else(overflow)?;
    }

    Ok(DayBook {
        date,
        groups,
        voucher_count: live.len(),
        grand_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountGroup, NewAccount};
    use hearth_core::{DocumentNumber, FiscalYear};
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    fn cash() -> Account {
        Account::open(
            AccountId::new(),
            NewAccount {
                code: "1000".to_string(),
                name: "Cash".to_string(),
                group: AccountGroup::Assets,
                allows_posting: true,
                opening_balance: dec!(500),
            },
        )
        .unwrap()
    }

    fn entry(account: &Account, date: NaiveDate, position: u64, amount: EntryAmount) -> LedgerEntry {
        LedgerEntry {
            id: LedgerEntryId::new(),
            voucher_id: VoucherId::new(),
            voucher_number: DocumentNumber::new("JRN", FiscalYear::new(2026), position).unwrap(),
            account_id: account.id(),
            date,
            amount,
            cost_center: None,
            posted: true,
            position,
        }
    }

    #[test]
    fn running_balance_follows_date_then_position_not_arrival() {
        let a = cash();
        // Arrival order differs from (date, position) order.
        let entries = vec![
            entry(&a, d(3), 3, EntryAmount::Credit(dec!(50))),
            entry(&a, d(1), 2, EntryAmount::Debit(dec!(200))),
            entry(&a, d(1), 1, EntryAmount::Debit(dec!(100))),
        ];

        let s = account_statement(&a, entries, &DateRange::all(), None).unwrap();

        let balances: Vec<_> = s.lines.iter().map(|l| l.running_balance).collect();
        assert_eq!(balances, vec![dec!(600), dec!(800), dec!(750)]);
        assert_eq!(s.total_debit, dec!(300));
        assert_eq!(s.total_credit, dec!(50));
        assert_eq!(s.closing_balance, dec!(750));
    }

    #[test]
    fn unposted_and_foreign_entries_are_ignored() {
        let a = cash();
        let other = cash();
        let mut draft = entry(&a, d(1), 1, EntryAmount::Debit(dec!(999)));
        draft.posted = false;
        let entries = vec![draft, entry(&other, d(1), 2, EntryAmount::Debit(dec!(1)))];

        let s = account_statement(&a, entries, &DateRange::all(), None).unwrap();

        assert!(s.lines.is_empty());
        assert_eq!(s.closing_balance, dec!(500));
    }

    #[test]
    fn window_opening_includes_earlier_entries() {
        let a = cash();
        let entries = vec![
            entry(&a, d(1), 1, EntryAmount::Debit(dec!(100))),
            entry(&a, d(5), 2, EntryAmount::Debit(dec!(10))),
            entry(&a, d(9), 3, EntryAmount::Debit(dec!(1))),
        ];

        let s = account_statement(&a, entries, &DateRange::between(d(2), d(6)), None).unwrap();

        assert_eq!(s.opening_balance, dec!(600));
        assert_eq!(s.lines.len(), 1);
        assert_eq!(s.closing_balance, dec!(610));
    }

    #[test]
    fn pagination_keeps_window_totals() {
        let a = cash();
        let entries: Vec<_> = (1..=5)
            .map(|i| entry(&a, d(1), i, EntryAmount::Debit(dec!(10))))
            .collect();

        let s = account_statement(&a, entries, &DateRange::all(), Some(Page::new(1, 2))).unwrap();

        assert_eq!(s.line_count, 5);
        assert_eq!(s.lines.len(), 2);
        assert_eq!(s.lines[0].running_balance, dec!(520));
        assert_eq!(s.total_debit, dec!(50));
        assert_eq!(s.closing_balance, dec!(550));
    }

    #[test]
    fn statement_totals_past_the_decimal_range_are_rejected() {
        let a = cash();
        let entries = vec![
            entry(&a, d(1), 1, EntryAmount::Credit(Decimal::MAX)),
            entry(&a, d(2), 2, EntryAmount::Credit(Decimal::MAX)),
        ];

        let err = account_statement(&a, entries, &DateRange::all(), None).unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
    }
}
