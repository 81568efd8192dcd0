//! Running balances derived from append-only logs.
//!
//! Both engines keep an append-only log (ledger entries, stock movements) next
//! to a denormalized balance on the master record. The same three operations
//! apply to both: translate one log line into a signed delta, fold deltas onto
//! a balance, and undo a line by folding its negated delta. Only the sign rule
//! differs, so it is the one thing each engine supplies.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Sign convention translating one log line into a signed balance delta.
pub trait BalanceRule {
    type Line: ?Sized;

    fn delta(&self, line: &Self::Line) -> Decimal;
}

/// Whether a line's effect is being applied or undone.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Effect {
    Apply,
    Reverse,
}

impl Effect {
    /// Orient a delta for this effect.
    pub fn signed(self, delta: Decimal) -> Decimal {
        match self {
            Effect::Apply => delta,
            Effect::Reverse => -delta,
        }
    }
}

/// Fold one delta onto a balance.
///
/// Fails with a validation error when the result leaves the decimal range.
pub fn settle(balance: Decimal, delta: Decimal, effect: Effect) -> DomainResult<Decimal> {
    balance
        .checked_add(effect.signed(delta))
        .ok_or_else(|| DomainError::overflow("balance"))
}

/// Fold lines onto `opening` in iteration order, returning the balance after
/// each line.
///
/// Callers own the ordering: the fold never reorders its input.
pub fn running_balances<'a, R, I>(rule: &R, opening: Decimal, lines: I) -> DomainResult<Vec<Decimal>>
where
    R: BalanceRule,
    R::Line: 'a,
    I: IntoIterator<Item = &'a R::Line>,
{
    let mut balance = opening;
    lines
        .into_iter()
        .map(|line| {
            balance = settle(balance, rule.delta(line), Effect::Apply)?;
            Ok(balance)
        })
        .collect()
}
