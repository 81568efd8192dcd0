use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use hearth_core::{BalanceRule, DomainError, DomainResult, Effect, Entity, settle, uuid_newtype};

use crate::entry::EntryAmount;

uuid_newtype! {
    /// Chart-of-accounts record identifier (tenant-scoped by storage).
    pub struct AccountId;
}

/// Classification group (determines the normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountGroup {
    Assets,
    Liabilities,
    Income,
    Expenses,
    Equity,
}

impl AccountGroup {
    pub fn normal_balance(self) -> NormalBalance {
        match self {
            AccountGroup::Assets | AccountGroup::Expenses => NormalBalance::Debit,
            AccountGroup::Liabilities | AccountGroup::Income | AccountGroup::Equity => {
                NormalBalance::Credit
            }
        }
    }
}

/// Side on which an account's balance grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalBalance {
    Debit,
    Credit,
}

/// Balance-change rule: debit-normal accounts move by `debit - credit`,
/// credit-normal accounts by `credit - debit`.
impl BalanceRule for NormalBalance {
    type Line = EntryAmount;

    fn delta(&self, line: &EntryAmount) -> Decimal {
        match (self, line) {
            (NormalBalance::Debit, EntryAmount::Debit(a)) => *a,
            (NormalBalance::Debit, EntryAmount::Credit(a)) => -*a,
            (NormalBalance::Credit, EntryAmount::Credit(a)) => *a,
            (NormalBalance::Credit, EntryAmount::Debit(a)) => -*a,
        }
    }
}

/// Registry input for a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub group: AccountGroup,
    /// Summary/group accounts are registered with `allows_posting = false`.
    pub allows_posting: bool,
    pub opening_balance: Decimal,
}

/// Chart-of-accounts record.
///
/// `current_balance` has no setter: it starts at the opening balance and only
/// moves through [`Account::apply_entry`] when a voucher is posted or a posted
/// voucher is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    code: String,
    name: String,
    group: AccountGroup,
    allows_posting: bool,
    opening_balance: Decimal,
    current_balance: Decimal,
}

impl Account {
    pub fn open(id: AccountId, new: NewAccount) -> DomainResult<Self> {
        if new.code.trim().is_empty() {
            return Err(DomainError::validation("account code cannot be empty"));
        }
        if new.name.trim().is_empty() {
            return Err(DomainError::validation("account name cannot be empty"));
        }
        Ok(Self {
            id,
            code: new.code,
            name: new.name,
            group: new.group,
            allows_posting: new.allows_posting,
            opening_balance: new.opening_balance,
            current_balance: new.opening_balance,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> AccountGroup {
        self.group
    }

    pub fn normal_balance(&self) -> NormalBalance {
        self.group.normal_balance()
    }

    pub fn allows_posting(&self) -> bool {
        self.allows_posting
    }

    pub fn opening_balance(&self) -> Decimal {
        self.opening_balance
    }

    pub fn current_balance(&self) -> Decimal {
        self.current_balance
    }

    /// Reject accounts that do not accept direct postings, naming the account.
    pub fn ensure_postable(&self) -> DomainResult<()> {
        if !self.allows_posting {
            return Err(DomainError::validation(format!(
                "account {} '{}' does not allow direct posting",
                self.code, self.name
            )));
        }
        Ok(())
    }

    /// Apply (or reverse) one ledger entry's effect; returns the new balance.
    ///
    /// The balance is left untouched when the result would leave the decimal
    /// range.
    pub fn apply_entry(&mut self, amount: &EntryAmount, effect: Effect) -> DomainResult<Decimal> {
        let delta = self.normal_balance().delta(amount);
        self.current_balance = settle(self.current_balance, delta, effect)?;
        Ok(self.current_balance)
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
