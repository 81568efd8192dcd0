//! Accounting module (double-entry vouchers over a chart of accounts).
//!
//! Pure domain logic only: no IO, no persistence concerns. The infrastructure
//! layer loads accounts and vouchers, runs the rules defined here inside a
//! transaction, and stores the result.

pub mod account;
pub mod entry;
pub mod statement;
pub mod voucher;

pub use account::{Account, AccountGroup, AccountId, NewAccount, NormalBalance};
pub use entry::{
    BALANCE_TOLERANCE, EntryAmount, EntryTotals, LedgerEntry, LedgerEntryDraft, LedgerEntryId,
    validate_double_entry,
};
pub use statement::{
    AccountStatement, DateRange, DayBook, DayBookGroup, DayBookRow, Page, StatementLine,
    account_statement, day_book,
};
pub use voucher::{
    CancelVoucher, CreateVoucher, PlannedEntry, PostVoucher, Voucher, VoucherCancelled,
    VoucherCommand, VoucherCreated, VoucherEvent, VoucherId, VoucherPosted, VoucherStatus,
    VoucherType,
};
