//! Infrastructure layer: transactional storage, configuration, and the two
//! engines collaborators call into.
//!
//! - [`voucher_engine::VoucherEngine`]: double-entry vouchers and account ledgers.
//! - [`valuation_engine::ValuationEngine`]: stock movements, costing, batches,
//!   transfers, purchase receipts and sale deductions.
//!
//! Both engines run every operation inside one [`store::BooksStore`]
//! transaction scoped to the caller's tenant, and publish events only after
//! commit.

pub mod config;
pub mod error;
pub mod publish;
pub mod store;
pub mod valuation_engine;
pub mod voucher_engine;

mod integration_tests;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, ErrorCategory};
pub use store::{BooksStore, BooksTx, InMemoryBooksStore, SequenceKey, StoreError};
pub use valuation_engine::{
    LineFailure, MovementFilter, MovementPage, PartialOutcome, PurchaseReceipt, ReceiptLine,
    SaleDeduction, StockTransfer, TransferRecord, ValuationEngine,
};
pub use voucher_engine::{NewVoucher, VoucherEngine};
