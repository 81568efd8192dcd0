//! `hearth-core`: shared building blocks for the ledger and stock engines.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod balance;
pub mod entity;
pub mod error;
pub mod fiscal;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use balance::{BalanceRule, Effect, running_balances, settle};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use fiscal::{DocumentNumber, FiscalYear};
pub use id::{AggregateId, TenantId, UserId};
