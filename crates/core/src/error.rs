//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// state conflicts, insufficient stock). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation (malformed entry set, unbalanced voucher,
    /// non-postable account, non-positive quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist in the caller's tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested transition is not allowed from the current state
    /// (e.g. posting a cancelled voucher).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation would drive a stock balance below zero.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// A record was addressed through a tenant that does not own it.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    /// An identifier or document number was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        Self::InsufficientStock(msg.into())
    }

    pub fn tenant_isolation(msg: impl Into<String>) -> Self {
        Self::TenantIsolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Arithmetic on `what` left the representable decimal range.
    pub fn overflow(what: impl std::fmt::Display) -> Self {
        Self::Validation(format!("{what} is out of range"))
    }
}
