use thiserror::Error;

use hearth_core::DomainError;

use crate::store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Error returned by the engines to their collaborators.
///
/// Every variant aborts the enclosing transaction: nothing was written.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input or a precondition on referenced records failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist in the caller's tenant.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested transition is not allowed from the current state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Stock (global or at a location) is insufficient for the movement.
    #[error("insufficient resource: {0}")]
    InsufficientResource(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure classes a caller may branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Structural: the request can never succeed as written.
    Validation,
    /// Structural: the target record is in the wrong state.
    StateConflict,
    /// Data-dependent: may succeed once stock is replenished.
    ResourceInsufficiency,
    /// Storage fault unrelated to the request.
    Infrastructure,
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Validation(_) | EngineError::NotFound(_) | EngineError::TenantIsolation(_) => {
                ErrorCategory::Validation
            }
            EngineError::StateConflict(_) => ErrorCategory::StateConflict,
            EngineError::InsufficientResource(_) => ErrorCategory::ResourceInsufficiency,
            EngineError::Store(_) => ErrorCategory::Infrastructure,
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::NotFound(what) => EngineError::NotFound(what),
            DomainError::Conflict(msg) => EngineError::StateConflict(msg),
            DomainError::InsufficientStock(msg) => EngineError::InsufficientResource(msg),
            DomainError::TenantIsolation(msg) => EngineError::TenantIsolation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_onto_categories() {
        let cases = [
            (DomainError::validation("x"), ErrorCategory::Validation),
            (DomainError::not_found("x"), ErrorCategory::Validation),
            (DomainError::conflict("x"), ErrorCategory::StateConflict),
            (DomainError::insufficient_stock("x"), ErrorCategory::ResourceInsufficiency),
        ];
        for (domain, category) in cases {
            assert_eq!(EngineError::from(domain).category(), category);
        }
    }

    #[test]
    fn store_faults_are_infrastructure() {
        let err = EngineError::from(StoreError::Poisoned("tenant registry".to_string()));
        assert_eq!(err.category(), ErrorCategory::Infrastructure);
    }
}
