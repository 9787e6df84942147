//! The error taxonomy every engine operation reports in.

use serde::Serialize;
use thiserror::Error;

use bazaar_auth::AuthzError;
use bazaar_core::DomainError;
use bazaar_inventory::{InsufficientStock, LedgerError};
use bazaar_orders::{InvalidTransition, OrderError};

use crate::store::StoreError;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ServiceError {
    /// The order does not exist, or the actor may not see it. The two are
    /// never distinguished.
    #[error("order not found")]
    NotFoundOrUnauthorized,

    #[error(transparent)]
    InvalidTransition(InvalidTransition),

    /// Every short variant, not just the first.
    #[error("insufficient stock for {} variant(s)", .0.len())]
    InsufficientStock(Vec<InsufficientStock>),

    #[error("validation failed: {0}")]
    ValidationFailure(String),

    /// A lock could not be taken in time. Nothing was written; retry.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("internal error: {0}")]
    Fatal(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailure(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::ConcurrencyConflict(_))
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ServiceError::ValidationFailure(msg),
            DomainError::NotFound | DomainError::Unauthorized => ServiceError::NotFoundOrUnauthorized,
            DomainError::InvariantViolation(msg) => ServiceError::Fatal(msg),
        }
    }
}

impl From<OrderError> for ServiceError {
    fn from(value: OrderError) -> Self {
        match value {
            OrderError::Transition(t) => ServiceError::InvalidTransition(t),
            OrderError::Domain(d) => d.into(),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(value: InvalidTransition) -> Self {
        ServiceError::InvalidTransition(value)
    }
}

impl From<Vec<InsufficientStock>> for ServiceError {
    fn from(value: Vec<InsufficientStock>) -> Self {
        ServiceError::InsufficientStock(value)
    }
}

impl From<LedgerError> for ServiceError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NegativeStock {
                variant_id,
                current,
                delta,
            } => ServiceError::InsufficientStock(vec![InsufficientStock {
                variant_id,
                requested: delta.unsigned_abs(),
                available: current,
            }]),
            LedgerError::ZeroDelta | LedgerError::InvalidReason(_) => ServiceError::ValidationFailure(value.to_string()),
            LedgerError::UnknownVariant(_) => ServiceError::Fatal(value.to_string()),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::LockTimeout(what) => ServiceError::ConcurrencyConflict(format!("{what} is busy")),
            StoreError::OrderNotFound(_) => ServiceError::NotFoundOrUnauthorized,
            StoreError::Duplicate(what) => ServiceError::Fatal(format!("duplicate {what}")),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(_) => ServiceError::NotFoundOrUnauthorized,
            AuthzError::MissingVendor => ServiceError::ValidationFailure("vendor_id is required".to_string()),
        }
    }
}
