//! Domain error types.

use common::{ProductId, TransactionId};
use store::{ConstraintKind, StoreError};
use thiserror::Error;

use crate::checkout::CheckoutError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The checkout could not be carried out.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// The product doesn't exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The transaction doesn't exist or belongs to another user.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Coarse classification of a [`DomainError`], used to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input; nothing was attempted.
    Validation,
    /// A product, address or transaction is absent or not owned by the caller.
    NotFound,
    /// Insufficient stock, a lost stock race, or a uniqueness collision.
    Conflict,
    /// The store failed; the request cannot be completed.
    Persistence,
}

impl ErrorKind {
    /// Returns a stable label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Persistence => "persistence",
        }
    }
}

impl DomainError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Checkout(err) => err.kind(),
            DomainError::ProductNotFound(_) | DomainError::TransactionNotFound(_) => {
                ErrorKind::NotFound
            }
            DomainError::Store(err) => match err {
                StoreError::Constraint { kind, .. } => match kind {
                    ConstraintKind::Unique => ErrorKind::Conflict,
                    ConstraintKind::Check => ErrorKind::Validation,
                    ConstraintKind::ForeignKey => ErrorKind::NotFound,
                    ConstraintKind::Other => ErrorKind::Persistence,
                },
                StoreError::Contention(_) => ErrorKind::Conflict,
                _ => ErrorKind::Persistence,
            },
        }
    }
}
