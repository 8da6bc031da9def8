use sqlx::error::ErrorKind as DbErrorKind;
use thiserror::Error;

/// SQLSTATE raised when the database breaks a lock cycle.
const DEADLOCK_DETECTED: &str = "40P01";

/// SQLSTATE raised when a transaction cannot be serialized.
const SERIALIZATION_FAILURE: &str = "40001";

/// Kind of constraint a write ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// A uniqueness constraint, e.g. the invoice code.
    Unique,
    /// A check constraint on the written values.
    Check,
    /// A reference to a row that doesn't exist.
    ForeignKey,
    /// Anything else, including NOT NULL.
    Other,
}

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write was rejected by a named constraint.
    #[error("Constraint violation: {constraint}")]
    Constraint {
        constraint: String,
        kind: ConstraintKind,
    },

    /// The unit of work lost a race with a concurrent one and was aborted.
    #[error("Concurrent update conflict: {0}")]
    Contention(String),

    /// The storage backend refused the operation.
    #[error("Storage backend failure: {0}")]
    Backend(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// A uniqueness violation on the named constraint.
    pub fn unique(constraint: &str) -> Self {
        Self::constraint(constraint, ConstraintKind::Unique)
    }

    /// A check violation on the named constraint.
    pub fn check(constraint: &str) -> Self {
        Self::constraint(constraint, ConstraintKind::Check)
    }

    /// A dangling reference through the named constraint.
    pub fn foreign_key(constraint: &str) -> Self {
        Self::constraint(constraint, ConstraintKind::ForeignKey)
    }

    fn constraint(constraint: &str, kind: ConstraintKind) -> Self {
        StoreError::Constraint {
            constraint: constraint.to_string(),
            kind,
        }
    }

    /// Maps a write error, surfacing named constraint violations.
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && let Some(constraint) = db_err.constraint()
        {
            let kind = match db_err.kind() {
                DbErrorKind::UniqueViolation => ConstraintKind::Unique,
                DbErrorKind::CheckViolation => ConstraintKind::Check,
                DbErrorKind::ForeignKeyViolation => ConstraintKind::ForeignKey,
                _ => ConstraintKind::Other,
            };
            return Self::constraint(constraint, kind);
        }
        StoreError::from(err)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && matches!(
                db_err.code().as_deref(),
                Some(DEADLOCK_DETECTED | SERIALIZATION_FAILURE)
            )
        {
            return StoreError::Contention(db_err.message().to_string());
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
