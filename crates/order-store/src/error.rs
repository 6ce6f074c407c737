use common::{OrderId, OrderStatus};
use thiserror::Error;

/// Kind of integrity constraint rejected by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    Check,
    ForeignKey,
    NotNull,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::Check => "check",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::NotNull => "not null",
        };
        f.write_str(name)
    }
}

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order row matched the given id.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// A write was rejected by an integrity constraint.
    #[error("{operation}: {kind} constraint violated ({})", .constraint.as_deref().unwrap_or("unnamed"))]
    ConstraintViolation {
        operation: &'static str,
        kind: ConstraintKind,
        constraint: Option<String>,
    },

    /// A conditional status update found a different status than expected.
    #[error("Status conflict for order {order_id}: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// A stored row could not be mapped back to the model.
    #[error("{operation}: invalid stored value: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// A database error occurred.
    #[error("{operation}: database error: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns a mapper that wraps a sqlx error with the failing operation,
    /// classifying integrity violations separately from generic I/O errors.
    pub fn database(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError + Copy {
        move |source| {
            if let sqlx::Error::Database(ref db_err) = source {
                let kind = if db_err.is_unique_violation() {
                    Some(ConstraintKind::Unique)
                } else if db_err.is_check_violation() {
                    Some(ConstraintKind::Check)
                } else if db_err.is_foreign_key_violation() {
                    Some(ConstraintKind::ForeignKey)
                } else if matches!(db_err.kind(), sqlx::error::ErrorKind::NotNullViolation) {
                    Some(ConstraintKind::NotNull)
                } else {
                    None
                };

                if let Some(kind) = kind {
                    return StoreError::ConstraintViolation {
                        operation,
                        kind,
                        constraint: db_err.constraint().map(str::to_string),
                    };
                }
            }
            StoreError::Database { operation, source }
        }
    }

    /// Returns true when an insert collided with an existing primary or
    /// unique key.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(
            self,
            StoreError::ConstraintViolation {
                kind: ConstraintKind::Unique,
                ..
            }
        )
    }

    /// Short label used for metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::ConstraintViolation { .. } => "constraint",
            StoreError::StatusConflict { .. } => "status_conflict",
            StoreError::Decode { .. } => "decode",
            StoreError::Database { .. } => "database",
            StoreError::Migration(_) => "migration",
        }
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
