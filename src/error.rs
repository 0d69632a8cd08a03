//! Error taxonomy for the reorder decision core.
//!
//! Kinds, not names (see spec §7): callers match on variant, not on message
//! text. Per-SKU batch operations catch every variant and fold it into an
//! `OrderExplain` row; workflows that mutate the ledger propagate these to
//! their caller since they touch shared state.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("invalid input for sku {sku}: {reason}")]
    InvalidInput { sku: String, reason: String },

    #[error("invalid ledger for sku {sku}: {reason}")]
    InvalidLedger { sku: String, reason: String },

    #[error("invalid calendar: {reason}")]
    InvalidCalendar { reason: String },

    #[error("forecast failure for sku {sku}: {reason}")]
    ForecastFailure { sku: String, reason: String },

    #[error("idempotency conflict for document {document_id}: already processed")]
    IdempotencyConflict { document_id: String },

    #[error("constraint violation for sku {sku}: {reason}")]
    ConstraintViolation { sku: String, reason: String },

    /// Wraps a `repository::RepoError` so ledger-mutating workflows can
    /// propagate one error type to their caller (spec §7/§8) without the
    /// core depending on the repository's storage-specific error shape.
    #[error("repository error: {reason}")]
    Repository { reason: String },
}

impl CoreError {
    /// Short translatable reason string, independent of variant name.
    pub fn reason(&self) -> String {
        match self {
            CoreError::InvalidInput { reason, .. } => reason.clone(),
            CoreError::InvalidLedger { reason, .. } => reason.clone(),
            CoreError::InvalidCalendar { reason } => reason.clone(),
            CoreError::ForecastFailure { reason, .. } => reason.clone(),
            CoreError::IdempotencyConflict { document_id } => {
                format!("document {document_id} already processed")
            }
            CoreError::ConstraintViolation { reason, .. } => reason.clone(),
            CoreError::Repository { reason } => reason.clone(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Raised when a calendar override predates the planning date, or no future
/// order opportunity exists (calendar exhausted). Kept distinct from
/// `CoreError::InvalidCalendar` construction sites so call sites stay terse.
pub fn calendar_override_before_planning(order_date: NaiveDate, override_date: NaiveDate) -> CoreError {
    CoreError::InvalidCalendar {
        reason: format!(
            "receipt override {override_date} predates planning date {order_date}"
        ),
    }
}

pub fn calendar_exhausted(after: NaiveDate) -> CoreError {
    CoreError::InvalidCalendar {
        reason: format!("no future order opportunity exists after {after}"),
    }
}
