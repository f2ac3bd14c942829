//! # Reminder Errors
//!
//! Typed failures surfaced by the reminder engine to its callers.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: Conflict carries the observed status
//! - 1.0.0: Initial taxonomy (validation, resolution, lifecycle, delivery, storage)

use thiserror::Error;

use crate::features::reminders::model::{ReminderId, ReminderStatus};

/// Result alias for engine operations
pub type ReminderResult<T> = std::result::Result<T, ReminderError>;

#[derive(Debug, Error)]
pub enum ReminderError {
    /// Rejected at creation; nothing was persisted
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The expression matched none of the recognised grammars
    #[error("could not understand \"{expression}\": {reason}")]
    Unparseable { expression: String, reason: String },

    /// The expression matched rules of equal rank with different results
    #[error("\"{expression}\" is ambiguous: {reason}")]
    Ambiguous { expression: String, reason: String },

    /// A compare-and-set transition lost its race; re-read before acting again
    #[error("reminder #{id} is {actual}, expected {expected}")]
    Conflict {
        id: ReminderId,
        expected: ReminderStatus,
        actual: ReminderStatus,
    },

    /// A recurring firing raced with another writer of `last_fired_at`
    #[error("reminder #{id} was fired concurrently")]
    OccurrenceConflict { id: ReminderId },

    #[error("reminder #{0} not found")]
    NotFound(ReminderId),

    /// The transport reported a failed delivery attempt
    #[error("delivery of reminder #{id} failed: {reason}")]
    DeliveryFailure { id: ReminderId, reason: String },

    /// Every retry for one occurrence failed; the reminder stays pending
    #[error("delivery of reminder #{id} gave up after {attempts} attempts")]
    DeliveryExhausted { id: ReminderId, attempts: u32 },

    #[error("storage error: {0}")]
    Storage(#[from] sqlite::Error),

    #[error("corrupt row for reminder #{id}: {reason}")]
    CorruptRow { id: ReminderId, reason: String },
}

impl ReminderError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        ReminderError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn unparseable(expression: &str, reason: impl Into<String>) -> Self {
        ReminderError::Unparseable {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub fn ambiguous(expression: &str, reason: impl Into<String>) -> Self {
        ReminderError::Ambiguous {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether a compare-and-set race was lost
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ReminderError::Conflict { .. } | ReminderError::OccurrenceConflict { .. }
        )
    }

    /// Whether the caller should ask the user to rephrase
    pub fn needs_clarification(&self) -> bool {
        matches!(
            self,
            ReminderError::Unparseable { .. } | ReminderError::Ambiguous { .. }
        )
    }
}
