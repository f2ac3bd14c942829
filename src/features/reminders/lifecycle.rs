//! # Reminder Lifecycle
//!
//! Transition rules over a reminder's status. Checked before any mutation is
//! persisted; the store re-checks the expected status atomically when writing.
//!
//! ```text
//! pending ──deliver──▶ delivered   (one-shot only)
//! pending ──fire─────▶ pending     (recurring only, advances last_fired_at)
//! pending ──cancel───▶ cancelled
//! pending ──complete─▶ completed   (recurring only)
//! ```
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use crate::core::error::{ReminderError, ReminderResult};
use crate::features::reminders::model::{Reminder, ReminderStatus};

/// A requested change to a reminder's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// One-shot reminder handed to the transport
    Deliver,
    /// Recurring reminder handed to the transport; stays pending
    Fire,
    /// Owner stops the reminder
    Cancel,
    /// Owner acknowledges a recurring reminder
    Complete,
}

impl Transition {
    /// Status the reminder holds after the transition
    pub fn target(&self) -> ReminderStatus {
        match self {
            Transition::Deliver => ReminderStatus::Delivered,
            Transition::Fire => ReminderStatus::Pending,
            Transition::Cancel => ReminderStatus::Cancelled,
            Transition::Complete => ReminderStatus::Completed,
        }
    }

    /// Transition a due occurrence of this reminder takes
    pub fn for_firing(reminder: &Reminder) -> Self {
        if reminder.is_recurring() {
            Transition::Fire
        } else {
            Transition::Deliver
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Deliver => write!(f, "deliver"),
            Transition::Fire => write!(f, "fire"),
            Transition::Cancel => write!(f, "cancel"),
            Transition::Complete => write!(f, "complete"),
        }
    }
}

/// Validate `transition` against the reminder's current state and return the
/// status it leads to.
///
/// Every transition starts from `pending`; anything else is a `Conflict` that
/// the caller must surface rather than retry.
pub fn check(reminder: &Reminder, transition: Transition) -> ReminderResult<ReminderStatus> {
    if reminder.status != ReminderStatus::Pending {
        return Err(ReminderError::Conflict {
            id: reminder.id,
            expected: ReminderStatus::Pending,
            actual: reminder.status,
        });
    }

    match (transition, reminder.is_recurring()) {
        (Transition::Deliver, true) => Err(ReminderError::validation(
            "recurrence_interval",
            "recurring reminders are never marked delivered",
        )),
        (Transition::Fire, false) => Err(ReminderError::validation(
            "recurrence_interval",
            "only recurring reminders fire repeatedly",
        )),
        (Transition::Complete, false) => Err(ReminderError::validation(
            "recurrence_interval",
            "only recurring reminders can be completed",
        )),
        _ => Ok(transition.target()),
    }
}
