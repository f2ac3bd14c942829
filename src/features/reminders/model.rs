//! # Reminder Model
//!
//! The scheduled unit and its status.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Recurring reminders (interval in minutes, last_fired_at)
//! - 1.0.0: Initial one-shot reminder record

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{ReminderError, ReminderResult};

/// Smallest accepted recurrence interval, in minutes
pub const MIN_RECURRENCE_MINUTES: u32 = 1;

/// Largest accepted recurrence interval, in minutes
pub const MAX_RECURRENCE_MINUTES: u32 = 60;

/// Longest payload the engine will store
pub const MAX_PAYLOAD_CHARS: usize = 2000;

/// Opaque reminder identity, assigned by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(pub i64);

impl std::fmt::Display for ReminderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReminderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('#');
        trimmed
            .parse::<i64>()
            .map(ReminderId)
            .map_err(|_| anyhow::anyhow!("Invalid reminder id: {}", s))
    }
}

/// Lifecycle status of a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    /// Waiting for its next occurrence
    Pending,
    /// One-shot reminder that was handed to the transport
    Delivered,
    /// Stopped by its owner before delivery
    Cancelled,
    /// Recurring reminder acknowledged by its owner
    Completed,
}

impl ReminderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReminderStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Delivered => "delivered",
            ReminderStatus::Cancelled => "cancelled",
            ReminderStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReminderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ReminderStatus::Pending),
            "delivered" => Ok(ReminderStatus::Delivered),
            "cancelled" => Ok(ReminderStatus::Cancelled),
            "completed" => Ok(ReminderStatus::Completed),
            _ => Err(anyhow::anyhow!("Invalid reminder status: {}", s)),
        }
    }
}

/// A stored reminder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: ReminderId,

    /// Scope isolating one user's reminders from another's
    pub owner: String,

    /// Display text, immutable after creation
    pub payload: String,

    /// Next (or only) occurrence
    pub due_at: DateTime<Utc>,

    pub status: ReminderStatus,

    /// Minutes between occurrences; present only on recurring reminders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_interval: Option<u32>,

    /// Last delivery of a recurring reminder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fired_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn is_recurring(&self) -> bool {
        self.recurrence_interval.is_some()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.recurrence_interval
            .map(|minutes| Duration::minutes(i64::from(minutes)))
    }

    /// Instant of the next occurrence to arm, without catch-up.
    ///
    /// One-shot: `due_at`. Recurring: `due_at` until the first firing, then
    /// `last_fired_at + interval`.
    pub fn next_occurrence(&self) -> DateTime<Utc> {
        match (self.interval(), self.last_fired_at) {
            (Some(interval), Some(last)) => last + interval,
            _ => self.due_at,
        }
    }

    /// Next occurrence as seen at `now` after a restart.
    ///
    /// Recurring reminders whose next occurrence already passed skip forward to
    /// the nearest instant on the `due_at + k * interval` grid that is not in
    /// the past, instead of replaying every missed occurrence. One-shot
    /// reminders keep their `due_at` (past-due ones fire immediately).
    pub fn recovery_occurrence(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let next = self.next_occurrence();
        let Some(interval) = self.interval() else {
            return next;
        };
        if next >= now {
            return next;
        }

        let step = interval.num_milliseconds().max(1);
        let behind = (now - self.due_at).num_milliseconds();
        let steps = (behind + step - 1) / step;
        let candidate = self.due_at + Duration::milliseconds(steps * step);

        // Never arm before the minimum spacing from the previous firing
        match self.last_fired_at {
            Some(last) if candidate < last + interval => last + interval,
            _ => candidate,
        }
    }
}

/// Validated input for a new reminder
#[derive(Debug, Clone, PartialEq)]
pub struct NewReminder {
    pub owner: String,
    pub payload: String,
    pub due_at: DateTime<Utc>,
    pub recurrence_interval: Option<u32>,
}

impl NewReminder {
    pub fn new(
        owner: impl Into<String>,
        payload: impl Into<String>,
        due_at: DateTime<Utc>,
        recurrence_interval: Option<u32>,
    ) -> ReminderResult<Self> {
        let new = NewReminder {
            owner: owner.into(),
            payload: payload.into(),
            due_at,
            recurrence_interval,
        };
        new.validate()?;
        Ok(new)
    }

    pub fn validate(&self) -> ReminderResult<()> {
        if self.owner.trim().is_empty() {
            return Err(ReminderError::validation("owner", "must not be empty"));
        }
        if self.payload.trim().is_empty() {
            return Err(ReminderError::validation("payload", "must not be empty"));
        }
        if self.payload.chars().count() > MAX_PAYLOAD_CHARS {
            return Err(ReminderError::validation(
                "payload",
                format!("longer than {MAX_PAYLOAD_CHARS} characters"),
            ));
        }
        if let Some(minutes) = self.recurrence_interval {
            if !(MIN_RECURRENCE_MINUTES..=MAX_RECURRENCE_MINUTES).contains(&minutes) {
                return Err(ReminderError::validation(
                    "recurrence_interval",
                    format!(
                        "{minutes} is outside {MIN_RECURRENCE_MINUTES}-{MAX_RECURRENCE_MINUTES} minutes"
                    ),
                ));
            }
        }
        Ok(())
    }
}
