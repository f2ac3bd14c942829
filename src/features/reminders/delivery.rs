//! # Reminder Delivery
//!
//! Transport seam and retry policy for due reminders. The engine only knows
//! that a [`Notifier`] accepted or refused a reminder; what "delivered" means
//! (a chat message, a console line, a webhook) is the transport's business.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: Jittered exponential backoff and per-attempt timeout
//! - 1.0.0: Notifier trait and lifecycle events

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::features::reminders::model::{Reminder, ReminderId};

/// Broadcast channel capacity for reminder events
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Outbound transport for due reminders
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Hand `reminder` to its owner. An `Err` counts as one failed attempt.
    async fn deliver(&self, reminder: &Reminder) -> anyhow::Result<()>;
}

/// Lifecycle notifications published by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderEvent {
    Created {
        id: ReminderId,
        owner: String,
        due_at: DateTime<Utc>,
    },
    Delivered {
        id: ReminderId,
        owner: String,
        fired_at: DateTime<Utc>,
        recurring: bool,
    },
    DeliveryFailed {
        id: ReminderId,
        attempt: u32,
        reason: String,
    },
    /// Retries for one occurrence ran out; the reminder is still pending
    DeliveryExhausted {
        id: ReminderId,
        attempts: u32,
    },
    Cancelled {
        id: ReminderId,
        owner: String,
    },
    Completed {
        id: ReminderId,
        owner: String,
    },
}

impl ReminderEvent {
    pub fn id(&self) -> ReminderId {
        match self {
            ReminderEvent::Created { id, .. }
            | ReminderEvent::Delivered { id, .. }
            | ReminderEvent::DeliveryFailed { id, .. }
            | ReminderEvent::DeliveryExhausted { id, .. }
            | ReminderEvent::Cancelled { id, .. }
            | ReminderEvent::Completed { id, .. } => *id,
        }
    }
}

/// Bounded retry schedule for one occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per occurrence, including the first
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on a single `Notifier::deliver` call
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5 * 60),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failed`-th consecutive failure (1-based): doubling
    /// from `base_backoff`, capped at `max_backoff`, plus up to 25% jitter
    pub fn backoff(&self, failed: u32) -> Duration {
        let exponent = failed.saturating_sub(1).min(16);
        let delay = self
            .base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);

        let jitter_ms = (delay.as_millis() / 4) as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

/// Prints due reminders to stdout
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn render(reminder: &Reminder) -> String {
        match reminder.recurrence_interval {
            Some(minutes) => format!(
                "⏰ Reminder #{} (every {} min): {}",
                reminder.id, minutes, reminder.payload
            ),
            None => format!("⏰ Reminder #{}: {}", reminder.id, reminder.payload),
        }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn deliver(&self, reminder: &Reminder) -> anyhow::Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("\n{}\n", Self::render(reminder)).as_bytes())
            .await?;
        stdout.flush().await?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(1),
        };
        for (failed, base) in [(1, 100), (2, 200), (3, 400), (4, 500), (9, 500)] {
            let delay = policy.backoff(failed).as_millis() as u64;
            assert!(
                (base..=base + base / 4).contains(&delay),
                "attempt {failed}: {delay}ms"
            );
        }
    }

    #[test]
    fn test_backoff_without_base_is_zero() {
        let policy = RetryPolicy {
            base_backoff: Duration::ZERO,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(3), Duration::ZERO);
    }

    #[test]
    fn test_event_serializes_tagged() {
        let event = ReminderEvent::DeliveryExhausted {
            id: ReminderId(4),
            attempts: 5,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "delivery_exhausted");
        assert_eq!(json["id"], 4);
        assert_eq!(event.id(), ReminderId(4));
    }

    #[test]
    fn test_console_render() {
        let now = Utc::now();
        let mut reminder = Reminder {
            id: ReminderId(2),
            owner: "console".to_string(),
            payload: "stand up".to_string(),
            due_at: now,
            status: crate::features::reminders::model::ReminderStatus::Pending,
            recurrence_interval: None,
            last_fired_at: None,
            created_at: now,
        };
        assert_eq!(ConsoleNotifier::render(&reminder), "⏰ Reminder #2: stand up");
        reminder.recurrence_interval = Some(30);
        assert_eq!(
            ConsoleNotifier::render(&reminder),
            "⏰ Reminder #2 (every 30 min): stand up"
        );
    }
}
