//! # Reminder Engine
//!
//! Entry point for transports: creation, cancellation, completion, listing
//! and expression resolution, all scoped by owner. Owns the scheduler and
//! keeps its timers in step with every persisted transition.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 1.1.0: Bulk cancel, duplicate, per-day listing and history
//! - 1.0.0: Create, cancel, complete, list pending, resolve

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::core::error::{ReminderError, ReminderResult};
use crate::database::{Database, StatusChange};
use crate::features::reminders::clock::Clock;
use crate::features::reminders::delivery::{Notifier, ReminderEvent, RetryPolicy};
use crate::features::reminders::lifecycle::{self, Transition};
use crate::features::reminders::model::{NewReminder, Reminder, ReminderId, ReminderStatus};
use crate::features::reminders::resolver::TimeResolver;
use crate::features::reminders::scheduler::ReminderScheduler;

/// Outcome of a bulk cancel, per id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CancelReport {
    pub cancelled: Vec<ReminderId>,
    pub not_found: Vec<ReminderId>,
    /// Already delivered, cancelled or completed
    pub conflicted: Vec<ReminderId>,
}

#[derive(Clone)]
pub struct ReminderEngine {
    database: Database,
    scheduler: ReminderScheduler,
    resolver: TimeResolver,
    timezone: FixedOffset,
}

impl ReminderEngine {
    pub fn new(
        database: Database,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        resolver: TimeResolver,
        timezone: FixedOffset,
    ) -> Self {
        let scheduler = ReminderScheduler::new(database.clone(), notifier, clock, retry);
        ReminderEngine {
            database,
            scheduler,
            resolver,
            timezone,
        }
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEvent> {
        self.scheduler.subscribe()
    }

    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    /// Current instant in the engine's timezone
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.scheduler.clock().now().with_timezone(&self.timezone)
    }

    pub fn start(&self) {
        self.scheduler.start();
    }

    pub async fn recover(&self) -> ReminderResult<usize> {
        self.scheduler.recover().await
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub async fn create_reminder(
        &self,
        owner: &str,
        payload: &str,
        due_at: DateTime<Utc>,
        recurrence_interval: Option<u32>,
    ) -> ReminderResult<Reminder> {
        let new = NewReminder::new(owner, payload.trim(), due_at, recurrence_interval)?;
        let reminder = self
            .database
            .create(&new, self.scheduler.clock().now())
            .await?;
        if !self.scheduler.arm(&reminder) {
            warn!(
                "Reminder {} stored without a timer; it will be armed at the next recover()",
                reminder.id
            );
        }
        self.scheduler.publish(ReminderEvent::Created {
            id: reminder.id,
            owner: reminder.owner.clone(),
            due_at: reminder.due_at,
        });
        Ok(reminder)
    }

    pub async fn cancel_reminder(&self, owner: &str, id: ReminderId) -> ReminderResult<Reminder> {
        let cancelled = self.settle(owner, id, Transition::Cancel).await?;
        info!("Cancelled reminder {id} for {owner}");
        self.scheduler.publish(ReminderEvent::Cancelled {
            id,
            owner: owner.to_string(),
        });
        Ok(cancelled)
    }

    /// Acknowledge a recurring reminder; one-shot reminders are a validation error
    pub async fn complete_reminder(&self, owner: &str, id: ReminderId) -> ReminderResult<Reminder> {
        let completed = self.settle(owner, id, Transition::Complete).await?;
        info!("Completed reminder {id} for {owner}");
        self.scheduler.publish(ReminderEvent::Completed {
            id,
            owner: owner.to_string(),
        });
        Ok(completed)
    }

    async fn settle(
        &self,
        owner: &str,
        id: ReminderId,
        transition: Transition,
    ) -> ReminderResult<Reminder> {
        let current = self.database.get(owner, id).await?;
        let target = lifecycle::check(&current, transition)?;
        self.scheduler
            .retire(id, StatusChange::to(ReminderStatus::Pending, target))
            .await
    }

    pub async fn list_pending(&self, owner: &str) -> ReminderResult<Vec<Reminder>> {
        self.database.list_pending(owner).await
    }

    /// Resolve `expression` against an explicit reference instant and timezone
    pub fn resolve<Tz: TimeZone>(
        &self,
        expression: &str,
        reference: &DateTime<Tz>,
    ) -> ReminderResult<DateTime<Tz>> {
        self.resolver.resolve(expression, reference)
    }

    /// Resolve `expression` against the engine clock in the engine timezone
    pub fn resolve_now(&self, expression: &str) -> ReminderResult<DateTime<FixedOffset>> {
        self.resolver.resolve(expression, &self.now())
    }

    /// Separate the time expression in `text` from the reminder text
    pub fn split_expression(&self, text: &str) -> ReminderResult<(DateTime<FixedOffset>, String)> {
        self.resolver.split_expression(text, &self.now())
    }

    pub async fn cancel_many(&self, owner: &str, ids: &[ReminderId]) -> ReminderResult<CancelReport> {
        let mut report = CancelReport::default();
        for &id in ids {
            match self.cancel_reminder(owner, id).await {
                Ok(_) => report.cancelled.push(id),
                Err(ReminderError::NotFound(_)) => report.not_found.push(id),
                Err(e) if e.is_conflict() => report.conflicted.push(id),
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// Cancel every pending reminder of `owner`; returns how many were cancelled
    pub async fn cancel_all(&self, owner: &str) -> ReminderResult<usize> {
        let ids: Vec<ReminderId> = self
            .list_pending(owner)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        let report = self.cancel_many(owner, &ids).await?;
        Ok(report.cancelled.len())
    }

    /// New pending reminder with the source's payload and interval at `due_at`.
    /// The source is left as is, whatever its status.
    pub async fn duplicate_reminder(
        &self,
        owner: &str,
        id: ReminderId,
        due_at: DateTime<Utc>,
    ) -> ReminderResult<Reminder> {
        let source = self.database.get(owner, id).await?;
        let copy = self
            .create_reminder(owner, &source.payload, due_at, source.recurrence_interval)
            .await?;
        info!("Duplicated reminder {id} as {} for {owner}", copy.id);
        Ok(copy)
    }

    /// Pending reminders due on `date` in the engine timezone
    pub async fn list_for_day(&self, owner: &str, date: NaiveDate) -> ReminderResult<Vec<Reminder>> {
        let start = self
            .timezone
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .earliest()
            .ok_or_else(|| ReminderError::validation("date", format!("{date} has no midnight")))?
            .with_timezone(&Utc);
        self.database
            .list_pending_between(owner, start, start + Duration::days(1))
            .await
    }

    pub async fn history(&self, owner: &str, limit: usize) -> ReminderResult<Vec<Reminder>> {
        self.database.list_history(owner, limit).await
    }
}
