//! # Reminder Scheduler
//!
//! One tokio task per pending reminder, rebuilt from the store on startup.
//!
//! Each firing runs the delivery sequence under a per-reminder lock that
//! cancel/complete requests also take, so a cancel and a firing of the same
//! reminder never interleave:
//!
//! 1. Compare-and-set guard `pending -> pending`; stop if the reminder left `pending`
//! 2. `Notifier::deliver`, bounded by the attempt timeout
//! 3. One-shot: `pending -> delivered`. Recurring: advance `last_fired_at` and
//!    sleep until `last_fired_at + interval`
//! 4. Failure: status untouched, retry with backoff until the attempt cap
//!
//! A crash between steps 2 and 3 can deliver one occurrence twice after the
//! next `recover()`. Nothing else delivers twice.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 2.0.0: Timer per reminder, crash recovery, recurring reminders, retry with backoff
//! - 1.0.0: Polling loop over due reminders

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;

use crate::core::error::{ReminderError, ReminderResult};
use crate::database::{Database, StatusChange};
use crate::features::reminders::clock::{self, Clock};
use crate::features::reminders::delivery::{
    Notifier, ReminderEvent, RetryPolicy, EVENT_CHANNEL_CAPACITY,
};
use crate::features::reminders::lifecycle::{self, Transition};
use crate::features::reminders::model::{Reminder, ReminderId, ReminderStatus};

/// Result of one delivery attempt
enum Attempt {
    /// Sequence over for this occurrence; `Some` is the next occurrence to wait for
    Done(Option<DateTime<Utc>>),
    Failed(String),
}

#[derive(Clone)]
pub struct ReminderScheduler {
    database: Database,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    /// Live timer per pending reminder
    timers: Arc<DashMap<ReminderId, JoinHandle<()>>>,
    /// Serializes delivery attempts against cancel/complete of the same reminder
    in_flight: Arc<DashMap<ReminderId, Arc<Mutex<()>>>>,
    events: broadcast::Sender<ReminderEvent>,
    running: Arc<AtomicBool>,
}

impl ReminderScheduler {
    pub fn new(
        database: Database,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        ReminderScheduler {
            database,
            notifier,
            clock,
            retry,
            timers: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            events,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: ReminderEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Accept timers. Must be called before `recover` or `arm`.
    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("Reminder scheduler started");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Tear down every live timer. Persisted state is untouched.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut torn_down = 0;
        self.timers.retain(|_, handle| {
            handle.abort();
            torn_down += 1;
            false
        });
        info!("Reminder scheduler stopped ({torn_down} timers torn down)");
    }

    /// Rebuild timers for every pending reminder in the store.
    ///
    /// Past-due one-shot reminders fire right away. Recurring reminders that
    /// missed occurrences resume at the next point of their `due_at + k * interval`
    /// grid instead of replaying what was missed.
    pub async fn recover(&self) -> ReminderResult<usize> {
        let now = self.clock.now();
        let mut armed = 0;

        let one_shots = self
            .database
            .list_all_pending()
            .await?
            .into_iter()
            .filter(|r| !r.is_recurring());
        for reminder in one_shots {
            if reminder.due_at <= now {
                debug!("Reminder {} is past due, firing now", reminder.id);
            }
            if self.arm_at(reminder.id, reminder.due_at) {
                armed += 1;
            }
        }

        for reminder in self.database.list_all_recurring_pending().await? {
            let at = reminder.recovery_occurrence(now);
            if at > reminder.next_occurrence() {
                debug!(
                    "Reminder {} skipped missed occurrences, resuming at {at}",
                    reminder.id
                );
            }
            if self.arm_at(reminder.id, at) {
                armed += 1;
            }
        }

        info!("Recovered {armed} reminder timers");
        Ok(armed)
    }

    /// Arm a timer for the reminder's next occurrence. No-op when one is
    /// already live; returns whether a timer was armed.
    pub fn arm(&self, reminder: &Reminder) -> bool {
        if reminder.status != ReminderStatus::Pending {
            debug!("Not arming reminder {}: {}", reminder.id, reminder.status);
            return false;
        }
        self.arm_at(reminder.id, reminder.next_occurrence())
    }

    fn arm_at(&self, id: ReminderId, at: DateTime<Utc>) -> bool {
        if !self.is_running() {
            warn!("Scheduler not started, reminder {id} not armed");
            return false;
        }

        match self.timers.entry(id) {
            Entry::Occupied(_) => {
                debug!("Reminder {id} already armed");
                false
            }
            Entry::Vacant(slot) => {
                let scheduler = self.clone();
                let handle = tokio::spawn(async move { scheduler.run_timer(id, at).await });
                slot.insert(handle);
                debug!("Armed reminder {id} for {at}");
                true
            }
        }
    }

    /// Stop the reminder's timer without touching its persisted status
    pub fn disarm(&self, id: ReminderId) -> bool {
        match self.timers.remove(&id) {
            Some((_, handle)) => {
                handle.abort();
                debug!("Disarmed reminder {id}");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, id: ReminderId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }

    /// Persist a terminal transition, then disarm. Waits for an in-flight
    /// delivery of the same reminder to settle first.
    pub async fn retire(&self, id: ReminderId, change: StatusChange) -> ReminderResult<Reminder> {
        let updated = {
            let _guard = self.lock(id).await;
            self.database.transition(id, change).await?
        };
        self.disarm(id);
        self.in_flight.remove(&id);
        Ok(updated)
    }

    async fn lock(&self, id: ReminderId) -> OwnedMutexGuard<()> {
        let lock = self
            .in_flight
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    async fn run_timer(self, id: ReminderId, mut at: DateTime<Utc>) {
        loop {
            self.sleep_until(at).await;
            match self.fire(id, at).await {
                Some(next) => at = next,
                None => break,
            }
        }
        self.timers.remove(&id);
        self.in_flight
            .remove_if(&id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn sleep_until(&self, at: DateTime<Utc>) {
        loop {
            let wait = clock::until(self.clock.as_ref(), at);
            if wait.is_zero() {
                return;
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Deliver the occurrence due at `at`, retrying on failure. Returns the next
    /// occurrence of a recurring reminder.
    async fn fire(&self, id: ReminderId, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut failures = 0;
        loop {
            match self.attempt(id, at).await {
                Attempt::Done(next) => return next,
                Attempt::Failed(reason) => {
                    failures += 1;
                    warn!(
                        "Delivery of reminder {id} failed (attempt {failures}/{}): {reason}",
                        self.retry.max_attempts
                    );
                    self.publish(ReminderEvent::DeliveryFailed {
                        id,
                        attempt: failures,
                        reason,
                    });

                    if failures >= self.retry.max_attempts {
                        let exhausted = ReminderError::DeliveryExhausted {
                            id,
                            attempts: failures,
                        };
                        error!("{exhausted}");
                        self.publish(ReminderEvent::DeliveryExhausted {
                            id,
                            attempts: failures,
                        });
                        return self.after_exhaustion(id, at).await;
                    }

                    tokio::time::sleep(self.retry.backoff(failures)).await;
                }
            }
        }
    }

    async fn attempt(&self, id: ReminderId, at: DateTime<Utc>) -> Attempt {
        let _guard = self.lock(id).await;

        let reminder = match self
            .database
            .transition(id, StatusChange::to(ReminderStatus::Pending, ReminderStatus::Pending))
            .await
        {
            Ok(reminder) => reminder,
            Err(e) if e.is_conflict() => {
                debug!("Reminder {id} no longer pending, dropping timer");
                return Attempt::Done(None);
            }
            Err(ReminderError::NotFound(_)) => {
                warn!("Reminder {id} vanished from the store");
                return Attempt::Done(None);
            }
            Err(e) => return Attempt::Failed(e.to_string()),
        };

        let transition = Transition::for_firing(&reminder);
        if let Err(e) = lifecycle::check(&reminder, transition) {
            error!("Reminder {id} cannot {transition}: {e}");
            return Attempt::Done(None);
        }

        match tokio::time::timeout(self.retry.attempt_timeout, self.notifier.deliver(&reminder)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Attempt::Failed(
                    ReminderError::DeliveryFailure {
                        id,
                        reason: e.to_string(),
                    }
                    .to_string(),
                )
            }
            Err(_) => {
                return Attempt::Failed(format!(
                    "timed out after {}s",
                    self.retry.attempt_timeout.as_secs()
                ))
            }
        }

        let fired_at = self.clock.now();
        let change = match transition {
            Transition::Fire => StatusChange::to(ReminderStatus::Pending, ReminderStatus::Pending)
                .with_fired_at(reminder.last_fired_at, at),
            _ => StatusChange::to(ReminderStatus::Pending, transition.target()),
        };

        match self.database.transition(id, change).await {
            Ok(updated) => {
                info!("Delivered reminder {id} to {}", updated.owner);
                self.publish(ReminderEvent::Delivered {
                    id,
                    owner: updated.owner.clone(),
                    fired_at,
                    recurring: updated.is_recurring(),
                });
                Attempt::Done(updated.is_recurring().then(|| updated.next_occurrence()))
            }
            Err(e) => {
                error!("Reminder {id} was delivered but not recorded: {e}");
                Attempt::Done(None)
            }
        }
    }

    /// One-shot reminders stay pending without a timer until the next
    /// `recover()`. Recurring reminders move on to their next grid point.
    async fn after_exhaustion(&self, id: ReminderId, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let reminder = match self.database.get_unscoped(id).await {
            Ok(reminder) => reminder,
            Err(e) => {
                error!("Reminder {id} could not be re-read after exhausted retries: {e}");
                return None;
            }
        };
        let interval = reminder.interval()?;
        if reminder.status != ReminderStatus::Pending {
            return None;
        }
        let next = reminder.recovery_occurrence(self.clock.now());
        Some(if next <= at { at + interval } else { next })
    }
}
