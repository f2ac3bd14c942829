//! Shared context for command handlers
//!
//! - **Version**: 2.0.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 2.0.0: Reminder engine as the single shared service
//! - 1.0.0: Initial implementation with core shared state

use crate::features::reminders::ReminderEngine;

/// Default number of entries shown by `history`
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Shared context for all command handlers
#[derive(Clone)]
pub struct CommandContext {
    pub engine: ReminderEngine,
    pub history_limit: usize,
    pub start_time: std::time::Instant,
}

impl CommandContext {
    pub fn new(engine: ReminderEngine) -> Self {
        Self {
            engine,
            history_limit: DEFAULT_HISTORY_LIMIT,
            start_time: std::time::Instant::now(),
        }
    }

    /// Context over an in-memory store with a paused-clock friendly engine
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        use crate::database::Database;
        use crate::features::reminders::clock::TokioClock;
        use crate::features::reminders::delivery::testing::RecordingNotifier;
        use crate::features::reminders::{RetryPolicy, TimeResolver};
        use chrono::{FixedOffset, TimeZone, Utc};
        use std::sync::Arc;

        // Friday 2026-10-16 12:00 at -03:00
        let anchor = Utc.with_ymd_and_hms(2026, 10, 16, 15, 0, 0).unwrap();
        let clock = Arc::new(TokioClock::starting_at(anchor));
        let engine = ReminderEngine::new(
            Database::in_memory().unwrap(),
            Arc::new(RecordingNotifier::with_clock(clock.clone())),
            clock,
            RetryPolicy::default(),
            TimeResolver::default(),
            FixedOffset::west_opt(3 * 3600).unwrap(),
        );
        engine.start();
        Self::new(engine)
    }
}
