//! # Clock
//!
//! Wall-clock source for the scheduler. Production reads the system clock;
//! tests use [`TokioClock`], which advances with tokio's timer so a paused
//! runtime can fast-forward through hours of schedule in milliseconds.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock anchored at a fixed instant and driven by `tokio::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    /// Must be called inside a tokio runtime
    pub fn starting_at(anchor: DateTime<Utc>) -> Self {
        TokioClock {
            anchor,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().duration_since(self.started);
        match chrono::Duration::from_std(elapsed) {
            Ok(elapsed) => self.anchor + elapsed,
            Err(_) => self.anchor,
        }
    }
}

/// Time left until `at`, zero if it already passed
pub fn until(clock: &dyn Clock, at: DateTime<Utc>) -> std::time::Duration {
    (at - clock.now()).to_std().unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let anchor = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let clock = TokioClock::starting_at(anchor);
        assert_eq!(clock.now(), anchor);

        tokio::time::sleep(std::time::Duration::from_secs(90)).await;
        assert_eq!(clock.now(), anchor + chrono::Duration::seconds(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_saturates_at_zero() {
        let anchor = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let clock = TokioClock::starting_at(anchor);
        assert_eq!(
            until(&clock, anchor - chrono::Duration::minutes(5)),
            std::time::Duration::ZERO
        );
        assert_eq!(
            until(&clock, anchor + chrono::Duration::seconds(30)),
            std::time::Duration::from_secs(30)
        );
    }
}
