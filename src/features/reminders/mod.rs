//! # Reminders Feature
//!
//! Natural-language time resolution, durable reminder storage and timer
//! scheduling with recurrence.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Time resolver, lifecycle state machine, recurring reminders, crash recovery
//! - 1.0.0: Scheduled reminder polling

pub mod clock;
pub mod delivery;
pub mod engine;
pub mod lifecycle;
pub mod model;
pub mod resolver;
pub mod scheduler;

pub use clock::{Clock, SystemClock, TokioClock};
pub use delivery::{ConsoleNotifier, Notifier, ReminderEvent, RetryPolicy};
pub use engine::{CancelReport, ReminderEngine};
pub use lifecycle::Transition;
pub use model::{NewReminder, Reminder, ReminderId, ReminderStatus};
pub use resolver::{ResolverPolicy, TimeResolver};
pub use scheduler::ReminderScheduler;
