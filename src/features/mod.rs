//! # Features
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 2.0.0: Reminder engine is the only feature

pub mod reminders;

pub use reminders::{ReminderEngine, ReminderScheduler};
