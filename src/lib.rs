// Core layer - shared types and configuration
pub mod core;

// Features layer - reminder engine
pub mod features;

// Infrastructure
pub mod database;

// Application layer - console commands
pub mod commands;

pub use core::{Config, ReminderError, ReminderResult};
pub use database::Database;
pub use features::reminders::{
    ReminderEngine, ReminderEvent, ReminderId, ReminderScheduler, ReminderStatus, TimeResolver,
};
