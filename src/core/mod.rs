//! # Core Module
//!
//! Configuration and error types shared by the engine and the console.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.7.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Reminder error taxonomy; drop Discord response chunking
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::Config;
pub use error::{ReminderError, ReminderResult};
