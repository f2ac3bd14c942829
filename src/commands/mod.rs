//! # Command System
//!
//! Text command handling for the console transport.
//!
//! - **Version**: 3.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 3.0.0: Line-based text commands over the reminder engine
//! - 2.1.0: Add modular handler infrastructure (handler trait, context, registry)

pub mod context;
pub mod handler;
pub mod handlers;
pub mod registry;

// Re-export handler infrastructure
pub use context::CommandContext;
pub use handler::{Invocation, TextCommandHandler};
pub use registry::CommandRegistry;
