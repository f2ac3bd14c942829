//! Per-command handler implementations
//!
//! - **Version**: 3.0.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 3.0.0: Console text commands; reminders are the only command family
//! - 1.0.0: Initial extraction from monolithic command_handler.rs

pub mod remind;

use std::sync::Arc;

use super::handler::TextCommandHandler;

pub use remind::RemindHandler;

/// Create all registered command handlers
///
/// Returns a vector of handlers ready to be registered with CommandRegistry.
pub fn create_all_handlers() -> Vec<Arc<dyn TextCommandHandler>> {
    vec![Arc::new(RemindHandler)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::registry::CommandRegistry;

    #[test]
    fn test_all_handlers_register_without_collisions() {
        let mut registry = CommandRegistry::new();
        for handler in create_all_handlers() {
            registry.register(handler);
        }
        assert_eq!(registry.len(), 10);
        assert!(registry.contains("remind"));
        assert!(registry.contains("help"));
    }
}
