//! Command handler registry
//!
//! - **Version**: 1.1.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 1.1.0: Dispatch a raw command line
//! - 1.0.0: Initial implementation for handler dispatch

use anyhow::Result;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use super::context::CommandContext;
use super::handler::{Invocation, TextCommandHandler};

/// Registry mapping command names to handlers
///
/// The registry allows handlers to be registered and looked up by command name.
/// Multiple command names can map to the same handler if they share logic.
///
/// # Example
///
/// ```ignore
/// let mut registry = CommandRegistry::new();
/// registry.register(Arc::new(RemindHandler));
///
/// if let Some(reply) = registry.dispatch(ctx, "list", "console").await? {
///     println!("{reply}");
/// }
/// ```
#[derive(Clone)]
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Arc<dyn TextCommandHandler>>,
}

impl CommandRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for its declared command names
    ///
    /// The handler is registered for all names returned by `command_names()`.
    pub fn register(&mut self, handler: Arc<dyn TextCommandHandler>) {
        for name in handler.command_names() {
            self.handlers.insert(name, Arc::clone(&handler));
        }
    }

    /// Get handler for a command name
    ///
    /// Returns None if no handler is registered for the given name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TextCommandHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Check if a command is registered
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered command names
    ///
    /// Note: This counts command names, not unique handlers.
    /// A handler registered for multiple names will be counted multiple times.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Get all registered command names
    pub fn command_names(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }

    /// Parse `line` and run the matching handler.
    ///
    /// Returns None for blank lines.
    pub async fn dispatch(
        &self,
        ctx: Arc<CommandContext>,
        line: &str,
        owner: &str,
    ) -> Result<Option<String>> {
        let Some(invocation) = Invocation::parse(line, owner) else {
            return Ok(None);
        };

        match self.get(&invocation.name) {
            Some(handler) => {
                debug!("Dispatching {} for {}", invocation.name, invocation.owner);
                handler.handle(ctx, &invocation).await.map(Some)
            }
            None => Ok(Some(format!(
                "❓ Unknown command `{}`. Type `help` for the list of commands.",
                invocation.name
            ))),
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    // Mock handler for testing
    struct MockHandler {
        names: &'static [&'static str],
    }

    #[async_trait]
    impl TextCommandHandler for MockHandler {
        fn command_names(&self) -> &'static [&'static str] {
            self.names
        }

        async fn handle(&self, _ctx: Arc<CommandContext>, invocation: &Invocation) -> Result<String> {
            Ok(format!("{}:{}", invocation.name, invocation.args))
        }
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = CommandRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_register_single() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(MockHandler { names: &["ping"] }));

        assert!(!registry.is_empty());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("ping"));
        assert!(!registry.contains("pong"));
    }

    #[test]
    fn test_registry_register_multiple_names() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(MockHandler {
            names: &["remind", "list", "cancel"],
        }));

        assert_eq!(registry.len(), 3);
        assert!(registry.contains("remind"));
        assert!(registry.contains("list"));
        assert!(registry.contains("cancel"));
    }

    #[test]
    fn test_registry_get_returns_handler() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(MockHandler { names: &["test"] }));

        assert!(registry.get("test").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_registry_default() {
        let registry = CommandRegistry::default();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(MockHandler { names: &["echo"] }));
        let ctx = Arc::new(CommandContext::for_tests());

        let reply = registry.dispatch(ctx.clone(), "ECHO hello there", "me").await.unwrap();
        assert_eq!(reply.as_deref(), Some("echo:hello there"));

        let unknown = registry.dispatch(ctx.clone(), "nope", "me").await.unwrap().unwrap();
        assert!(unknown.contains("Unknown command"));

        assert_eq!(registry.dispatch(ctx, "  ", "me").await.unwrap(), None);
    }
}
