//! Text command handler trait and infrastructure
//!
//! - **Version**: 2.0.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 2.0.0: Text commands (name + free-form arguments) with a reply string
//! - 1.0.0: Initial implementation for modular command handling

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::context::CommandContext;

/// One parsed command line: `<name> <args...>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Lowercased first word
    pub name: String,
    /// Everything after the first word, trimmed
    pub args: String,
    /// Owner scope the command acts for
    pub owner: String,
}

impl Invocation {
    /// Returns None for blank lines
    pub fn parse(line: &str, owner: &str) -> Option<Self> {
        let line = line.trim();
        let (name, args) = match line.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (line, ""),
        };
        if name.is_empty() {
            return None;
        }
        Some(Invocation {
            name: name.to_lowercase(),
            args: args.to_string(),
            owner: owner.to_string(),
        })
    }
}

/// Trait for text command handlers
///
/// Each command handler implements this trait to process one or more commands.
/// Handlers are registered with a CommandRegistry and dispatched based on command name.
///
/// # Example
///
/// ```ignore
/// pub struct PingHandler;
///
/// #[async_trait]
/// impl TextCommandHandler for PingHandler {
///     fn command_names(&self) -> &'static [&'static str] {
///         &["ping"]
///     }
///
///     async fn handle(&self, ctx: Arc<CommandContext>, invocation: &Invocation) -> Result<String> {
///         Ok("pong".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait TextCommandHandler: Send + Sync {
    /// Command name(s) this handler processes
    ///
    /// A handler can process multiple commands if they share logic.
    fn command_names(&self) -> &'static [&'static str];

    /// Handle the command and return the reply shown to the user
    ///
    /// User mistakes (bad ids, unparseable times) are replies, not errors.
    /// `Err` is reserved for faults such as a failing store.
    async fn handle(&self, ctx: Arc<CommandContext>, invocation: &Invocation) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that the trait is object-safe (can be used with dyn)
    fn _assert_object_safe(_: &dyn TextCommandHandler) {}

    #[test]
    fn test_invocation_parse() {
        let inv = Invocation::parse("  REMIND tomorrow -- call mom ", "console").unwrap();
        assert_eq!(inv.name, "remind");
        assert_eq!(inv.args, "tomorrow -- call mom");
        assert_eq!(inv.owner, "console");

        let bare = Invocation::parse("list", "console").unwrap();
        assert_eq!(bare.args, "");

        assert!(Invocation::parse("   ", "console").is_none());
    }
}
