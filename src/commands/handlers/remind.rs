//! Reminder command handlers
//!
//! Handles: remind, every, list, today, day, history, cancel, complete, dup, help
//!
//! - **Version**: 2.0.0
//! - **Since**: 3.38.0
//!
//! ## Changelog
//! - 2.0.0: Natural-language times, recurring reminders, bulk cancel, duplicate, history
//! - 1.0.0: Extracted from command_handler.rs

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use log::{debug, info};
use std::sync::Arc;

use crate::commands::context::CommandContext;
use crate::commands::handler::{Invocation, TextCommandHandler};
use crate::core::error::{ReminderError, ReminderResult};
use crate::features::reminders::resolver::DEFAULT_REMINDER_TEXT;
use crate::features::reminders::{Reminder, ReminderEngine, ReminderId};

/// Largest id range accepted by `cancel 1-5`
const MAX_ID_RANGE: i64 = 100;

/// Handler for reminder-related commands
pub struct RemindHandler;

#[async_trait]
impl TextCommandHandler for RemindHandler {
    fn command_names(&self) -> &'static [&'static str] {
        &[
            "remind", "every", "list", "today", "day", "history", "cancel", "complete", "dup",
            "help",
        ]
    }

    async fn handle(&self, ctx: Arc<CommandContext>, invocation: &Invocation) -> Result<String> {
        let owner = invocation.owner.as_str();
        let args = invocation.args.as_str();

        let outcome = match invocation.name.as_str() {
            "remind" => self.handle_remind(&ctx, owner, args).await,
            "every" => self.handle_every(&ctx, owner, args).await,
            "list" => self.handle_list(&ctx, owner).await,
            "today" => self.handle_today(&ctx, owner).await,
            "day" => self.handle_day(&ctx, owner, args).await,
            "history" => self.handle_history(&ctx, owner).await,
            "cancel" => self.handle_cancel(&ctx, owner, args).await,
            "complete" => self.handle_complete(&ctx, owner, args).await,
            "dup" => self.handle_dup(&ctx, owner, args).await,
            _ => Ok(Self::help_text()),
        };

        Self::reply_for(outcome)
    }
}

impl RemindHandler {
    /// Handle `remind <when> -- <text>` or `remind <text with a time in it>`
    async fn handle_remind(
        &self,
        ctx: &CommandContext,
        owner: &str,
        args: &str,
    ) -> ReminderResult<String> {
        if args.is_empty() {
            return Ok("❌ Usage: `remind <when> -- <text>`, e.g. `remind tomorrow at 9 -- call the bank`".to_string());
        }

        let (due, text) = Self::when_and_text(&ctx.engine, args)?;
        let now = ctx.engine.now();
        if due <= now {
            return Ok(format!(
                "❌ {} has already passed. Pick a time in the future.",
                Self::format_local(&due)
            ));
        }

        let reminder = ctx
            .engine
            .create_reminder(owner, &text, due.with_timezone(&Utc), None)
            .await?;

        let wait = ((due - now).num_milliseconds() + 500) / 1000;
        info!(
            "Created reminder {} for {owner} in {} ({})",
            reminder.id,
            Self::format_duration(wait),
            reminder.due_at
        );

        Ok(format!(
            "⏰ Got it! I'll remind you in **{}** ({}) about:\n> {}\n\n*Reminder ID: #{}*",
            Self::format_duration(wait),
            Self::format_local(&due),
            reminder.payload,
            reminder.id
        ))
    }

    /// Handle `every <minutes> [when] -- <text>`
    async fn handle_every(
        &self,
        ctx: &CommandContext,
        owner: &str,
        args: &str,
    ) -> ReminderResult<String> {
        let usage = "❌ Usage: `every <minutes> [when] -- <text>`, e.g. `every 30 tomorrow at 9 -- stretch`";
        let (first, rest) = args
            .split_once(char::is_whitespace)
            .unwrap_or((args, ""));
        let Some(minutes) = Self::parse_interval(first) else {
            return Ok(usage.to_string());
        };
        let rest = rest.trim();
        let now = ctx.engine.now();
        let first_run = now + Duration::minutes(i64::from(minutes));

        let (due, text) = match rest.strip_prefix("--") {
            Some(text) => (first_run, Self::payload_or_default(text)),
            None if rest.is_empty() => return Ok(usage.to_string()),
            None => match Self::when_and_text(&ctx.engine, rest) {
                Ok(found) => found,
                // No time in the text: start one interval from now
                Err(ReminderError::Unparseable { .. }) => (first_run, rest.to_string()),
                Err(e) => return Err(e),
            },
        };
        if due < now {
            return Ok(format!(
                "❌ {} has already passed. Pick a time in the future.",
                Self::format_local(&due)
            ));
        }

        let reminder = ctx
            .engine
            .create_reminder(owner, &text, due.with_timezone(&Utc), Some(minutes))
            .await?;
        info!(
            "Created recurring reminder {} for {owner} every {minutes} min",
            reminder.id
        );

        Ok(format!(
            "🔁 Every **{}** starting {} I'll remind you about:\n> {}\n\n*Reminder ID: #{}. Use `complete {}` to stop it.*",
            Self::format_duration(i64::from(minutes) * 60),
            Self::format_local(&due),
            reminder.payload,
            reminder.id,
            reminder.id
        ))
    }

    /// List all pending reminders
    async fn handle_list(&self, ctx: &CommandContext, owner: &str) -> ReminderResult<String> {
        let reminders = ctx.engine.list_pending(owner).await?;
        if reminders.is_empty() {
            return Ok(
                "📋 You don't have any pending reminders.\n\nUse `remind <when> -- <text>` to create one!"
                    .to_string(),
            );
        }

        let mut reminder_list = String::from("📋 **Your Pending Reminders:**\n\n");
        for reminder in &reminders {
            reminder_list.push_str(&Self::format_entry(&ctx.engine, reminder));
        }
        reminder_list.push_str("*Use `cancel <id>` to cancel a reminder.*");
        Ok(reminder_list)
    }

    async fn handle_today(&self, ctx: &CommandContext, owner: &str) -> ReminderResult<String> {
        let today = ctx.engine.now().date_naive();
        self.list_day(ctx, owner, today).await
    }

    /// Handle `day <expr>`, e.g. `day monday` or `day 20/12`
    async fn handle_day(&self, ctx: &CommandContext, owner: &str, args: &str) -> ReminderResult<String> {
        if args.is_empty() {
            return Ok("❌ Usage: `day <date>`, e.g. `day friday` or `day 20/12`".to_string());
        }
        let date = ctx.engine.resolve_now(args)?.date_naive();
        self.list_day(ctx, owner, date).await
    }

    async fn list_day(
        &self,
        ctx: &CommandContext,
        owner: &str,
        date: chrono::NaiveDate,
    ) -> ReminderResult<String> {
        let reminders = ctx.engine.list_for_day(owner, date).await?;
        let heading = date.format("%A %d %B");
        if reminders.is_empty() {
            return Ok(format!("📅 Nothing scheduled for {heading}."));
        }

        let mut out = format!("📅 **{heading}:**\n\n");
        for reminder in &reminders {
            out.push_str(&Self::format_entry(&ctx.engine, reminder));
        }
        Ok(out.trim_end().to_string())
    }

    async fn handle_history(&self, ctx: &CommandContext, owner: &str) -> ReminderResult<String> {
        let past = ctx.engine.history(owner, ctx.history_limit).await?;
        if past.is_empty() {
            return Ok("🗂️ No finished reminders yet.".to_string());
        }

        let tz = ctx.engine.timezone();
        let mut out = String::from("🗂️ **Recent Reminders:**\n\n");
        for reminder in &past {
            out.push_str(&format!(
                "**#{}** - {} ({})\n> {}\n\n",
                reminder.id,
                reminder.status,
                Self::format_local(&reminder.due_at.with_timezone(&tz)),
                reminder.payload
            ));
        }
        Ok(out.trim_end().to_string())
    }

    /// Handle `cancel <id>`, `cancel 1,2,3`, `cancel 1-5` or `cancel all`
    async fn handle_cancel(&self, ctx: &CommandContext, owner: &str, args: &str) -> ReminderResult<String> {
        if args.eq_ignore_ascii_case("all") {
            let cancelled = ctx.engine.cancel_all(owner).await?;
            info!("Cancelled all {cancelled} reminders for {owner}");
            return Ok(format!(
                "✅ Cancelled {cancelled} reminder{}.",
                if cancelled == 1 { "" } else { "s" }
            ));
        }

        let Some(ids) = Self::parse_reminder_ids(args) else {
            return Ok(
                "❌ Please provide reminder IDs to cancel (`cancel 3`, `cancel 1,2`, `cancel 1-5` or `cancel all`). Use `list` to see your reminder IDs."
                    .to_string(),
            );
        };

        if let [id] = ids.as_slice() {
            ctx.engine.cancel_reminder(owner, *id).await?;
            return Ok(format!("✅ Cancelled reminder #{id}."));
        }

        let report = ctx.engine.cancel_many(owner, &ids).await?;
        fn join(ids: &[ReminderId]) -> String {
            ids.iter()
                .map(|id| format!("#{id}"))
                .collect::<Vec<_>>()
                .join(", ")
        }

        let mut lines = Vec::new();
        if !report.cancelled.is_empty() {
            lines.push(format!("✅ Cancelled: {}", join(&report.cancelled)));
        }
        if !report.conflicted.is_empty() {
            lines.push(format!("⚠️ Already finished: {}", join(&report.conflicted)));
        }
        if !report.not_found.is_empty() {
            lines.push(format!("❌ Not found: {}", join(&report.not_found)));
        }
        Ok(lines.join("\n"))
    }

    async fn handle_complete(&self, ctx: &CommandContext, owner: &str, args: &str) -> ReminderResult<String> {
        let Ok(id) = args.parse::<ReminderId>() else {
            return Ok("❌ Usage: `complete <id>`".to_string());
        };
        ctx.engine.complete_reminder(owner, id).await?;
        Ok(format!("✅ Completed recurring reminder #{id}. No more repeats."))
    }

    /// Handle `dup <id> <when>`
    async fn handle_dup(&self, ctx: &CommandContext, owner: &str, args: &str) -> ReminderResult<String> {
        let usage = "❌ Usage: `dup <id> <when>`, e.g. `dup 4 next monday`";
        let Some((id, when)) = args.split_once(char::is_whitespace) else {
            return Ok(usage.to_string());
        };
        let Ok(id) = id.parse::<ReminderId>() else {
            return Ok(usage.to_string());
        };

        let due = Self::resolve_when(&ctx.engine, when.trim())?;
        if due <= ctx.engine.now() {
            return Ok(format!(
                "❌ {} has already passed. Pick a time in the future.",
                Self::format_local(&due)
            ));
        }

        let copy = ctx
            .engine
            .duplicate_reminder(owner, id, due.with_timezone(&Utc))
            .await?;
        Ok(format!(
            "📄 Duplicated #{id} as #{} for {}:\n> {}",
            copy.id,
            Self::format_local(&due),
            copy.payload
        ))
    }

    fn help_text() -> String {
        [
            "🛎️ **Reminder commands**",
            "`remind <when> -- <text>`  one-off reminder (`remind tomorrow at 9 -- call the bank`)",
            "`remind <text with a time>`  same, time picked out of the text (`remind pay rent on the 20th`)",
            "`every <minutes> [when] -- <text>`  repeat until completed (1-60 minutes)",
            "`list`  pending reminders",
            "`today` / `day <date>`  reminders for one day",
            "`history`  delivered, cancelled and completed reminders",
            "`cancel <id>` / `cancel 1,2` / `cancel 1-5` / `cancel all`",
            "`complete <id>`  stop a repeating reminder",
            "`dup <id> <when>`  copy a reminder to a new time",
            "",
            "Times: `in 20 minutes`, `30m`, `at 18:00`, `9pm`, `tomorrow`, `monday`, `monday 30`, `the 15th`, `20/12`, `2027-01-05 14:30`, `mañana a las 9`",
        ]
        .join("\n")
    }

    /// Map engine outcomes to replies; only faults propagate as errors
    fn reply_for(outcome: ReminderResult<String>) -> Result<String> {
        match outcome {
            Ok(reply) => Ok(reply),
            Err(e) if e.needs_clarification() => {
                debug!("Asking for clarification: {e}");
                Ok(format!(
                    "❓ {e}. Try something like `tomorrow at 9`, `monday 30`, `in 20 minutes` or `20/12 18:00`."
                ))
            }
            Err(ReminderError::NotFound(id)) => {
                Ok(format!("❌ Reminder #{id} not found or doesn't belong to you."))
            }
            Err(ReminderError::Conflict { id, actual, .. }) => {
                Ok(format!("⚠️ Reminder #{id} is already {actual}."))
            }
            Err(e @ ReminderError::Validation { .. }) => Ok(format!("❌ {e}")),
            Err(e) => Err(e.into()),
        }
    }

    /// Split `<when> -- <text>`, or pick the time out of free text
    fn when_and_text(
        engine: &ReminderEngine,
        args: &str,
    ) -> ReminderResult<(DateTime<FixedOffset>, String)> {
        match args.split_once("--") {
            Some((when, text)) => Ok((
                Self::resolve_when(engine, when.trim())?,
                Self::payload_or_default(text),
            )),
            None => engine.split_expression(args),
        }
    }

    /// Compact durations (`30m`, `1h30m`) first, then the full resolver
    fn resolve_when(engine: &ReminderEngine, when: &str) -> ReminderResult<DateTime<FixedOffset>> {
        match Self::parse_duration(when) {
            Some(seconds) => Duration::try_seconds(seconds)
                .and_then(|offset| engine.now().checked_add_signed(offset))
                .ok_or_else(|| ReminderError::validation("due_at", format!("{when} is too far away"))),
            None => engine.resolve_now(when),
        }
    }

    fn payload_or_default(text: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            DEFAULT_REMINDER_TEXT.to_string()
        } else {
            text.to_string()
        }
    }

    fn format_entry(engine: &ReminderEngine, reminder: &Reminder) -> String {
        let tz = engine.timezone();
        let next = reminder.next_occurrence();
        let diff = next.signed_duration_since(engine.now());
        let time_display = if diff.num_seconds() > 0 {
            format!("in {}", Self::format_duration(diff.num_seconds()))
        } else {
            "any moment now".to_string()
        };
        let repeat = reminder
            .recurrence_interval
            .map(|m| format!(", every {m} min"))
            .unwrap_or_default();

        format!(
            "**#{}** - {time_display} ({}{repeat})\n> {}\n\n",
            reminder.id,
            Self::format_local(&next.with_timezone(&tz)),
            reminder.payload
        )
    }

    fn format_local(at: &DateTime<FixedOffset>) -> String {
        at.format("%a %d %b %H:%M").to_string()
    }

    /// Recurrence interval in minutes: `5`, `5m`, `1h`
    fn parse_interval(token: &str) -> Option<u32> {
        if let Ok(minutes) = token.parse::<u32>() {
            return Some(minutes);
        }
        let seconds = Self::parse_duration(token)?;
        if seconds % 60 != 0 {
            return None;
        }
        u32::try_from(seconds / 60).ok()
    }

    /// Parse reminder ids: `3`, `#3`, `1,2,3`, `1 2 3`, `1-5`
    fn parse_reminder_ids(input: &str) -> Option<Vec<ReminderId>> {
        let mut ids: Vec<ReminderId> = Vec::new();
        for token in input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            match token.split_once('-') {
                Some((from, to)) => {
                    let from = from.parse::<ReminderId>().ok()?.0;
                    let to = to.parse::<ReminderId>().ok()?.0;
                    if from > to || to - from >= MAX_ID_RANGE {
                        return None;
                    }
                    ids.extend((from..=to).map(ReminderId));
                }
                None => ids.push(token.parse().ok()?),
            }
        }

        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(*id));
        (!ids.is_empty()).then_some(ids)
    }

    /// Parse a time duration string like "30m", "2h", "1d", "1h30m" into seconds
    fn parse_duration(time_str: &str) -> Option<i64> {
        let time_str = time_str.trim().to_lowercase();
        let mut total_seconds: i64 = 0;
        let mut current_number = String::new();

        for c in time_str.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if !current_number.is_empty() {
                let value: i64 = current_number.parse().ok()?;
                current_number.clear();

                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 60 * 60,
                    'd' => 60 * 60 * 24,
                    'w' => 60 * 60 * 24 * 7,
                    _ => return None,
                };
                total_seconds = total_seconds.checked_add(value.checked_mul(unit)?)?;
            } else {
                return None;
            }
        }

        if total_seconds > 0 && current_number.is_empty() {
            Some(total_seconds)
        } else {
            None
        }
    }

    /// Format a duration in seconds into a human-readable string
    fn format_duration(seconds: i64) -> String {
        if seconds < 60 {
            format!("{} second{}", seconds, if seconds == 1 { "" } else { "s" })
        } else if seconds < 3600 {
            let mins = seconds / 60;
            format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
        } else if seconds < 86400 {
            let hours = seconds / 3600;
            let mins = (seconds % 3600) / 60;
            if mins > 0 {
                format!(
                    "{} hour{} {} minute{}",
                    hours,
                    if hours == 1 { "" } else { "s" },
                    mins,
                    if mins == 1 { "" } else { "s" }
                )
            } else {
                format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
            }
        } else {
            let days = seconds / 86400;
            let hours = (seconds % 86400) / 3600;
            if hours > 0 {
                format!(
                    "{} day{} {} hour{}",
                    days,
                    if days == 1 { "" } else { "s" },
                    hours,
                    if hours == 1 { "" } else { "s" }
                )
            } else {
                format!("{} day{}", days, if days == 1 { "" } else { "s" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(ctx: &Arc<CommandContext>, line: &str) -> String {
        let invocation = Invocation::parse(line, "console").unwrap();
        RemindHandler.handle(ctx.clone(), &invocation).await.unwrap()
    }

    fn context() -> Arc<CommandContext> {
        Arc::new(CommandContext::for_tests())
    }

    #[test]
    fn test_remind_handler_commands() {
        let handler = RemindHandler;
        let names = handler.command_names();

        assert!(names.contains(&"remind"));
        assert!(names.contains(&"every"));
        assert!(names.contains(&"cancel"));
        assert!(names.contains(&"help"));
        assert_eq!(names.len(), 10);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(RemindHandler::parse_duration("30s"), Some(30));
        assert_eq!(RemindHandler::parse_duration("30m"), Some(1800));
        assert_eq!(RemindHandler::parse_duration("2h"), Some(7200));
        assert_eq!(RemindHandler::parse_duration("1d"), Some(86400));
        assert_eq!(RemindHandler::parse_duration("1w"), Some(604800));
        assert_eq!(RemindHandler::parse_duration("1h30m"), Some(5400));
        assert_eq!(RemindHandler::parse_duration("invalid"), None);
        assert_eq!(RemindHandler::parse_duration(""), None);
        // Natural-language expressions are left to the resolver
        assert_eq!(RemindHandler::parse_duration("15"), None);
        assert_eq!(RemindHandler::parse_duration("9am"), None);
        assert_eq!(RemindHandler::parse_duration("monday 30"), None);
        assert_eq!(RemindHandler::parse_duration("20/12"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(RemindHandler::format_duration(30), "30 seconds");
        assert_eq!(RemindHandler::format_duration(1), "1 second");
        assert_eq!(RemindHandler::format_duration(60), "1 minute");
        assert_eq!(RemindHandler::format_duration(120), "2 minutes");
        assert_eq!(RemindHandler::format_duration(3600), "1 hour");
        assert_eq!(RemindHandler::format_duration(3660), "1 hour 1 minute");
        assert_eq!(RemindHandler::format_duration(86400), "1 day");
        assert_eq!(RemindHandler::format_duration(90000), "1 day 1 hour");
    }

    #[test]
    fn test_parse_reminder_ids() {
        let ids = |s: &str| {
            RemindHandler::parse_reminder_ids(s).map(|v| v.into_iter().map(|id| id.0).collect::<Vec<_>>())
        };
        assert_eq!(ids("3"), Some(vec![3]));
        assert_eq!(ids("#3"), Some(vec![3]));
        assert_eq!(ids("1,2, 3"), Some(vec![1, 2, 3]));
        assert_eq!(ids("1 2 2"), Some(vec![1, 2]));
        assert_eq!(ids("4-6,9"), Some(vec![4, 5, 6, 9]));
        assert_eq!(ids("6-4"), None);
        assert_eq!(ids("1-1000"), None);
        assert_eq!(ids("x"), None);
        assert_eq!(ids(""), None);
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(RemindHandler::parse_interval("5"), Some(5));
        assert_eq!(RemindHandler::parse_interval("15m"), Some(15));
        assert_eq!(RemindHandler::parse_interval("1h"), Some(60));
        assert_eq!(RemindHandler::parse_interval("90s"), None);
        assert_eq!(RemindHandler::parse_interval("often"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remind_list_and_cancel() {
        let ctx = context();

        let reply = run(&ctx, "remind tomorrow at 18:00 -- buy milk").await;
        assert!(reply.contains("Sat 17 Oct 18:00"), "{reply}");
        assert!(reply.contains("> buy milk"));
        assert!(reply.contains("#1"));

        let reply = run(&ctx, "remind call mom in 10 minutes").await;
        assert!(reply.contains("**10 minutes**"), "{reply}");
        assert!(reply.contains("> call mom"));

        let reply = run(&ctx, "remind 30m -- stretch").await;
        assert!(reply.contains("**30 minutes**"), "{reply}");

        let list = run(&ctx, "list").await;
        assert!(list.contains("buy milk") && list.contains("call mom") && list.contains("stretch"));

        assert_eq!(run(&ctx, "cancel 1").await, "✅ Cancelled reminder #1.");
        assert_eq!(run(&ctx, "cancel 1").await, "⚠️ Reminder #1 is already cancelled.");
        assert!(run(&ctx, "cancel 42").await.contains("not found"));

        let bulk = run(&ctx, "cancel 1-3").await;
        assert!(bulk.contains("✅ Cancelled: #2, #3"), "{bulk}");
        assert!(bulk.contains("⚠️ Already finished: #1"), "{bulk}");

        let history = run(&ctx, "history").await;
        assert!(history.contains("cancelled"));
        assert!(run(&ctx, "list").await.contains("don't have any pending"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remind_rejects_unclear_and_past_times() {
        let ctx = context();
        assert!(run(&ctx, "remind whenever -- x").await.starts_with("❓"));
        assert!(run(&ctx, "remind monday or friday -- x").await.starts_with("❓"));
        assert!(run(&ctx, "remind today at 8am -- x").await.contains("already passed"));
        assert!(run(&ctx, "remind in 99999999 weeks -- x").await.starts_with("❓"));
        assert!(run(&ctx, "remind").await.contains("Usage"));
        assert!(run(&ctx, "list").await.contains("don't have any pending"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_and_complete() {
        let ctx = context();

        let reply = run(&ctx, "every 5 -- drink water").await;
        assert!(reply.contains("Every **5 minutes**"), "{reply}");
        assert!(run(&ctx, "list").await.contains("every 5 min"));

        let too_long = run(&ctx, "every 90 -- nope").await;
        assert!(too_long.contains("invalid recurrence_interval"), "{too_long}");

        run(&ctx, "remind in 2 hours -- one-off").await;
        let reply = run(&ctx, "complete 2").await;
        assert!(reply.contains("only recurring reminders"), "{reply}");

        assert!(run(&ctx, "complete 1").await.contains("Completed recurring reminder #1"));
        assert!(run(&ctx, "complete 1").await.contains("already completed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dup_today_and_day() {
        let ctx = context();
        run(&ctx, "remind at 18:00 -- water plants").await;

        let reply = run(&ctx, "dup 1 tomorrow at 18:00").await;
        assert!(reply.contains("Duplicated #1 as #2"), "{reply}");

        let today = run(&ctx, "today").await;
        assert!(today.contains("Friday 16 October"), "{today}");
        assert!(today.contains("#1") && !today.contains("#2"));

        let tomorrow = run(&ctx, "day tomorrow").await;
        assert!(tomorrow.contains("#2") && !tomorrow.contains("#1"), "{tomorrow}");

        assert!(run(&ctx, "day 20/12").await.contains("Nothing scheduled"));
        assert!(run(&ctx, "dup 9 tomorrow").await.contains("not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_help() {
        let ctx = context();
        let help = run(&ctx, "help").await;
        assert!(help.contains("remind <when> -- <text>"));
        assert!(help.contains("cancel all"));
    }
}
