use anyhow::Result;
use dotenvy::dotenv;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use chime::commands::{handlers::create_all_handlers, CommandContext, CommandRegistry};
use chime::core::Config;
use chime::database::Database;
use chime::features::reminders::{
    ConsoleNotifier, ReminderEngine, ReminderEvent, SystemClock, TimeResolver,
};

/// Log lifecycle events until the engine shuts down
fn spawn_event_logger(engine: &ReminderEngine) {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ReminderEvent::DeliveryFailed { id, attempt, reason }) => {
                    warn!("Delivery attempt {attempt} for reminder {id} failed: {reason}");
                }
                Ok(ReminderEvent::DeliveryExhausted { id, attempts }) => {
                    error!("Gave up on reminder {id} after {attempts} attempts; it stays pending");
                }
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!("Reminder event: {json}"),
                    Err(e) => warn!("Unserializable reminder event for {}: {e}", event.id()),
                },
                Err(RecvError::Lagged(skipped)) => warn!("Event logger skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn prompt(stdout: &mut tokio::io::Stdout) -> Result<()> {
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting reminder console...");

    let database = Database::new(&config.database_path).await?;
    let engine = ReminderEngine::new(
        database,
        Arc::new(ConsoleNotifier),
        Arc::new(SystemClock),
        config.retry_policy(),
        TimeResolver::new(config.resolver_policy()),
        config.utc_offset,
    );
    spawn_event_logger(&engine);

    engine.start();
    let recovered = engine.recover().await?;
    info!("⏰ Re-armed {recovered} pending reminders from {}", config.database_path);

    let mut registry = CommandRegistry::new();
    for handler in create_all_handlers() {
        registry.register(handler);
    }
    info!("Registered {} commands", registry.len());

    let ctx = Arc::new(CommandContext::new(engine.clone()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Type `help` for the list of commands.\n")
        .await?;
    prompt(&mut stdout).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input closed");
                    break;
                };
                match registry.dispatch(ctx.clone(), &line, &config.console_owner).await {
                    Ok(Some(reply)) => {
                        stdout.write_all(format!("{reply}\n").as_bytes()).await?;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Command failed: {e:#}");
                        stdout
                            .write_all(b"Something went wrong. Check the logs and try again.\n")
                            .await?;
                    }
                }
                prompt(&mut stdout).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    engine.stop();
    info!(
        "Reminder console stopped after {:?}",
        ctx.start_time.elapsed()
    );
    Ok(())
}
