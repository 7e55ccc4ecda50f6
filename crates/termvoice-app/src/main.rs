//! termvoice binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Load the recognition script
//! 4. Run one voice session against a logging console
//! 5. Print every session event to stdout as a JSON line

mod cli;
mod console;
mod script;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;

use termvoice_core::config::{resolve_speech_timeout, TermVoiceConfig};
use termvoice_core::error::Result;
use termvoice_core::events::SessionEvent;
use termvoice_core::types::ConsoleGeometry;
use termvoice_session::controller::CHAT_COMMIT_DELAY;
use termvoice_session::{SessionController, SessionHandle, SessionRuntime, SessionStatus, TracingAnnouncer};

use cli::CliArgs;
use console::{LoggingConsole, LoggingConsoleInstance};
use script::{Script, ScriptSpeechService};

/// Slack added on top of the script length before the session is stopped.
const SETTLE_MARGIN: Duration = Duration::from_millis(500);

/// Wait until the session has ended and nothing is left to commit.
async fn wait_for_session_end(
    handle: &SessionHandle,
    events: &mut broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Session events dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        };
        println!("{}", serde_json::to_string(&event)?);

        match event {
            SessionEvent::Committed { executed: true, .. } => return Ok(()),
            SessionEvent::Stopped { .. } => {
                let snapshot = handle.snapshot().await?;
                if snapshot.status != SessionStatus::Recording && !snapshot.commit_pending {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config, read before tracing so its log level can apply.
    let config_file = args.resolve_config_path();
    let loaded = TermVoiceConfig::load(&config_file);
    let level = args.resolve_log_level(loaded.as_ref().ok().map(|c| c.general.log_level.as_str()));

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting termvoice v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => {
            tracing::info!(path = %config_file.display(), "Configuration loaded");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %config_file.display(),
                error = %e,
                "Using default configuration"
            );
            TermVoiceConfig::default()
        }
    };
    if let Some(ms) = args.timeout_ms {
        config.voice.speech_timeout_ms = Some(toml::Value::Integer(ms.min(i64::MAX as u64) as i64));
    }
    let timeout = resolve_speech_timeout(&config);

    // Script.
    let script = Script::load(&args.script)?;
    let replay_length = script.duration();

    // Session.
    let instance = Arc::new(LoggingConsoleInstance::new(ConsoleGeometry {
        cursor_row: Some(0),
        cursor_column: Some(2),
        total_columns: args.columns,
        is_first_row: true,
    }));
    let controller = SessionController::new(
        Arc::new(LoggingConsole::new(Arc::clone(&instance))),
        Arc::new(ScriptSpeechService::new(script)),
        Arc::new(config),
        Arc::new(TracingAnnouncer),
    );
    let (handle, task) = SessionRuntime::spawn(controller);
    let mut events = handle.subscribe();

    let session_id = handle.start(args.chat).await?;
    tracing::info!(%session_id, chat_mode = args.chat, "Replaying script");

    let settle = timeout
        .saturating_add(CHAT_COMMIT_DELAY)
        .saturating_add(SETTLE_MARGIN);
    let ended = tokio::select! {
        result = tokio::time::timeout(replay_length.saturating_add(settle), wait_for_session_end(&handle, &mut events)) => {
            match result {
                Ok(outcome) => {
                    outcome?;
                    true
                }
                Err(_) => false,
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, discarding session");
            handle.stop(false, false)?;
            true
        }
    };
    if !ended {
        tracing::info!("Script exhausted without an end of session, stopping");
        handle.stop(true, args.chat)?;
        if tokio::time::timeout(settle, wait_for_session_end(&handle, &mut events))
            .await
            .is_err()
        {
            tracing::warn!("Session did not settle");
        }
    }

    handle.shutdown()?;
    task.await?;

    tracing::info!(lines = instance.input().len(), "termvoice finished");
    Ok(())
}
