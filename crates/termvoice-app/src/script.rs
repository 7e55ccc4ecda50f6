//! Scripted recognition sessions.
//!
//! A script is a JSON-lines file; each line is one step:
//!
//! ```text
//! {"delay_ms": 300, "event": {"status": "recognizing", "text": "git"}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. `ScriptSpeechService`
//! replays the steps as a recognition stream, sleeping `delay_ms` before each.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use termvoice_core::error::{Result, TermVoiceError};
use termvoice_core::events::RecognitionEvent;
use termvoice_session::{RecognitionStream, SpeechService};

const STREAM_CAPACITY: usize = 64;

/// One scripted recognition event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Delay before the event, relative to the previous step.
    #[serde(default)]
    pub delay_ms: u64,
    pub event: RecognitionEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn parse(source: &str) -> Result<Self> {
        let mut steps = Vec::new();
        for (index, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step: ScriptStep = serde_json::from_str(line).map_err(|e| {
                TermVoiceError::Serialization(format!("script line {}: {}", index + 1, e))
            })?;
            steps.push(step);
        }
        Ok(Self { steps })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let script = Self::parse(&source)?;
        tracing::info!(path = %path.display(), steps = script.steps.len(), "Script loaded");
        Ok(script)
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Total time the replay takes, saturating at `u64::MAX` milliseconds.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(
            self.steps
                .iter()
                .map(|s| s.delay_ms)
                .fold(0, u64::saturating_add),
        )
    }
}

/// Speech service that replays a [`Script`] for every session it opens.
#[derive(Debug, Clone)]
pub struct ScriptSpeechService {
    script: Arc<Script>,
}

impl ScriptSpeechService {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
        }
    }
}

#[async_trait]
impl SpeechService for ScriptSpeechService {
    async fn create_session(&self, token: CancellationToken) -> Result<RecognitionStream> {
        if self.script.steps.is_empty() {
            return Err(TermVoiceError::Speech("Script has no events".to_string()));
        }
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let script = Arc::clone(&self.script);
        tokio::spawn(async move {
            for step in script.steps() {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("Script replay cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(step.delay_ms)) => {}
                }
                tracing::trace!(event = step.event.kind(), "Replaying recognition event");
                if tx.send(step.event.clone()).await.is_err() {
                    return;
                }
            }
            tracing::debug!("Script replay finished");
        });
        Ok(rx)
    }
}
