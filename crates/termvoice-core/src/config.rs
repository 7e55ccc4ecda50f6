use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TermVoiceError};

/// Configuration key holding the silence timeout in milliseconds.
pub const SPEECH_TIMEOUT_KEY: &str = "voice.speech_timeout_ms";

/// Configuration key holding the accept hint shown in chat mode.
pub const CHAT_HINT_KEY: &str = "voice.chat_hint_text";

/// Configuration key holding the canned preview shown in chat mode.
pub const CHAT_PREVIEW_KEY: &str = "voice.chat_preview_text";

/// Silence timeout used when the stored value is missing or unusable.
pub const DEFAULT_SPEECH_TIMEOUT_MS: u64 = 1200;

pub const DEFAULT_CHAT_HINT: &str = "Voice input accepted";
pub const DEFAULT_CHAT_PREVIEW: &str = "Inserting dictated text";

/// Read-only access to configuration values by dotted key.
///
/// Values are returned untyped: callers decide what to do with a value of
/// the wrong type. The session controller, for example, falls back to a
/// default timeout rather than failing.
pub trait ConfigProvider: Send + Sync {
    fn get_value(&self, key: &str) -> Option<toml::Value>;

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get_value(key)? {
            toml::Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Resolve the silence timeout from configuration.
///
/// Missing, negative, or non-numeric values resolve to
/// [`DEFAULT_SPEECH_TIMEOUT_MS`]. Zero is valid and disables auto-commit.
pub fn resolve_speech_timeout(provider: &dyn ConfigProvider) -> Duration {
    let millis = match provider.get_value(SPEECH_TIMEOUT_KEY) {
        Some(toml::Value::Integer(ms)) if ms >= 0 => ms as u64,
        Some(toml::Value::Float(ms)) if ms.is_finite() && ms >= 0.0 => ms.round() as u64,
        Some(other) => {
            debug!(value = %other, "Unusable speech timeout, using default");
            DEFAULT_SPEECH_TIMEOUT_MS
        }
        None => DEFAULT_SPEECH_TIMEOUT_MS,
    };
    Duration::from_millis(millis)
}

/// Top-level configuration for termvoice.
///
/// Loaded from `~/.termvoice/config.toml` by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermVoiceConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

impl TermVoiceConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TermVoiceConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TermVoiceError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

impl ConfigProvider for TermVoiceConfig {
    fn get_value(&self, key: &str) -> Option<toml::Value> {
        let root = match toml::Value::try_from(self) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to serialize configuration for lookup");
                return None;
            }
        };
        key.split('.')
            .try_fold(&root, |value, part| value.get(part))
            .cloned()
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Voice session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Silence timeout in milliseconds before auto-commit. Kept untyped so a
    /// bad value falls back at session start instead of rejecting the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_timeout_ms: Option<toml::Value>,
    /// Text of the accept hint shown in chat mode.
    pub chat_hint_text: String,
    /// Canned preview shown while a chat-mode commit is pending.
    pub chat_preview_text: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            speech_timeout_ms: Some(toml::Value::Integer(DEFAULT_SPEECH_TIMEOUT_MS as i64)),
            chat_hint_text: DEFAULT_CHAT_HINT.to_string(),
            chat_preview_text: DEFAULT_CHAT_PREVIEW.to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
