//! CLI argument definitions for the termvoice binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// termvoice: replay a scripted recognition session against a logging console.
#[derive(Parser, Debug)]
#[command(name = "termvoice", version, about)]
pub struct CliArgs {
    /// JSON-lines script of `{"delay_ms": N, "event": {...}}` steps.
    pub script: PathBuf,

    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Run the session in chat mode: accept on the first final result.
    #[arg(long = "chat")]
    pub chat: bool,

    /// Silence timeout in milliseconds, overriding the config file. 0 disables auto-commit.
    #[arg(short = 't', long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Width of the simulated console in columns.
    #[arg(long = "columns", default_value_t = 80)]
    pub columns: u16,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TERMVOICE_CONFIG env var > platform default (~/.termvoice/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TERMVOICE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: Option<&str>) -> String {
        self.log_level
            .clone()
            .or_else(|| config_level.map(str::to_string))
            .unwrap_or_else(|| "info".to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".termvoice").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".termvoice").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_arguments() {
        let args = CliArgs::try_parse_from([
            "termvoice",
            "session.jsonl",
            "--config",
            "/tmp/tv.toml",
            "--log-level",
            "debug",
            "--chat",
            "--timeout-ms",
            "0",
        ])
        .unwrap();
        assert_eq!(args.script, PathBuf::from("session.jsonl"));
        assert!(args.chat);
        assert_eq!(args.timeout_ms, Some(0));
        assert_eq!(args.columns, 80);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/tv.toml"));
        assert_eq!(args.resolve_log_level(Some("warn")), "debug");
    }

    #[test]
    fn test_script_is_required() {
        assert!(CliArgs::try_parse_from(["termvoice"]).is_err());
    }

    #[test]
    fn test_log_level_falls_back_to_config_then_info() {
        let args = CliArgs::try_parse_from(["termvoice", "s.jsonl"]).unwrap();
        assert_eq!(args.resolve_log_level(Some("trace")), "trace");
        assert_eq!(args.resolve_log_level(None), "info");
    }

    #[test]
    fn test_default_config_path_ends_with_config_toml() {
        let path = default_config_path();
        assert!(path.ends_with("config.toml"));
    }
}
