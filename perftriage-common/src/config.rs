//! Configuration loading and resolution
//!
//! Settings come from a single TOML file. The file location is resolved in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. `PERFTRIAGE_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/perftriage/config.toml` on Linux)
//! 4. Built-in defaults (no file)
//!
//! A missing file at priority 3 is not an error: defaults are used and a
//! warning is logged. A file named explicitly (priorities 1-2) must exist.

use crate::models::ThresholdConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PERFTRIAGE_CONFIG";

/// Environment variable overriding `logging.level`
pub const LOG_LEVEL_ENV_VAR: &str = "PERFTRIAGE_LOG_LEVEL";

/// Upper bound for concurrent generator calls
pub const MAX_SUGGESTION_CONCURRENCY: usize = 8;

/// Root of the TOML configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// SQLite database for stored analyses; required by `match --save` and `fetch`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    pub logging: LoggingConfig,

    /// Classification thresholds; all unset means relative ranking
    pub thresholds: ThresholdConfig,

    pub matcher: MatcherSettings,

    pub suggestions: SuggestionSettings,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or full filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// Output layout
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// Endpoint matcher tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
    /// Minimum score for a candidate pair (0.0-1.0)
    pub match_cutoff: f64,

    /// Added when HTTP methods agree or either side is unknown
    pub method_bonus: f64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            match_cutoff: 0.6,
            method_bonus: 0.15,
        }
    }
}

/// Remediation-suggestion orchestration settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionSettings {
    /// Concurrent generator calls (1-8)
    pub max_concurrency: usize,

    /// Per-call timeout in seconds
    pub call_timeout_secs: u64,

    /// Whole-batch deadline in seconds; unset means no deadline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_deadline_secs: Option<u64>,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            call_timeout_secs: 60,
            batch_deadline_secs: None,
        }
    }
}

impl TomlConfig {
    /// Validate cross-field constraints
    ///
    /// # Errors
    /// `Error::Config` for inverted thresholds, out-of-range matcher settings
    /// or a zero concurrency/timeout.
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        let m = &self.matcher;
        if !(0.0..=1.0).contains(&m.match_cutoff) {
            return Err(Error::Config(format!(
                "matcher.match_cutoff must be within 0.0-1.0 (got {})",
                m.match_cutoff
            )));
        }
        if !(0.0..=1.0).contains(&m.method_bonus) {
            return Err(Error::Config(format!(
                "matcher.method_bonus must be within 0.0-1.0 (got {})",
                m.method_bonus
            )));
        }

        let s = &self.suggestions;
        if s.max_concurrency == 0 || s.max_concurrency > MAX_SUGGESTION_CONCURRENCY {
            return Err(Error::Config(format!(
                "suggestions.max_concurrency must be within 1-{} (got {})",
                MAX_SUGGESTION_CONCURRENCY, s.max_concurrency
            )));
        }
        if s.call_timeout_secs == 0 {
            return Err(Error::Config(
                "suggestions.call_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Apply environment overrides on top of file values
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV_VAR) {
            if !level.trim().is_empty() {
                info!("Log level overridden by {}: {}", LOG_LEVEL_ENV_VAR, level);
                self.logging.level = level;
            }
        }
    }
}

/// Platform config file location (may not exist)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("perftriage").join("config.toml"))
}

/// Resolve which config file to read
///
/// Returns the path and whether it was named explicitly (CLI or ENV).
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<(PathBuf, bool)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), true));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some((PathBuf::from(path), true));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().map(|p| (p, false))
}

/// Parse a TOML config file
///
/// # Errors
/// `Error::Io` if the file cannot be read, `Error::Toml` on parse failure.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Resolve, load, override and validate the configuration
///
/// # Errors
/// `Error::Config` if an explicitly named file is missing or the result is
/// invalid; parse errors are propagated.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some((path, _)) if path.exists() => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(&path)?
        }
        Some((path, true)) => {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Some((path, false)) => {
            warn!(
                "No config file at {}, using built-in defaults",
                path.display()
            );
            TomlConfig::default()
        }
        None => {
            warn!("Could not determine config directory, using built-in defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Write a config file atomically (temp file + rename)
///
/// # Errors
/// `Error::Config` if serialization fails, `Error::Io` on filesystem errors.
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
