//! Bootstrap configuration for the lector reader
//!
//! Settings are read from a TOML file. Every key has a built-in default, so a
//! missing file (or a file that only sets a few keys) never prevents startup.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (applied by the binary on top of this struct)
//! 2. TOML configuration file (`--config PATH` or the platform default)
//! 3. Built-in defaults (code constants below)

use crate::text::CleanupRules;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Application directory name under the platform config directory
const APP_DIR: &str = "lector";

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Reader configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// TTS language code (e.g. "en", "de")
    pub language: String,

    /// Speaking speed requested from the TTS service
    pub tts_speed: f32,

    /// Maximum characters per TTS request
    pub tts_max_chars: usize,

    /// Drop the first comma of each TTS request piece
    pub tts_filter_commas: bool,

    /// Playback tempo (1.0 = unchanged duration)
    pub tempo: f32,

    /// Signed pitch offset; the playback pitch ratio is `1 + pitch`
    pub pitch: f32,

    /// Linear output gain, 0.0 - 1.0
    pub volume: f32,

    /// Negative values trim that many seconds from the end of every unit
    pub delay: f32,

    /// Skip units with fewer than three word-like tokens
    pub skip_words: bool,

    /// Remove URL-like substrings before synthesis
    pub skip_urls: bool,

    /// Remove citation-like brackets before synthesis
    pub skip_citations: bool,

    /// Synthesized units retained behind the play cursor
    pub max_history: usize,

    /// Synthesized units fetched ahead of the play cursor
    pub max_prefetch: usize,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            tts_speed: 1.0,
            tts_max_chars: 195,
            tts_filter_commas: false,
            tempo: 1.0,
            pitch: 0.0,
            volume: 1.0,
            delay: 0.0,
            skip_words: false,
            skip_urls: true,
            skip_citations: true,
            max_history: 5,
            max_prefetch: 2,
            logging: LoggingConfig::default(),
        }
    }
}

impl ReaderConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist and parse. Without one, the platform
    /// default location is tried and built-in defaults are used when no file
    /// is present there.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                Some(path) => {
                    info!("No config file at {}, using defaults", path.display());
                    Ok(Self::default())
                }
                None => {
                    warn!("Could not determine config directory, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Parse configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject values that would make playback or scheduling meaningless
    pub fn validate(&self) -> Result<()> {
        if !(self.tempo > 0.0) {
            return Err(Error::Config(format!("tempo must be positive, got {}", self.tempo)));
        }
        if !(self.pitch_ratio() > 0.0) {
            return Err(Error::Config(format!(
                "pitch offset {} yields a non-positive pitch ratio",
                self.pitch
            )));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(Error::Config(format!("volume must be within 0..=1, got {}", self.volume)));
        }
        if self.tts_max_chars < 2 {
            return Err(Error::Config("tts_max_chars must be at least 2".to_string()));
        }
        Ok(())
    }

    /// Multiplicative pitch ratio derived from the signed offset
    pub fn pitch_ratio(&self) -> f32 {
        1.0 + self.pitch
    }

    /// Trailing seconds trimmed from each synthesized unit
    pub fn cutoff_seconds(&self) -> f32 {
        (-self.delay).max(0.0)
    }

    /// Text cleanup rules selected by this configuration
    pub fn cleanup_rules(&self) -> CleanupRules {
        CleanupRules {
            filter_citations: self.skip_citations,
            filter_urls: self.skip_urls,
            filter_words: self.skip_words,
        }
    }
}

/// Default configuration file path for the platform
///
/// `~/.config/lector/config.toml` on Linux, the equivalent application
/// config directory elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}
