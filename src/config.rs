//! Compiler configuration
//!
//! Stored in `~/.config/flowc/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Command-line flags
//! 2. Environment variables (`FLOWC_*`, a `.env` file is honored by the binary)
//! 3. Config file
//! 4. Defaults

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::emit::OutputFormat;
use crate::error::{FlowcError, Result};
use crate::util::constants::{AUGMENT_MAX_RETRIES, AUGMENT_TIMEOUT, DEFAULT_MAX_FILE_SIZE};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FlowcConfig {
    #[serde(default)]
    pub compile: CompileConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub augment: AugmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompileConfig {
    /// Unreachable tasks are errors rather than warnings
    pub strict: bool,
    /// Largest accepted source file, in bytes
    pub max_file_size: u64,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            strict: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// JSON on one line
    pub compact: bool,
    /// Stamp documents with the compile time (breaks byte-identical output)
    pub timestamp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AugmentConfig {
    pub enabled: bool,
    /// Fail the compilation instead of degrading when augmentation fails
    pub mandatory: bool,
    /// OpenAI-compatible base URL (`/chat/completions` is appended)
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mandatory: false,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: AUGMENT_TIMEOUT.as_secs(),
            max_retries: AUGMENT_MAX_RETRIES,
        }
    }
}

impl FlowcConfig {
    /// Returns `~/.config/flowc/` on Unix, `%APPDATA%/flowc/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flowc")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default path; defaults when the file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from a specific file; defaults when it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| FlowcError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        toml::from_str(&content).map_err(|e| FlowcError::ConfigError {
            reason: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    /// Write to a file, creating the parent directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| FlowcError::ConfigError {
                reason: format!("Failed to create config directory: {}", e),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| FlowcError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| FlowcError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })
    }

    /// Merge with `FLOWC_*` environment variables
    ///
    /// Empty variables are ignored; unparseable ones are ignored with a warning.
    pub fn with_env(mut self) -> Self {
        if let Some(v) = env_parsed::<BoolFlag>("FLOWC_STRICT") {
            self.compile.strict = v.0;
        }
        if let Some(v) = env_parsed("FLOWC_MAX_FILE_SIZE") {
            self.compile.max_file_size = v;
        }
        if let Some(v) = env_parsed("FLOWC_FORMAT") {
            self.output.format = v;
        }
        if let Some(v) = env_parsed::<BoolFlag>("FLOWC_AUGMENT") {
            self.augment.enabled = v.0;
        }
        if let Some(v) = env_parsed::<BoolFlag>("FLOWC_AUGMENT_MANDATORY") {
            self.augment.mandatory = v.0;
        }
        if let Some(v) = env_value("FLOWC_AUGMENT_ENDPOINT") {
            self.augment.endpoint = v;
        }
        if let Some(v) = env_value("FLOWC_AUGMENT_MODEL") {
            self.augment.model = v;
        }
        if let Some(v) = env_value("FLOWC_AUGMENT_API_KEY") {
            self.augment.api_key = Some(v);
        }
        if let Some(v) = env_parsed("FLOWC_AUGMENT_TIMEOUT") {
            self.augment.timeout_secs = v;
        }
        self
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.compile.max_file_size == 0 {
            return Err(FlowcError::ConfigError {
                reason: "compile.max_file_size must be greater than 0".to_string(),
            });
        }
        if self.augment.timeout_secs == 0 {
            return Err(FlowcError::ConfigError {
                reason: "augment.timeout_secs must be greater than 0".to_string(),
            });
        }

        let url = url::Url::parse(&self.augment.endpoint).map_err(|e| FlowcError::ConfigError {
            reason: format!("augment.endpoint '{}' is not a URL: {}", self.augment.endpoint, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FlowcError::ConfigError {
                reason: format!(
                    "augment.endpoint must use http or https, got '{}'",
                    url.scheme()
                ),
            });
        }
        Ok(())
    }

    /// Copy safe to print: the API key is masked
    pub fn masked(&self) -> Self {
        let mut config = self.clone();
        config.augment.api_key = config.augment.api_key.map(|k| mask_api_key(&k, 6));
        config
    }
}

impl fmt::Display for FlowcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = toml::to_string_pretty(&self.masked()).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// Mask an API key for display
///
/// Shows first N chars + asterisks, e.g. "sk-pro***"
pub fn mask_api_key(key: &str, visible_chars: usize) -> String {
    if key.is_empty() {
        return String::new();
    }
    let visible: String = key.chars().take(visible_chars).collect();
    format!("{}***", visible)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: FromStr>(name: &str) -> Option<T> {
    let raw = env_value(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable environment variable");
            None
        }
    }
}

/// `1/true/yes/on` and `0/false/no/off`, case-insensitive
struct BoolFlag(bool);

impl FromStr for BoolFlag {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(BoolFlag(true)),
            "0" | "false" | "no" | "off" => Ok(BoolFlag(false)),
            _ => Err(()),
        }
    }
}
