//! Configuration loading and resolution
//!
//! One `PipelineConfig` value is built at startup and handed to each stage.
//! Every field has a built-in default, so a missing or partial TOML file is
//! never fatal.
//!
//! # Config file priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`EMOSORT_CONFIG`)
//! 3. Platform config directory (`~/.config/emosort/config.toml` on Linux)
//! 4. Built-in defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "EMOSORT_CONFIG";

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Working folders used by the end-to-end run
    pub paths: PathsConfig,
    /// Duration filter settings
    pub filter: FilterConfig,
    /// Emotion recognition settings
    pub recognize: RecognizeConfig,
    /// Routing settings
    pub classify: ClassifyConfig,
    /// External service endpoints
    pub services: ServicesConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Default working folders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw clip folder (one sub-folder per character)
    pub input_folder: PathBuf,
    /// Destination of the duration filter
    pub filtered_folder: PathBuf,
    /// Recognition ledger file
    pub ledger_file: PathBuf,
    /// Root of the emotion bucket tree
    pub output_folder: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_folder: PathBuf::from("input"),
            filtered_folder: PathBuf::from("referenceaudio"),
            ledger_file: PathBuf::from("csv_opt").join("recognition_result.csv"),
            output_folder: PathBuf::from("output"),
        }
    }
}

/// What happens to a clip whose duration falls outside the accepted interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardPolicy {
    /// Leave the source file untouched; it is simply not copied forward
    #[default]
    LeaveSource,
    /// Delete the rejected source file
    DeleteSource,
}

/// Duration filter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Lower bound in seconds (inclusive)
    pub min_duration: f64,
    /// Upper bound in seconds (inclusive)
    pub max_duration: f64,
    /// Accept every clip at its original location without probing
    pub disable_filter: bool,
    /// Treatment of rejected source files
    pub discard_policy: DiscardPolicy,
    /// Nest the destination under the source folder name when the source
    /// root has more immediate children than this
    pub nest_threshold: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_duration: 3.0,
            max_duration: 10.0,
            disable_filter: false,
            discard_policy: DiscardPolicy::LeaveSource,
            nest_threshold: 5,
        }
    }
}

/// Emotion recognition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizeConfig {
    /// Maximum in-flight recognition requests
    pub batch_size: usize,
    /// Maximum concurrent decode/resample jobs
    pub num_workers: usize,
    /// Model revision forwarded to the recognition service
    pub model_revision: String,
    /// Sample rate expected by the recognition service (Hz)
    pub target_sample_rate: u32,
    /// Skip the text-emotion column
    pub disable_text_emotion: bool,
}

impl Default for RecognizeConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            num_workers: 4,
            model_revision: "v2.0.4".to_string(),
            target_sample_rate: 16_000,
            disable_text_emotion: false,
        }
    }
}

/// Routing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Copy worker pool size
    pub num_workers: usize,
    /// Label that always passes the audio/text consistency check
    pub neutral_label: String,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            neutral_label: "中立".to_string(),
        }
    }
}

/// External recognition/classification service endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Speech emotion recognition endpoint
    pub emotion_url: String,
    /// Text emotion classification endpoint
    pub text_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Optional client-side request rate cap
    pub max_requests_per_second: Option<u32>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            emotion_url: "http://127.0.0.1:9976/emotion".to_string(),
            text_url: "http://127.0.0.1:9976/text-emotion".to_string(),
            request_timeout_secs: 30,
            max_requests_per_second: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

impl PipelineConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve and load configuration following the documented priority
    ///
    /// An explicitly named file (argument or environment) must exist; the
    /// platform default location is optional and falls back to defaults.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_arg {
            info!("Loading config from {}", path.display());
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            info!("Loading config from {} ({})", path.display(), CONFIG_ENV_VAR);
            return Self::load(&path);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => {
                warn!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let f = &self.filter;
        if !(f.min_duration >= 0.0 && f.max_duration >= 0.0) {
            return Err(Error::Config(format!(
                "Durations must be non-negative (min={}, max={})",
                f.min_duration, f.max_duration
            )));
        }
        if f.min_duration > f.max_duration {
            return Err(Error::Config(format!(
                "min_duration {} exceeds max_duration {}",
                f.min_duration, f.max_duration
            )));
        }
        if self.recognize.batch_size == 0 {
            return Err(Error::Config("recognize.batch_size must be at least 1".to_string()));
        }
        if self.recognize.num_workers == 0 {
            return Err(Error::Config("recognize.num_workers must be at least 1".to_string()));
        }
        if self.classify.num_workers == 0 {
            return Err(Error::Config("classify.num_workers must be at least 1".to_string()));
        }
        if self.recognize.target_sample_rate == 0 {
            return Err(Error::Config("recognize.target_sample_rate must be positive".to_string()));
        }
        if self.services.request_timeout_secs == 0 {
            return Err(Error::Config(
                "services.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("emosort").join("config.toml"))
}
