use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::biometric::{Authenticators, PromptInfo, PromptInfoError};
use crate::policy::DEFAULT_IDLE_THRESHOLD;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GateConfig {
    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,

    #[serde(default = "default_prompt_title")]
    pub prompt_title: String,

    #[serde(default = "default_prompt_subtitle")]
    pub prompt_subtitle: String,

    #[serde(default)]
    pub prompt_description: Option<String>,

    #[serde(default)]
    pub confirmation_required: bool,

    #[serde(default)]
    pub authenticators: Authenticators,

    #[serde(default)]
    pub negative_button_text: Option<String>,

    #[serde(default = "default_timestamp_key")]
    pub timestamp_key: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_idle_threshold_secs() -> u64 {
    DEFAULT_IDLE_THRESHOLD.as_secs()
}

fn default_prompt_title() -> String {
    "Biometric login".to_string()
}

fn default_prompt_subtitle() -> String {
    "Log in using your biometric credential".to_string()
}

fn default_timestamp_key() -> String {
    "last_authenticate_time".to_string()
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".applock")
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            idle_threshold_secs: default_idle_threshold_secs(),
            prompt_title: default_prompt_title(),
            prompt_subtitle: default_prompt_subtitle(),
            prompt_description: None,
            confirmation_required: false,
            authenticators: Authenticators::default(),
            negative_button_text: None,
            timestamp_key: default_timestamp_key(),
            data_dir: default_data_dir(),
        }
    }
}

impl GateConfig {
    /// Load `config.json` from the default data directory, writing the
    /// defaults there on first run
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = GateConfig::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        default_data_dir().join("config.json")
    }

    /// Path of the preferences database inside `data_dir`
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("prefs.db")
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn prompt_info(&self) -> Result<PromptInfo, PromptInfoError> {
        let mut builder = PromptInfo::builder(&self.prompt_title)
            .subtitle(&self.prompt_subtitle)
            .allowed_authenticators(self.authenticators)
            .confirmation_required(self.confirmation_required);

        if let Some(description) = &self.prompt_description {
            builder = builder.description(description);
        }
        if let Some(text) = &self.negative_button_text {
            builder = builder.negative_button_text(text);
        }

        builder.build()
    }

    /// Resolve into the fixed settings a gate runs with
    pub fn settings(&self) -> Result<GateSettings, PromptInfoError> {
        Ok(GateSettings {
            idle_threshold: self.idle_threshold(),
            prompt_info: self.prompt_info()?,
            timestamp_key: self.timestamp_key.clone(),
        })
    }
}

/// Validated, immutable gate settings
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub(crate) idle_threshold: Duration,
    pub(crate) prompt_info: PromptInfo,
    pub(crate) timestamp_key: String,
}

impl GateSettings {
    /// Background time after which a prompt is required
    pub fn idle_threshold(&self) -> Duration {
        self.idle_threshold
    }

    /// Dialog shown on every prompt
    pub fn prompt_info(&self) -> &PromptInfo {
        &self.prompt_info
    }

    /// Classes used for capability queries and enrollment
    pub fn authenticators(&self) -> Authenticators {
        self.prompt_info.allowed_authenticators()
    }

    /// Store key holding the last authentication time
    pub fn timestamp_key(&self) -> &str {
        &self.timestamp_key
    }
}
