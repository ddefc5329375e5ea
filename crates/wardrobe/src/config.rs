use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cutout::DEFAULT_CONTROL_BAR_HEIGHT;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tryon::{DEFAULT_JPEG_QUALITY, PollPolicy};

use crate::error::ConfigError;

/// Remote try-on service settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Environment variable holding the bearer token
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.fashn.ai/v1".to_string(),
            api_key_env: "TRYON_API_KEY".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Poll cadence and overall budget of one flow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FlowConfig {
    #[schemars(range(min = 0.1))]
    pub poll_interval_secs: f64,
    #[schemars(range(min = 1.0))]
    pub budget_secs: f64,
}

impl FlowConfig {
    fn from_policy(policy: PollPolicy) -> Self {
        Self {
            poll_interval_secs: policy.interval.as_secs_f64(),
            budget_secs: policy.budget.as_secs_f64(),
        }
    }

    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs_f64(self.poll_interval_secs.max(0.0)),
            Duration::from_secs_f64(self.budget_secs.max(0.0)),
        )
    }
}

fn outfit_flow() -> FlowConfig {
    FlowConfig::from_policy(PollPolicy::OUTFIT)
}

fn single_flow() -> FlowConfig {
    FlowConfig::from_policy(PollPolicy::SINGLE)
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct MaskingConfig {
    /// Height reserved below the photo for drawing controls
    pub control_bar_height: f64,
    #[schemars(range(min = 1, max = 100))]
    pub jpeg_quality: u8,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            control_bar_height: DEFAULT_CONTROL_BAR_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the record collections and image files
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("closet-data"),
        }
    }
}

/// Application configuration; every field has a default
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default = "outfit_flow")]
    pub outfit_flow: FlowConfig,
    #[serde(default = "single_flow")]
    pub single_flow: FlowConfig,
    pub masking: MaskingConfig,
    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            outfit_flow: outfit_flow(),
            single_flow: single_flow(),
            masking: MaskingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    /// JSON schema of the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AppConfig)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&fs::read_to_string(path)?),
            Some("json") => Self::from_json(&fs::read_to_string(path)?),
            _ => Err(ConfigError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn outfit_policy(&self) -> PollPolicy {
        self.outfit_flow.policy()
    }

    pub fn single_policy(&self) -> PollPolicy {
        self.single_flow.policy()
    }
}
