//! Configuration management for Cadence

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "GraphConfig::threads")]
    pub threads: GraphConfig,
    #[serde(default)]
    pub linkedin: LinkedinConfig,
    #[serde(default = "GraphConfig::instagram")]
    pub instagram: GraphConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// User the CLI tools act on behalf of
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
        }
    }
}

fn default_user_id() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Seconds between processing cycles in daemon mode
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    60
}

/// OpenAI-compatible chat completions endpoint used for content generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_generator_model")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_generator_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generator_endpoint(),
            model: default_generator_model(),
            api_key_env: default_generator_key_env(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

fn default_generator_endpoint() -> String {
    "https://ai.gateway.lovable.dev/v1/chat/completions".to_string()
}

fn default_generator_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

fn default_generator_key_env() -> String {
    "CADENCE_GENERATOR_API_KEY".to_string()
}

fn default_generator_timeout() -> u64 {
    60
}

impl GeneratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout applied to every outbound platform request
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Endpoint settings for the container-based graph APIs (Threads, Instagram)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub base_url: String,
    pub api_version: String,
    /// Minimum wait between container creation and publishing
    pub settle_delay_secs: u64,
    /// Media URL attached to Instagram containers, if any
    #[serde(default)]
    pub image_url: Option<String>,
}

impl GraphConfig {
    pub fn threads() -> Self {
        Self {
            base_url: "https://graph.threads.net".to_string(),
            api_version: "v1.0".to_string(),
            settle_delay_secs: 4,
            image_url: None,
        }
    }

    pub fn instagram() -> Self {
        Self {
            base_url: "https://graph.facebook.com".to_string(),
            api_version: "v21.0".to_string(),
            settle_delay_secs: 4,
            image_url: None,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkedinConfig {
    #[serde(default = "default_linkedin_base_url")]
    pub base_url: String,
}

impl Default for LinkedinConfig {
    fn default() -> Self {
        Self {
            base_url: default_linkedin_base_url(),
        }
    }
}

fn default_linkedin_base_url() -> String {
    "https://api.linkedin.com".to_string()
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file yields the built-in defaults. `CADENCE_DB_PATH`
    /// overrides the database path either way.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        let mut config = if config_path.exists() {
            Self::load_from_path(&config_path)?
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default_config()
        };

        if let Ok(db_path) = std::env::var("CADENCE_DB_PATH") {
            config.database.path = db_path;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/cadence/cadence.db".to_string(),
            },
            defaults: DefaultsConfig::default(),
            scheduling: SchedulingConfig::default(),
            generator: GeneratorConfig::default(),
            http: HttpConfig::default(),
            threads: GraphConfig::threads(),
            linkedin: LinkedinConfig::default(),
            instagram: GraphConfig::instagram(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        if self.scheduling.poll_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduling.poll_interval".to_string(),
                reason: "must be at least 1 second".to_string(),
            }
            .into());
        }
        if self.defaults.user_id.trim().is_empty() {
            return Err(ConfigError::MissingField("defaults.user_id".to_string()).into());
        }
        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CADENCE_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("cadence").join("config.toml"))
}
