//! Configuration management for Companion
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/companion/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::{CompanionError, Result};
use crate::llm::models::{find_preset, supported_model_names};

/// Main configuration for Companion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Model configuration
    #[serde(default)]
    pub model: ModelConfig,
    /// Agent configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Orchestration graph limits
    #[serde(default)]
    pub graph: GraphSettings,
    /// Conversation history storage
    #[serde(default)]
    pub history: HistoryConfig,
    /// Cluster API access
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Log filter
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier, must be one of the known presets
    pub name: String,
    /// Sampling temperature override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent identity; subtasks are matched against it
    pub name: String,
    /// System prompt override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Per-run limits for the orchestration graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSettings {
    /// Wall-clock budget for one step
    pub step_timeout_secs: u64,
    /// Maximum number of steps in one run
    pub recursion_limit: usize,
}

/// Where conversation history lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    Memory,
    File,
}

/// History storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub backend: HistoryBackend,
    /// Directory for the file backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Cluster API access
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// API server URL, e.g. https://api.cluster.example:6443
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server: Option<String>,
    /// Bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub filter: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 120,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: env::var("COMPANION_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
            temperature: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: env::var("COMPANION_AGENT").unwrap_or_else(|_| "k8s".to_string()),
            system_prompt: None,
        }
    }
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            step_timeout_secs: env::var("COMPANION_STEP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            recursion_limit: env::var("COMPANION_RECURSION_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(25),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        let backend = match env::var("COMPANION_HISTORY").as_deref() {
            Ok("file") => HistoryBackend::File,
            _ => HistoryBackend::Memory,
        };
        Self { backend, dir: None }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: env::var("COMPANION_LOG").unwrap_or_else(|_| "warn".to_string()),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("companion")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        if let Ok(config) = Self::load_from_file() {
            return config;
        }

        Self::default()
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(CompanionError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| CompanionError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CompanionError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                CompanionError::config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CompanionError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| CompanionError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Reject option values the runtime cannot honor
    pub fn validate(&self) -> Result<()> {
        if find_preset(&self.model.name).is_none() {
            return Err(CompanionError::UnsupportedModel {
                name: self.model.name.clone(),
                valid: supported_model_names(),
            });
        }
        if self.graph.recursion_limit < 2 {
            return Err(CompanionError::config(format!(
                "recursion_limit must be at least 2, got {}",
                self.graph.recursion_limit
            )));
        }
        if self.graph.step_timeout_secs == 0 {
            return Err(CompanionError::config("step_timeout_secs must be positive"));
        }
        Ok(())
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    /// History directory for the file backend
    pub fn history_dir(&self) -> PathBuf {
        self.history
            .dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("history"))
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

impl GraphSettings {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}
