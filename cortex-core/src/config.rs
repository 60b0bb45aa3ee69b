//! Configuration types for the Cortex runtime

use crate::error::{CortexError, Result};
use crate::prompts::CAPABILITY_INSTRUCTIONS;
use crate::router::DEFAULT_TOP_K;
use crate::tools::{ExecutorConfig, TimeoutMode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CortexConfig {
    /// Loop controller settings
    pub agent: AgentConfig,

    /// Capability registry settings
    pub registry: RegistryConfig,

    /// Embeddings provider configuration (optional; hashing embeddings
    /// are used when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<EmbeddingsConfig>,
}

/// Loop controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name used in telemetry
    pub name: String,

    /// Reasoning turns allowed per `chat` call
    pub max_iterations: usize,

    /// Deadline for a single action
    #[serde(with = "humantime_serde")]
    pub action_timeout: Duration,

    /// Timeout strategy selection
    pub timeout_mode: TimeoutMode,

    /// Feed action errors back to the model instead of ending the turn
    pub continue_on_error: bool,

    /// Input sent when the model asks to continue
    pub continuation_prompt: String,

    /// Replaces the default capability instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "cortex".to_string(),
            max_iterations: 3,
            action_timeout: Duration::from_secs(10),
            timeout_mode: TimeoutMode::Auto,
            continue_on_error: false,
            continuation_prompt: "Please continue.".to_string(),
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn with_timeout_mode(mut self, mode: TimeoutMode) -> Self {
        self.timeout_mode = mode;
        self
    }

    pub fn with_continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Executor settings derived from this config
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::default()
            .with_timeout(self.action_timeout)
            .with_mode(self.timeout_mode)
    }

    /// Configured system prompt, or the default instructions
    pub fn base_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(CAPABILITY_INSTRUCTIONS)
    }
}

/// Capability registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Capabilities returned per discovery query
    pub default_top_k: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic feature hashing, no model required
    #[default]
    Hashing,
    /// fastembed model (feature `embeddings-local`)
    Local,
}

/// Embeddings configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Provider type
    pub provider: EmbeddingProviderKind,

    /// Model name (local provider)
    pub model: String,

    /// Vector length (hashing provider)
    pub dimension: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hashing,
            model: "all-MiniLM-L6-v2".to_string(),
            dimension: crate::embeddings::providers::hashing::DEFAULT_HASHING_DIMENSION,
        }
    }
}

impl CortexConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (cortex.toml, then the path in CORTEX_CONFIG_PATH)
    /// 3. Environment variable overrides (`CORTEX_AGENT__MAX_ITERATIONS=5`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or the merged
    /// result fails validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(CortexConfig::default()))
            .merge(Toml::file("cortex.toml"));

        if let Ok(path) = std::env::var("CORTEX_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: CortexConfig = figment
            .merge(Env::prefixed("CORTEX_").ignore(&["config_path"]).split("__"))
            .extract()
            .map_err(|e| {
                CortexError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: CortexConfig = Figment::from(Serialized::defaults(CortexConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                CortexError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(CortexError::Configuration(
                "agent.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.agent.action_timeout.is_zero() {
            return Err(CortexError::Configuration(
                "agent.action_timeout must be greater than zero".to_string(),
            ));
        }
        if self.registry.default_top_k == 0 {
            return Err(CortexError::Configuration(
                "registry.default_top_k must be at least 1".to_string(),
            ));
        }
        if let Some(embeddings) = &self.embeddings
            && embeddings.provider == EmbeddingProviderKind::Hashing
            && embeddings.dimension == 0
        {
            return Err(CortexError::Configuration(
                "embeddings.dimension must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
