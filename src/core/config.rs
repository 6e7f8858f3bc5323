//! Configuration management for Conclave
//!
//! Supports environment variables, config files, and runtime overrides.
//! Every role gets its own model binding and the workflow limits live here
//! so each session can copy them into its own state.
//!
//! Config file location: ~/.config/conclave/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{ConclaveError, Result};

/// Main configuration for Conclave
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ollama configuration
    pub ollama: OllamaConfig,
    /// Per-role model bindings
    pub roles: RolesConfig,
    /// Orchestration limits
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// Capability provider settings
    #[serde(default)]
    pub tools: ToolsConfig,
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

/// Model binding for a single role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Model identifier
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Replaces the built-in system prompt when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl RoleConfig {
    fn with_temperature(temperature: f32) -> Self {
        Self {
            model: default_model(),
            temperature,
            system_prompt: None,
        }
    }
}

/// Model bindings for every role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesConfig {
    pub planner: RoleConfig,
    pub researcher: RoleConfig,
    pub expert: RoleConfig,
    /// Shared by the three critic roles
    pub critic: RoleConfig,
    pub finalizer: RoleConfig,
}

/// How rejections are counted against the retry budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryScope {
    /// One counter shared by planner, researcher and expert
    #[default]
    Shared,
    /// An independent counter per reviewed role
    PerRole,
}

impl std::str::FromStr for RetryScope {
    type Err = ConclaveError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "shared" => Ok(Self::Shared),
            "per_role" | "per-role" => Ok(Self::PerRole),
            other => Err(ConclaveError::config(format!(
                "unknown retry scope '{}', expected 'shared' or 'per_role'",
                other
            ))),
        }
    }
}

/// Orchestration limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Rejections allowed before the session is finalized as failed
    /// Default: 5
    pub retry_limit: u32,
    /// Whether the retry counter is shared across roles
    #[serde(default)]
    pub retry_scope: RetryScope,
    /// Hard cap on reasoning iterations inside one researcher/expert run
    /// Default: 10
    pub max_subworkflow_iterations: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            retry_limit: env::var("CONCLAVE_RETRY_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            retry_scope: RetryScope::default(),
            max_subworkflow_iterations: env::var("CONCLAVE_MAX_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}

/// Capability provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tavily key; `web_search` is only registered when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tavily_api_key: Option<String>,
    /// Wikipedia language edition
    pub wikipedia_language: String,
    /// Whether the expert may run Python snippets
    pub python_enabled: bool,
    /// Python interpreter to invoke
    pub python_bin: String,
    /// Timeout for outbound tool HTTP requests
    pub http_timeout_secs: u64,
    /// Tool output is truncated to this many characters
    pub max_output_chars: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: env::var("TAVILY_API_KEY").ok().filter(|k| !k.is_empty()),
            wikipedia_language: "en".to_string(),
            python_enabled: true,
            python_bin: "python3".to_string(),
            http_timeout_secs: 30,
            max_output_chars: 8000,
        }
    }
}

fn default_model() -> String {
    env::var("CONCLAVE_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            roles: RolesConfig::default(),
            workflow: WorkflowConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
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

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            planner: RoleConfig::with_temperature(0.2),
            researcher: RoleConfig::with_temperature(0.3),
            expert: RoleConfig::with_temperature(0.2),
            critic: RoleConfig::with_temperature(0.0),
            finalizer: RoleConfig::with_temperature(0.0),
        }
    }
}

impl RolesConfig {
    /// Point every role at the same model
    pub fn set_model(&mut self, model: impl Into<String>) {
        let model = model.into();
        for role in [
            &mut self.planner,
            &mut self.researcher,
            &mut self.expert,
            &mut self.critic,
            &mut self.finalizer,
        ] {
            role.model = model.clone();
        }
    }

    /// Distinct models referenced by the roles
    pub fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = [
            &self.planner,
            &self.researcher,
            &self.expert,
            &self.critic,
            &self.finalizer,
        ]
        .iter()
        .map(|r| r.model.clone())
        .collect();
        models.sort();
        models.dedup();
        models
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conclave")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(ConclaveError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| ConclaveError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConclaveError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workflow.max_subworkflow_iterations == 0 {
            return Err(ConclaveError::config(
                "workflow.max_subworkflow_iterations must be at least 1",
            ));
        }
        if self.roles.models().iter().any(|m| m.trim().is_empty()) {
            return Err(ConclaveError::config("every role needs a model"));
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_file();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| {
                    ConclaveError::config(format!("Failed to create config dir: {}", e))
                })?;
            }
        }

        fs::write(path, self.to_toml()?)
            .map_err(|e| ConclaveError::config(format!("Failed to write config: {}", e)))
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConclaveError::config(format!("Failed to serialize config: {}", e)))
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }
}
