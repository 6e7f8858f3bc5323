//! Custom error types for Conclave
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Conclave operations
#[derive(Error, Debug)]
pub enum ConclaveError {
    /// Malformed session state or agent message
    #[error("Validation error: {0}")]
    Validation(String),

    /// Structured output parsed but did not match the declared fields
    #[error("{component}: schema violation: {message}")]
    SchemaViolation { component: String, message: String },

    /// Structured output could not be parsed even after local repair
    #[error("{component}: malformed structured output: {message}")]
    MalformedOutput { component: String, message: String },

    /// Language model or tool call failed
    #[error("External service error: {0}")]
    ExternalService(String),

    /// The tool-calling loop hit its hard iteration cap
    #[error("{role} exceeded the sub-workflow iteration cap of {limit}")]
    SubworkflowIterationExceeded { role: String, limit: usize },

    /// The orchestrator retry budget is spent
    #[error("Retry limit of {limit} exceeded for {role}")]
    RetryLimitExceeded { role: String, limit: u32 },

    /// Model not available
    #[error("Model '{0}' not available in Ollama. Run: ollama pull {0}")]
    ModelNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Conclave operations
pub type Result<T> = std::result::Result<T, ConclaveError>;

impl ConclaveError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an external service error
    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a schema violation error for a component
    pub fn schema(component: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SchemaViolation {
            component: component.into(),
            message: msg.into(),
        }
    }

    /// Create a malformed output error for a component
    pub fn malformed(component: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MalformedOutput {
            component: component.into(),
            message: msg.into(),
        }
    }

    /// Whether the orchestrator may retry the failing role.
    ///
    /// Non-recoverable errors route the session straight to the finalizer.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::MalformedOutput { .. }
                | Self::SubworkflowIterationExceeded { .. }
                | Self::RetryLimitExceeded { .. }
        )
    }

    /// Short kind label used in error records and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::SchemaViolation { .. } => "schema_violation",
            Self::MalformedOutput { .. } => "malformed_output",
            Self::ExternalService(_) | Self::Http(_) | Self::ModelNotFound(_) => {
                "external_service"
            }
            Self::SubworkflowIterationExceeded { .. } => "subworkflow_iteration_exceeded",
            Self::RetryLimitExceeded { .. } => "retry_limit_exceeded",
            Self::Config(_) => "config",
            Self::Json(_) => "json",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}
