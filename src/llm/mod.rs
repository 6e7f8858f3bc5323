//! LLM module - Language Model integrations
//!
//! Provides the provider abstraction, the Ollama backend, and validation of
//! structured (schema-constrained) responses.

pub mod ollama;
pub mod structured;
pub mod traits;

pub use ollama::OllamaClient;
pub use structured::{FieldKind, OutputSchema, StructuredOutput};
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
