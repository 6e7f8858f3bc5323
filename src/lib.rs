//! Conclave - Multi-Agent Question Answering
//!
//! Answers free-form questions by coordinating a planner, a researcher, a
//! domain expert, reviewing critics and a finalizer through one shared
//! session state per question, using Ollama for local LLM inference.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: LLM provider abstraction, Ollama implementation, structured output validation
//! - **Tools**: Tool registry with research and expert tools
//! - **Agent**: The orchestration state machine and its roles
//! - **CLI**: Batch driver and interactive prompt
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use conclave::llm::OllamaClient;
//! use conclave::tools::ToolRegistry;
//! use conclave::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> conclave::Result<()> {
//!     let config = Config::load();
//!     let llm = Arc::new(OllamaClient::from_config(&config)?);
//!     let tools = Arc::new(ToolRegistry::from_config(&config)?);
//!
//!     let orchestrator = Orchestrator::new(&config, llm, tools);
//!     let outcome = orchestrator.run("How many moons does Mars have?", None).await?;
//!     println!("{}", outcome.final_answer);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{Orchestrator, SessionOutcome, SessionState};
pub use core::{ConclaveError, Config, Result, RetryScope};
