//! CLI module - command-line drivers
//!
//! Contains the batch driver and its scoring, the interactive prompt and its
//! commands.

pub mod batch;
pub mod commands;
pub mod repl;
pub mod scoring;

pub use batch::{run_batch_file, BatchAnswer, BatchSummary, BatchTask};
pub use repl::Repl;
pub use scoring::ScoreReport;
