//! Conclave - multi-agent question answering
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use conclave::cli::{run_batch_file, Repl};
use conclave::llm::{LLMProvider, OllamaClient};
use conclave::tools::ToolRegistry;
use conclave::{Config, Orchestrator, RetryScope};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Conclave - answers questions with a planner, researcher, expert, critics and a finalizer
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Answer a single question and exit
    #[arg(long, short = 'q')]
    question: Option<String>,

    /// File attached to the question
    #[arg(long, short = 'f', requires = "question")]
    file: Option<PathBuf>,

    /// JSONL file of {task_id, Question, file_name, Final answer?} lines
    #[arg(long, requires = "output")]
    batch: Option<PathBuf>,

    /// Where batch answers are written
    #[arg(long)]
    output: Option<PathBuf>,

    /// Questions answered concurrently in batch mode
    #[arg(long, short = 'j', default_value_t = 1)]
    jobs: usize,

    /// Directory holding batch attachments
    #[arg(long)]
    attachments_dir: Option<PathBuf>,

    /// Model used for every role
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Rejections allowed per question
    #[arg(long)]
    retry_limit: Option<u32>,

    /// Count retries per role instead of one shared counter (shared | per_role)
    #[arg(long)]
    retry_scope: Option<RetryScope>,

    /// Tool-calling iteration cap for researcher and expert
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Enable debug logging
    #[arg(long, short = 'd')]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(debug: bool, json: bool) {
    let default = if debug { "conclave=debug" } else { "conclave=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug, args.log_json);

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.roles.set_model(model.clone());
    }
    if let Some(limit) = args.retry_limit {
        config.workflow.retry_limit = limit;
    }
    if let Some(scope) = args.retry_scope {
        config.workflow.retry_scope = scope;
    }
    if let Some(max) = args.max_iterations {
        config.workflow.max_subworkflow_iterations = max;
    }
    config.validate()?;

    let llm: Arc<dyn LLMProvider> = Arc::new(OllamaClient::from_config(&config)?);
    let tools = Arc::new(ToolRegistry::from_config(&config)?);
    tracing::debug!(provider = llm.name(), tools = tools.len(), "providers ready");

    // Single question mode
    if let Some(question) = args.question {
        let orchestrator = Orchestrator::new(&config, llm, tools);
        let attachment = args.file.map(|p| p.to_string_lossy().into_owned());
        let outcome = orchestrator.run(&question, attachment).await?;
        println!("{}", outcome.final_answer);
        println!("\nReasoning:\n{}", outcome.final_reasoning);
        return Ok(());
    }

    // Batch mode
    if let Some(input) = args.batch {
        let output = args.output.context("--output is required with --batch")?;
        let orchestrator = Orchestrator::new(&config, llm, tools);
        let summary = run_batch_file(
            &orchestrator,
            &input,
            &output,
            args.jobs,
            args.attachments_dir.as_deref(),
        )
        .await
        .with_context(|| format!("batch run over {} failed", input.display()))?;
        println!("Wrote {} answers to {}", summary.answers, output.display());
        if let Some(report) = summary.score {
            println!(
                "Exact match: {}/{} ({:.1}%), mean similarity {:.3}",
                report.exact_matches(),
                report.scores.len(),
                report.accuracy() * 100.0,
                report.mean_similarity()
            );
        }
        return Ok(());
    }

    // Interactive mode
    let mut repl = Repl::new(config, llm, tools);
    repl.run().await?;

    Ok(())
}
