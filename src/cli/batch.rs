//! Batch driver
//!
//! Answers a JSONL file of questions, one independent session per line,
//! and writes one JSONL answer per question in input order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::agent::{Orchestrator, SENTINEL_ANSWER};
use crate::cli::scoring::ScoreReport;
use crate::core::Result;

/// One input question
#[derive(Debug, Clone, Deserialize)]
pub struct BatchTask {
    pub task_id: String,
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(default)]
    pub file_name: Option<String>,
    /// Reference answer, when the task set carries one
    #[serde(rename = "Final answer", default)]
    pub final_answer: Option<String>,
}

/// One output answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnswer {
    pub task_id: String,
    pub model_answer: String,
    pub reasoning_trace: String,
}

/// Parse JSONL tasks, skipping blank and malformed lines
pub fn parse_tasks(content: &str) -> Vec<BatchTask> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| match serde_json::from_str::<BatchTask>(line) {
            Ok(task) => Some(task),
            Err(e) => {
                tracing::warn!(line = i + 1, error = %e, "skipping malformed task line");
                None
            }
        })
        .collect()
}

fn attachment_path(task: &BatchTask, attachments_dir: Option<&Path>) -> Option<String> {
    let name = task.file_name.as_deref().filter(|n| !n.trim().is_empty())?;
    let path = match attachments_dir {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    };
    Some(path.to_string_lossy().into_owned())
}

/// Answer tasks with up to `jobs` sessions in flight, preserving input order
pub async fn run_tasks(
    orchestrator: &Orchestrator,
    tasks: Vec<BatchTask>,
    jobs: usize,
    attachments_dir: Option<&Path>,
) -> Vec<BatchAnswer> {
    let mut answers: Vec<(usize, BatchAnswer)> = stream::iter(tasks.into_iter().enumerate())
        .map(|(i, task)| async move {
            let attachment = attachment_path(&task, attachments_dir);
            let answer = match orchestrator.run(&task.question, attachment).await {
                Ok(outcome) => BatchAnswer {
                    task_id: task.task_id,
                    model_answer: outcome.final_answer,
                    reasoning_trace: outcome.final_reasoning,
                },
                Err(e) => {
                    tracing::error!(task = %task.task_id, error = %e, "task could not be started");
                    BatchAnswer {
                        task_id: task.task_id,
                        model_answer: SENTINEL_ANSWER.to_string(),
                        reasoning_trace: SENTINEL_ANSWER.to_string(),
                    }
                }
            };
            (i, answer)
        })
        .buffer_unordered(jobs.max(1))
        .collect()
        .await;

    answers.sort_by_key(|(i, _)| *i);
    answers.into_iter().map(|(_, answer)| answer).collect()
}

/// Outcome of a batch run
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub answers: usize,
    /// Present when at least one task carried a reference answer
    pub score: Option<ScoreReport>,
}

/// Read `input`, answer every task and write the answers to `output`
pub async fn run_batch_file(
    orchestrator: &Orchestrator,
    input: &Path,
    output: &Path,
    jobs: usize,
    attachments_dir: Option<&Path>,
) -> Result<BatchSummary> {
    let content = tokio::fs::read_to_string(input).await?;
    let tasks = parse_tasks(&content);
    tracing::info!(tasks = tasks.len(), jobs, input = %input.display(), "starting batch");

    let references: HashMap<String, String> = tasks
        .iter()
        .filter_map(|t| Some((t.task_id.clone(), t.final_answer.clone()?)))
        .collect();

    let answers = run_tasks(orchestrator, tasks, jobs, attachments_dir).await;

    let mut lines = String::new();
    for answer in &answers {
        lines.push_str(&serde_json::to_string(answer)?);
        lines.push('\n');
    }
    tokio::fs::write(output, lines).await?;

    tracing::info!(answers = answers.len(), output = %output.display(), "batch written");

    let score = ScoreReport::score(&references, &answers);
    if let Some(ref report) = score {
        tracing::info!(
            scored = report.scores.len(),
            exact_matches = report.exact_matches(),
            accuracy = report.accuracy(),
            mean_similarity = report.mean_similarity(),
            "batch scored"
        );
    }

    Ok(BatchSummary {
        answers: answers.len(),
        score,
    })
}
