//! Answer scoring
//!
//! Compares batch answers with the reference answers carried by the input
//! tasks. Both sides are lowercased with whitespace collapsed before
//! comparison.

use std::collections::HashMap;

use serde::Serialize;
use similar::TextDiff;

use crate::cli::batch::BatchAnswer;

/// Lowercase and collapse runs of whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn exact_match(prediction: &str, reference: &str) -> bool {
    normalize(prediction) == normalize(reference)
}

/// Character-level similarity ratio in `[0, 1]`
pub fn string_similarity(prediction: &str, reference: &str) -> f64 {
    let prediction = normalize(prediction);
    let reference = normalize(reference);
    if prediction.is_empty() && reference.is_empty() {
        return 1.0;
    }
    f64::from(TextDiff::from_chars(prediction.as_str(), reference.as_str()).ratio())
}

/// Score of one answered task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskScore {
    pub task_id: String,
    pub exact_match: bool,
    pub similarity: f64,
}

/// Scores for every answer that has a reference
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreReport {
    pub scores: Vec<TaskScore>,
}

impl ScoreReport {
    /// Score answers against references keyed by task id; `None` when no answer has a reference
    pub fn score(references: &HashMap<String, String>, answers: &[BatchAnswer]) -> Option<Self> {
        let scores: Vec<TaskScore> = answers
            .iter()
            .filter_map(|answer| {
                let reference = references.get(&answer.task_id)?;
                Some(TaskScore {
                    task_id: answer.task_id.clone(),
                    exact_match: exact_match(&answer.model_answer, reference),
                    similarity: string_similarity(&answer.model_answer, reference),
                })
            })
            .collect();

        if scores.is_empty() {
            None
        } else {
            Some(Self { scores })
        }
    }

    pub fn exact_matches(&self) -> usize {
        self.scores.iter().filter(|s| s.exact_match).count()
    }

    pub fn accuracy(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.exact_matches() as f64 / self.scores.len() as f64
    }

    pub fn mean_similarity(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().map(|s| s.similarity).sum::<f64>() / self.scores.len() as f64
    }
}
