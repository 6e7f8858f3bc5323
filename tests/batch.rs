//! Batch driver tests

mod common;

use std::sync::Arc;

use common::*;
use conclave::cli::{run_batch_file, BatchAnswer};
use conclave::llm::LLMResponse;

fn happy_path(provider: ScriptedProvider, answer_text: &str) -> ScriptedProvider {
    provider
        .script(PLANNER, vec![plan(&[], &["answer"])])
        .script(CRITIC, vec![approve(), approve()])
        .script(EXPERT, vec![answer(answer_text, "known")])
        .script(FINALIZER, vec![finalize(answer_text, "known")])
}

#[tokio::test]
async fn test_batch_writes_answers_in_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tasks.jsonl");
    let output = dir.path().join("answers.jsonl");
    std::fs::write(
        &input,
        concat!(
            r#"{"task_id": "t1", "Question": "Capital of France?", "file_name": "", "Final answer": "paris"}"#,
            "\n",
            "this line is not json\n",
            r#"{"task_id": "t2", "Question": "Capital of Italy?", "Final answer": "Milan"}"#,
            "\n",
        ),
    )
    .unwrap();

    let llm = happy_path(happy_path(ScriptedProvider::new(), "Paris"), "Rome");
    let orchestrator = orchestrator(&config(5), Arc::new(llm));

    let summary = run_batch_file(&orchestrator, &input, &output, 1, None)
        .await
        .unwrap();
    assert_eq!(summary.answers, 2);

    let report = summary.score.unwrap();
    assert_eq!(report.scores.len(), 2);
    assert_eq!(report.exact_matches(), 1);
    assert!(report.scores[0].exact_match);
    assert!(!report.scores[1].exact_match);

    let answers: Vec<BatchAnswer> = std::fs::read_to_string(&output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(answers[0].task_id, "t1");
    assert_eq!(answers[0].model_answer, "Paris");
    assert_eq!(answers[1].task_id, "t2");
    assert_eq!(answers[1].model_answer, "Rome");
}

#[tokio::test]
async fn test_failed_session_still_produces_an_answer_line() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tasks.jsonl");
    let output = dir.path().join("answers.jsonl");
    std::fs::write(
        &input,
        r#"{"task_id": "bad", "Question": "Plan this"}"#.to_string() + "\n",
    )
    .unwrap();

    let llm = ScriptedProvider::new().script(PLANNER, vec![LLMResponse::text("no json here")]);
    let orchestrator = orchestrator(&config(5), Arc::new(llm));

    let summary = run_batch_file(&orchestrator, &input, &output, 2, None)
        .await
        .unwrap();
    assert!(summary.score.is_none());

    let line = std::fs::read_to_string(&output).unwrap();
    let answer: BatchAnswer = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(answer.task_id, "bad");
    assert_eq!(answer.model_answer, conclave::agent::SENTINEL_ANSWER);
}
