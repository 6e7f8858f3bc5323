//! Structured responses produced by each role

use serde::Deserialize;
use serde_json::Value;

use crate::agent::state::Decision;
use crate::llm::{FieldKind, OutputSchema, StructuredOutput};

/// Planner: research and expert steps
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerOutput {
    pub research_steps: Vec<String>,
    pub expert_steps: Vec<String>,
}

impl StructuredOutput for PlannerOutput {
    fn schema() -> OutputSchema {
        OutputSchema::new(
            "plan",
            vec![
                ("research_steps", FieldKind::StringList),
                ("expert_steps", FieldKind::StringList),
            ],
        )
    }
}

/// Critic verdict
#[derive(Debug, Clone, Deserialize)]
pub struct CriticOutput {
    pub decision: Decision,
    pub feedback: String,
}

impl StructuredOutput for CriticOutput {
    fn schema() -> OutputSchema {
        OutputSchema::new(
            "review",
            vec![
                ("decision", FieldKind::Enum(&["approve", "reject"])),
                ("feedback", FieldKind::String),
            ],
        )
    }
}

/// Researcher result for one sub-task
#[derive(Debug, Clone, Deserialize)]
pub struct ResearcherOutput {
    pub result: Value,
}

impl ResearcherOutput {
    /// Result text; non-string values are kept as their JSON text
    pub fn into_text(self) -> String {
        match self.result {
            Value::String(text) => text,
            other => other.to_string(),
        }
    }
}

impl StructuredOutput for ResearcherOutput {
    fn schema() -> OutputSchema {
        OutputSchema::new("research", vec![("result", FieldKind::Any)])
    }
}

/// Expert answer and reasoning
#[derive(Debug, Clone, Deserialize)]
pub struct ExpertOutput {
    pub expert_answer: String,
    pub reasoning_trace: String,
}

impl StructuredOutput for ExpertOutput {
    fn schema() -> OutputSchema {
        OutputSchema::new(
            "expert_answer",
            vec![
                ("expert_answer", FieldKind::String),
                ("reasoning_trace", FieldKind::String),
            ],
        )
    }
}

/// Finalizer answer
#[derive(Debug, Clone, Deserialize)]
pub struct FinalizerOutput {
    pub final_answer: String,
    pub final_reasoning_trace: String,
}

impl StructuredOutput for FinalizerOutput {
    fn schema() -> OutputSchema {
        OutputSchema::new(
            "final_answer",
            vec![
                ("final_answer", FieldKind::String),
                ("final_reasoning_trace", FieldKind::String),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::structured::parse;

    #[test]
    fn test_critic_decision_normalized() {
        let out: CriticOutput =
            parse("critic_planner", r#"{"decision": "REJECT", "feedback": "add a step"}"#).unwrap();
        assert_eq!(out.decision, Decision::Reject);

        // "unset" is never a valid verdict
        assert!(parse::<CriticOutput>("critic_planner", r#"{"decision": "unset", "feedback": ""}"#)
            .is_err());
    }

    #[test]
    fn test_research_result_any_value() {
        let text: ResearcherOutput = parse("researcher", r#"{"result": "found it"}"#).unwrap();
        assert_eq!(text.into_text(), "found it");

        let structured: ResearcherOutput =
            parse("researcher", r#"{"result": {"albums": 3}}"#).unwrap();
        assert_eq!(structured.into_text(), r#"{"albums":3}"#);
    }

    #[test]
    fn test_planner_requires_lists() {
        let err = parse::<PlannerOutput>(
            "planner",
            r#"{"research_steps": "look it up", "expert_steps": []}"#,
        )
        .unwrap_err();
        assert!(err.is_recoverable());

        let plan: PlannerOutput =
            parse("planner", r#"{"research_steps": [], "expert_steps": ["add"]}"#).unwrap();
        assert!(plan.research_steps.is_empty());
    }
}
