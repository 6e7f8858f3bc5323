//! Shared fixtures for the integration tests
//!
//! Every role is bound to a model named after it, so a scripted provider can
//! serve each role from its own queue.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use conclave::core::{Message, ToolCall, ToolDefinition};
use conclave::llm::{GenerateOptions, LLMProvider, LLMResponse};
use conclave::tools::expert::Calculator;
use conclave::tools::ToolRegistry;
use conclave::{ConclaveError, Config, Orchestrator, Result, RetryScope};

pub const PLANNER: &str = "planner";
pub const CRITIC: &str = "critic";
pub const RESEARCHER: &str = "researcher";
pub const EXPERT: &str = "expert";
pub const FINALIZER: &str = "finalizer";

/// Replays canned responses per model and counts calls
#[derive(Default)]
pub struct ScriptedProvider {
    queues: Mutex<HashMap<String, VecDeque<LLMResponse>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses for one model
    pub fn script(self, model: &str, responses: Vec<LLMResponse>) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .extend(responses);
        self
    }

    pub fn calls(&self, model: &str) -> usize {
        self.calls.lock().unwrap().get(model).copied().unwrap_or(0)
    }

    pub fn remaining(&self, model: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(model)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    fn next(&self, model: &str) -> Result<LLMResponse> {
        *self.calls.lock().unwrap().entry(model.to_string()).or_insert(0) += 1;
        self.queues
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| ConclaveError::external(format!("no scripted response for {}", model)))
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        model: &str,
        _messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.next(model)
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        _messages: &[Message],
        _tools: &[ToolDefinition],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.next(model)
    }

    async fn is_model_available(&self, _model: &str) -> Result<bool> {
        Ok(true)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![
            PLANNER.into(),
            CRITIC.into(),
            RESEARCHER.into(),
            EXPERT.into(),
            FINALIZER.into(),
        ])
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Configuration with one model per role and no external tools
pub fn config(retry_limit: u32) -> Config {
    let mut config = Config::default();
    config.roles.planner.model = PLANNER.into();
    config.roles.critic.model = CRITIC.into();
    config.roles.researcher.model = RESEARCHER.into();
    config.roles.expert.model = EXPERT.into();
    config.roles.finalizer.model = FINALIZER.into();
    config.workflow.retry_limit = retry_limit;
    config.workflow.retry_scope = RetryScope::Shared;
    config.workflow.max_subworkflow_iterations = 5;
    config.tools.python_enabled = false;
    config
}

/// Only the calculator, so the expert loop can exercise tool calls offline
pub fn tools() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Calculator::new());
    Arc::new(registry)
}

pub fn orchestrator(config: &Config, llm: Arc<ScriptedProvider>) -> Orchestrator {
    Orchestrator::new(config, llm, tools())
}

pub fn plan(research: &[&str], expert: &[&str]) -> LLMResponse {
    LLMResponse::text(json!({"research_steps": research, "expert_steps": expert}).to_string())
}

pub fn approve() -> LLMResponse {
    LLMResponse::text(json!({"decision": "approve", "feedback": "Looks right."}).to_string())
}

pub fn reject(feedback: &str) -> LLMResponse {
    LLMResponse::text(json!({"decision": "reject", "feedback": feedback}).to_string())
}

pub fn research(result: &str) -> LLMResponse {
    LLMResponse::text(json!({ "result": result }).to_string())
}

pub fn answer(answer: &str, reasoning: &str) -> LLMResponse {
    LLMResponse::text(json!({"expert_answer": answer, "reasoning_trace": reasoning}).to_string())
}

pub fn finalize(answer: &str, reasoning: &str) -> LLMResponse {
    LLMResponse::text(
        json!({"final_answer": answer, "final_reasoning_trace": reasoning}).to_string(),
    )
}

pub fn calculator(expression: &str) -> LLMResponse {
    LLMResponse::tools(vec![ToolCall::new(
        "calculator",
        json!({ "expression": expression }),
    )])
}
