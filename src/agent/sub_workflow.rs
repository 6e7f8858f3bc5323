//! Shared tool-calling reasoning loop
//!
//! The researcher and the expert both run this loop: ask the model, execute
//! any tools it requests, feed the results back, and repeat until it answers
//! with a structured result. History lives in the caller's sub-state so a
//! retried run resumes with everything that happened before.

use std::sync::Arc;

use crate::agent::loop_state::LoopState;
use crate::core::{Message, Result, RoleConfig, ToolCategory, ToolDefinition};
use crate::llm::structured::parse;
use crate::llm::{GenerateOptions, LLMProvider, StructuredOutput};
use crate::tools::ToolRegistry;

/// A ReAct loop bound to one role's model, prompt and toolset
pub struct SubWorkflowRunner {
    /// Role name used in logs and errors
    role: String,
    llm: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    tools: Arc<ToolRegistry>,
    category: ToolCategory,
    system_prompt: String,
    max_iterations: usize,
}

impl SubWorkflowRunner {
    pub fn new(
        role: impl Into<String>,
        config: &RoleConfig,
        default_prompt: &str,
        llm: Arc<dyn LLMProvider>,
        tools: Arc<ToolRegistry>,
        category: ToolCategory,
        max_iterations: usize,
    ) -> Self {
        Self {
            role: role.into(),
            llm,
            model: config.model.clone(),
            temperature: config.temperature,
            tools,
            category,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| default_prompt.to_string()),
            max_iterations,
        }
    }

    /// Tools offered to the model
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions(self.category)
    }

    /// Run the loop over `turns` until the model produces a valid `T`
    ///
    /// Every model turn and tool result is appended to `turns`, including on
    /// failure, so the caller can persist the history for a retry.
    pub async fn run<T: StructuredOutput>(&self, turns: &mut Vec<Message>) -> Result<T> {
        let schema = T::schema();
        let system = Message::system(format!(
            "{}\n\n{}",
            self.system_prompt,
            schema.instructions()
        ));
        let tool_defs = self.tool_definitions();
        let options = GenerateOptions {
            temperature: Some(self.temperature),
            ..Default::default()
        };

        let mut state = LoopState::new(self.max_iterations);

        loop {
            state.begin_reasoning(&self.role)?;
            tracing::debug!(
                role = %self.role,
                iteration = state.iteration,
                max = state.max_iterations,
                "sub-workflow reasoning"
            );

            let mut messages = Vec::with_capacity(turns.len() + 1);
            messages.push(system.clone());
            messages.extend(turns.iter().cloned());

            let response = if tool_defs.is_empty() {
                self.llm
                    .chat(&self.model, &messages, Some(options.clone()))
                    .await?
            } else {
                self.llm
                    .chat_with_tools(&self.model, &messages, &tool_defs, Some(options.clone()))
                    .await?
            };

            if !response.wants_tools() {
                turns.push(Message::assistant(response.content.clone()));
                let output = parse::<T>(&self.role, &response.content)?;
                state.finish();
                tracing::debug!(role = %self.role, iterations = state.iteration, "sub-workflow done");
                return Ok(output);
            }

            state.dispatch_tools();
            turns.push(Message::assistant_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                let result = self.tools.execute_in(self.category, call).await;
                if !result.success {
                    tracing::debug!(role = %self.role, tool = %call.name, "tool returned an error");
                }
                turns.push(Message::tool(&result.tool_name, result.as_turn_content()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::agent::outputs::ExpertOutput;
    use crate::core::{ConclaveError, ToolCall};
    use crate::llm::LLMResponse;
    use crate::tools::expert::Calculator;

    struct Scripted(Mutex<VecDeque<LLMResponse>>);

    impl Scripted {
        fn new(responses: Vec<LLMResponse>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(responses.into())))
        }

        fn next(&self) -> Result<LLMResponse> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ConclaveError::external("script exhausted"))
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn chat(
            &self,
            _model: &str,
            _messages: &[Message],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            self.next()
        }

        async fn chat_with_tools(
            &self,
            _model: &str,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            self.next()
        }

        async fn is_model_available(&self, _model: &str) -> Result<bool> {
            Ok(true)
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn runner(llm: Arc<Scripted>, max_iterations: usize) -> SubWorkflowRunner {
        let mut tools = ToolRegistry::new();
        tools.register(Calculator::new());
        let config = RoleConfig {
            model: "expert".into(),
            temperature: 0.0,
            system_prompt: None,
        };
        SubWorkflowRunner::new(
            "expert",
            &config,
            "You are the expert.",
            llm,
            Arc::new(tools),
            ToolCategory::Expert,
            max_iterations,
        )
    }

    fn calc(expr: &str) -> LLMResponse {
        LLMResponse::tools(vec![ToolCall::new(
            "calculator",
            serde_json::json!({"expression": expr}),
        )])
    }

    #[tokio::test]
    async fn test_tool_round_trip_then_answer() {
        let llm = Scripted::new(vec![
            calc("6 * 7"),
            LLMResponse::text(r#"{"expert_answer": "42", "reasoning_trace": "6*7"}"#),
        ]);
        let runner = runner(llm, 5);
        let mut turns = vec![Message::user("What is six times seven?")];

        let out: ExpertOutput = runner.run(&mut turns).await.unwrap();
        assert_eq!(out.expert_answer, "42");

        let roles: Vec<&str> = turns.iter().map(|t| t.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "assistant"]);
        assert_eq!(turns[2].content, "42");
    }

    #[tokio::test]
    async fn test_tool_error_is_fed_back() {
        let llm = Scripted::new(vec![
            calc("1 / 0"),
            LLMResponse::text(r#"{"expert_answer": "undefined", "reasoning_trace": "x/0"}"#),
        ]);
        let runner = runner(llm, 5);
        let mut turns = vec![Message::user("1/0?")];

        let out: ExpertOutput = runner.run(&mut turns).await.unwrap();
        assert_eq!(out.expert_answer, "undefined");
        assert!(turns[2].content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_iteration_cap_is_non_recoverable() {
        let llm = Scripted::new(vec![calc("1"), calc("2"), calc("3")]);
        let runner = runner(llm, 2);
        let mut turns = vec![Message::user("loop forever")];

        let err = runner.run::<ExpertOutput>(&mut turns).await.unwrap_err();
        assert!(matches!(
            err,
            ConclaveError::SubworkflowIterationExceeded { limit: 2, .. }
        ));
        assert!(!err.is_recoverable());
        // Two reasoning iterations, each followed by a tool dispatch
        assert_eq!(turns.len(), 5);
    }

    #[tokio::test]
    async fn test_resume_keeps_history() {
        let llm = Scripted::new(vec![
            LLMResponse::text(r#"{"expert_answer": 4}"#),
            LLMResponse::text(r#"{"expert_answer": "4", "reasoning_trace": "2+2"}"#),
        ]);
        let runner = runner(llm, 3);
        let mut turns = vec![Message::user("2+2?")];

        let err = runner.run::<ExpertOutput>(&mut turns).await.unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(turns.len(), 2);

        turns.push(Message::user("Use the following feedback to improve your answer:\nfix"));
        let out: ExpertOutput = runner.run(&mut turns).await.unwrap();
        assert_eq!(out.reasoning_trace, "2+2");
        assert_eq!(turns.len(), 4);
    }
}
