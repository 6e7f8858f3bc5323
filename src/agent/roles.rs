//! Agent invocation shim
//!
//! Uniform entry point for running one role. Planner, critics and finalizer
//! are single model round-trips; researcher and expert delegate to the
//! shared [`SubWorkflowRunner`]. Handlers are built once from the
//! configuration and resolved by [`Role`], never by name.

use std::sync::Arc;

use crate::agent::messages::{to_turns, ORCHESTRATOR};
use crate::agent::outputs::{
    CriticOutput, ExpertOutput, FinalizerOutput, PlannerOutput, ResearcherOutput,
};
use crate::agent::prompts;
use crate::agent::state::{ResearcherSubstate, Role, SessionState};
use crate::agent::sub_workflow::SubWorkflowRunner;
use crate::core::{Config, ConclaveError, Message, Result, RoleConfig, ToolCategory};
use crate::llm::structured::parse;
use crate::llm::{GenerateOptions, LLMProvider, StructuredOutput};
use crate::tools::ToolRegistry;

/// State deltas returned by a role, merged by the orchestrator
#[derive(Debug, Clone)]
pub enum RoleOutput {
    Plan(PlannerOutput),
    Review(CriticOutput),
    Research { sub_task_id: usize, result: String },
    Answer(ExpertOutput),
    Final(FinalizerOutput),
}

/// A role answered by one structured model call
pub struct SingleTurnAgent {
    role: Role,
    llm: Arc<dyn LLMProvider>,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl SingleTurnAgent {
    pub fn new(role: Role, config: &RoleConfig, llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            role,
            llm,
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| prompts::system_prompt(role).to_string()),
        }
    }

    /// Critics share one model binding; a configured prompt prefixes each built-in review prompt
    fn critic(role: Role, config: &RoleConfig, llm: Arc<dyn LLMProvider>) -> Self {
        let builtin = prompts::system_prompt(role);
        Self {
            role,
            llm,
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: match config.system_prompt {
                Some(ref prefix) => format!("{}\n\n{}", prefix, builtin),
                None => builtin.to_string(),
            },
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask for a structured response given the role's conversation
    pub async fn ask<T: StructuredOutput>(&self, history: Vec<Message>) -> Result<T> {
        let schema = T::schema();
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(format!(
            "{}\n\n{}",
            self.system_prompt,
            schema.instructions()
        )));
        messages.extend(history);

        let options = GenerateOptions {
            temperature: Some(self.temperature),
            format: Some(schema.to_json_schema()),
            ..Default::default()
        };

        let response = self.llm.chat(&self.model, &messages, Some(options)).await?;
        parse::<T>(self.role.as_str(), &response.content)
    }
}

/// Handlers for every invokable role
pub struct RoleRegistry {
    planner: SingleTurnAgent,
    critic_planner: SingleTurnAgent,
    critic_researcher: SingleTurnAgent,
    critic_expert: SingleTurnAgent,
    finalizer: SingleTurnAgent,
    researcher: SubWorkflowRunner,
    expert: SubWorkflowRunner,
}

impl RoleRegistry {
    pub fn new(config: &Config, llm: Arc<dyn LLMProvider>, tools: Arc<ToolRegistry>) -> Self {
        let roles = &config.roles;
        let max_iterations = config.workflow.max_subworkflow_iterations;

        Self {
            planner: SingleTurnAgent::new(Role::Planner, &roles.planner, llm.clone()),
            critic_planner: SingleTurnAgent::critic(Role::CriticPlanner, &roles.critic, llm.clone()),
            critic_researcher: SingleTurnAgent::critic(
                Role::CriticResearcher,
                &roles.critic,
                llm.clone(),
            ),
            critic_expert: SingleTurnAgent::critic(Role::CriticExpert, &roles.critic, llm.clone()),
            finalizer: SingleTurnAgent::new(Role::Finalizer, &roles.finalizer, llm.clone()),
            researcher: SubWorkflowRunner::new(
                Role::Researcher.as_str(),
                &roles.researcher,
                prompts::RESEARCHER_PROMPT,
                llm.clone(),
                tools.clone(),
                ToolCategory::Research,
                max_iterations,
            ),
            expert: SubWorkflowRunner::new(
                Role::Expert.as_str(),
                &roles.expert,
                prompts::EXPERT_PROMPT,
                llm,
                tools,
                ToolCategory::Expert,
                max_iterations,
            ),
        }
    }

    fn critic(&self, role: Role) -> Option<&SingleTurnAgent> {
        match role {
            Role::CriticPlanner => Some(&self.critic_planner),
            Role::CriticResearcher => Some(&self.critic_researcher),
            Role::CriticExpert => Some(&self.critic_expert),
            _ => None,
        }
    }

    /// Run `role` against the session and return its state deltas
    ///
    /// Researcher and expert sub-states are updated in place, on failure as
    /// well as on success.
    pub async fn invoke(&self, role: Role, state: &mut SessionState) -> Result<RoleOutput> {
        match role {
            Role::Planner => {
                let history =
                    to_turns(state.messages.conversation_between(ORCHESTRATOR, role.as_str(), None));
                Ok(RoleOutput::Plan(self.planner.ask(history).await?))
            }
            Role::CriticPlanner | Role::CriticResearcher | Role::CriticExpert => {
                let critic = self
                    .critic(role)
                    .ok_or_else(|| ConclaveError::validation(format!("{} is not a critic", role)))?;
                // Critics judge the latest brief only
                let brief = state
                    .messages
                    .last_between(ORCHESTRATOR, role.as_str(), None)
                    .map(|m| vec![m.as_turn()])
                    .unwrap_or_default();
                Ok(RoleOutput::Review(critic.ask(brief).await?))
            }
            Role::Researcher => self.research(state).await,
            Role::Expert => self.answer(state).await,
            Role::Finalizer => {
                let history =
                    to_turns(state.messages.conversation_between(ORCHESTRATOR, role.as_str(), None));
                Ok(RoleOutput::Final(self.finalizer.ask(history).await?))
            }
            Role::Start => Err(ConclaveError::validation("start is not an invokable role")),
        }
    }

    async fn research(&self, state: &mut SessionState) -> Result<RoleOutput> {
        let sub_task_id = state
            .current_research_index
            .active()
            .ok_or_else(|| ConclaveError::validation("researcher invoked before any sub-task"))?;

        let history = to_turns(state.messages.conversation_between(
            ORCHESTRATOR,
            Role::Researcher.as_str(),
            Some(sub_task_id),
        ));
        let mut substate = state
            .researcher_substates
            .remove(&sub_task_id)
            .unwrap_or_else(|| ResearcherSubstate::new(sub_task_id));
        extend_substate(&mut substate.turns, &history);

        let outcome = self.researcher.run::<ResearcherOutput>(&mut substate.turns).await;
        let result = outcome.map(ResearcherOutput::into_text);
        if let Ok(ref text) = result {
            substate.result = Some(text.clone());
        }
        state.researcher_substates.insert(sub_task_id, substate);

        Ok(RoleOutput::Research {
            sub_task_id,
            result: result?,
        })
    }

    async fn answer(&self, state: &mut SessionState) -> Result<RoleOutput> {
        let history = to_turns(state.messages.conversation_between(
            ORCHESTRATOR,
            Role::Expert.as_str(),
            None,
        ));
        let mut substate = state.expert_substate.take().unwrap_or_default();
        extend_substate(&mut substate.turns, &history);

        let outcome = self.expert.run::<ExpertOutput>(&mut substate.turns).await;
        if let Ok(ref output) = outcome {
            substate.answer = Some(output.expert_answer.clone());
            substate.reasoning = Some(output.reasoning_trace.clone());
        }
        state.expert_substate = Some(substate);

        Ok(RoleOutput::Answer(outcome?))
    }
}

/// Seed a fresh sub-state from the role's instructions, or resume an
/// existing one with the newest instruction only
fn extend_substate(turns: &mut Vec<Message>, history: &[Message]) {
    let instructions = history.iter().filter(|m| m.role == "user");
    if turns.is_empty() {
        turns.extend(instructions.cloned());
    } else if let Some(latest) = instructions.last() {
        turns.push(latest.clone());
    }
}
