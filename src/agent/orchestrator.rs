//! Orchestrator
//!
//! The central state machine. Each [`Orchestrator::step`] runs four phases:
//!
//! 1. determine the next role from the current role and the critic verdicts
//! 2. enforce the retry budget, overriding to the finalizer once it is spent
//! 3. execute: send the instruction, invoke the role and merge its output
//! 4. hand the state back to the driver
//!
//! Failures never escape a step. Recoverable ones, including a critic that
//! returns no usable decision, are retried against the retry budget;
//! non-recoverable ones finalize the session with the sentinel answer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::messages::AgentMessage;
use crate::agent::prompts;
use crate::agent::roles::{RoleOutput, RoleRegistry};
use crate::agent::state::{
    Decision, ErrorRecord, RecordMode, Role, SessionId, SessionState, SENTINEL_ANSWER,
};
use crate::core::{Config, ConclaveError, Result, RetryScope};
use crate::llm::LLMProvider;
use crate::tools::ToolRegistry;

/// How Phase 1 reached the next role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Forward progress through the workflow
    Advance,
    /// Re-entry into a role after a rejection or failure
    Retry,
}

/// Result of a completed session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub final_answer: String,
    pub final_reasoning: String,
    /// Finalized with the sentinel answer
    pub failed: bool,
    pub steps: usize,
}

impl From<&SessionState> for SessionOutcome {
    fn from(state: &SessionState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            final_answer: state.final_answer.clone(),
            final_reasoning: state.final_reasoning.clone(),
            failed: state.retry_failed,
            steps: state.steps,
        }
    }
}

/// Phase 1: pick the next role and apply the decision table's side effects
pub fn determine_next_role(state: &mut SessionState) -> Result<Transition> {
    if state.retry_failed {
        state.next_role = Role::Finalizer;
        return Ok(Transition::Advance);
    }

    if state.pending_retry {
        state.pending_retry = false;
        let role = state.current_role;
        state.register_rejection(role);
        state.next_role = role;
        return Ok(Transition::Retry);
    }

    let (next, transition) = match state.current_role {
        Role::Start => (Role::Planner, Transition::Advance),
        Role::Planner => (Role::CriticPlanner, Transition::Advance),
        Role::Researcher => (Role::CriticResearcher, Transition::Advance),
        Role::Expert => (Role::CriticExpert, Transition::Advance),
        Role::Finalizer => (Role::Finalizer, Transition::Advance),
        Role::CriticPlanner => match state.planner_decision {
            Decision::Reject => {
                state.register_rejection(Role::Planner);
                (Role::Planner, Transition::Retry)
            }
            Decision::Approve if state.research_steps.is_empty() => {
                (Role::Expert, Transition::Advance)
            }
            Decision::Approve => {
                state.reset_research();
                (Role::Researcher, Transition::Advance)
            }
            Decision::Unset => return Err(missing_decision(Role::CriticPlanner)),
        },
        Role::CriticResearcher => match state.researcher_decision {
            Decision::Reject => {
                state.register_rejection(Role::Researcher);
                (Role::Researcher, Transition::Retry)
            }
            Decision::Approve
                if state
                    .current_research_index
                    .is_complete(state.research_steps.len()) =>
            {
                (Role::Expert, Transition::Advance)
            }
            Decision::Approve => (Role::Researcher, Transition::Advance),
            Decision::Unset => return Err(missing_decision(Role::CriticResearcher)),
        },
        Role::CriticExpert => match state.expert_decision {
            Decision::Reject => {
                state.register_rejection(Role::Expert);
                (Role::Expert, Transition::Retry)
            }
            Decision::Approve => (Role::Finalizer, Transition::Advance),
            Decision::Unset => return Err(missing_decision(Role::CriticExpert)),
        },
    };

    state.next_role = next;
    Ok(transition)
}

fn missing_decision(critic: Role) -> ConclaveError {
    ConclaveError::validation(format!("{} finished without a decision", critic))
}

/// Phase 2: route to the finalizer with the sentinel once no retry may be granted
///
/// Returns true when the override fired.
pub fn enforce_retry_budget(state: &mut SessionState, transition: Transition) -> bool {
    if state.retry_failed {
        state.next_role = Role::Finalizer;
        return false;
    }
    let spent = state.retry_budget_exhausted()
        && (transition == Transition::Retry || state.retry_count > 0);
    if !spent {
        return false;
    }

    let error = ConclaveError::RetryLimitExceeded {
        role: state.next_role.to_string(),
        limit: state.retry_limit,
    };
    tracing::warn!(
        session = %state.session_id,
        role = %state.next_role,
        retry_count = state.retry_count,
        "retry budget exhausted, finalizing"
    );
    state.error = Some(ErrorRecord::from_error(state.next_role.as_str(), &error));
    state.mark_failed();
    true
}

/// Drives sessions through the role state machine
pub struct Orchestrator {
    roles: RoleRegistry,
    retry_limit: u32,
    retry_scope: RetryScope,
}

impl Orchestrator {
    /// Build role handlers from the configuration
    pub fn new(config: &Config, llm: Arc<dyn LLMProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            roles: RoleRegistry::new(config, llm, tools),
            retry_limit: config.workflow.retry_limit,
            retry_scope: config.workflow.retry_scope,
        }
    }

    /// Create a fresh session for a question
    pub fn start(&self, question: &str, attachment: Option<String>) -> Result<SessionState> {
        self.start_with_id(SessionId::generate(), question, attachment)
    }

    /// Create a fresh session under a caller-supplied id
    pub fn start_with_id(
        &self,
        session_id: SessionId,
        question: &str,
        attachment: Option<String>,
    ) -> Result<SessionState> {
        let state = SessionState::new(
            session_id,
            question,
            attachment,
            self.retry_limit,
            self.retry_scope,
        )?;
        tracing::info!(session = %state.session_id, retry_limit = self.retry_limit, "session started");
        Ok(state)
    }

    /// Answer a question end to end
    pub async fn run(&self, question: &str, attachment: Option<String>) -> Result<SessionOutcome> {
        let mut state = self.start(question, attachment)?;
        while !state.is_complete() {
            state = self.step(state).await;
        }
        let outcome = SessionOutcome::from(&state);
        tracing::info!(
            session = %outcome.session_id,
            steps = outcome.steps,
            failed = outcome.failed,
            "session complete"
        );
        Ok(outcome)
    }

    /// Advance the session by one role; a completed session is returned unchanged
    pub async fn step(&self, mut state: SessionState) -> SessionState {
        if state.is_complete() {
            tracing::debug!(session = %state.session_id, "step on completed session ignored");
            return state;
        }
        state.steps += 1;

        // Phase 1
        let transition = match determine_next_role(&mut state) {
            Ok(transition) => transition,
            Err(e) if e.is_recoverable() && !state.retry_failed => {
                // Re-run the role whose output could not be routed
                tracing::warn!(
                    session = %state.session_id,
                    role = %state.current_role,
                    error = %e,
                    "routing failed, retrying role"
                );
                state.error = Some(ErrorRecord::from_error(state.current_role.as_str(), &e));
                let role = state.current_role;
                state.register_rejection(role);
                state.next_role = role;
                Transition::Retry
            }
            Err(e) => {
                tracing::error!(
                    session = %state.session_id,
                    role = %state.current_role,
                    error = %e,
                    "routing failed, finalizing"
                );
                state.error = Some(ErrorRecord::from_error(state.current_role.as_str(), &e));
                state.mark_failed();
                Transition::Advance
            }
        };

        // Phase 2
        enforce_retry_budget(&mut state, transition);

        // Phase 3
        state.current_role = state.next_role;
        let role = state.current_role;
        tracing::info!(
            session = %state.session_id,
            role = %role,
            sub_task = ?state.current_research_index.active(),
            retry_count = state.retry_count,
            retry = (transition == Transition::Retry),
            "executing role"
        );

        if let Err(e) = self.execute(&mut state, role).await {
            self.handle_failure(&mut state, role, e);
        }

        debug_assert!(state.validate().is_ok());

        // Phase 4
        state
    }

    async fn execute(&self, state: &mut SessionState, role: Role) -> Result<()> {
        if role == Role::Finalizer && state.retry_failed {
            return self.record_failure_answer(state);
        }

        let instruction = self.compose_instruction(state, role)?;
        state.messages.append(instruction)?;

        let output = self.roles.invoke(role, state).await?;
        self.apply(state, role, output)
    }

    /// Build the outbound instruction for the role about to run
    fn compose_instruction(&self, state: &mut SessionState, role: Role) -> Result<AgentMessage> {
        let retrying = state.decision(role) == Decision::Reject;

        let message = match role {
            Role::Planner if retrying => AgentMessage::instruction(
                role.as_str(),
                prompts::feedback_instruction(role, state.feedback(role)),
            ),
            Role::Planner => {
                AgentMessage::instruction(role.as_str(), prompts::planner_instruction(state))
            }
            Role::Researcher => {
                let index = if retrying {
                    state.current_research_index.retry()
                } else {
                    Some(
                        state
                            .current_research_index
                            .advance(state.research_steps.len())?,
                    )
                }
                .ok_or_else(|| ConclaveError::validation("no research sub-task to retry"))?;

                let content = if retrying {
                    prompts::feedback_instruction(role, state.feedback(role))
                } else {
                    let step = state.research_steps.get(index).ok_or_else(|| {
                        ConclaveError::validation(format!("no research step {}", index))
                    })?;
                    prompts::researcher_instruction(step)
                };
                AgentMessage::instruction(role.as_str(), content).with_sub_task(index)
            }
            Role::Expert if retrying => AgentMessage::instruction(
                role.as_str(),
                prompts::feedback_instruction(role, state.feedback(role)),
            ),
            Role::Expert => AgentMessage::instruction(role.as_str(), prompts::expert_brief(state)),
            Role::CriticPlanner => {
                AgentMessage::instruction(role.as_str(), prompts::critic_planner_brief(state))
            }
            Role::CriticResearcher => {
                let index = state.current_research_index.active().ok_or_else(|| {
                    ConclaveError::validation("critic_researcher invoked before any sub-task")
                })?;
                let topic = state
                    .research_steps
                    .get(index)
                    .map(String::as_str)
                    .unwrap_or_default();
                let result = state.research_results.get(index).unwrap_or_default();
                AgentMessage::instruction(
                    role.as_str(),
                    prompts::critic_researcher_brief(topic, result),
                )
            }
            Role::CriticExpert => {
                AgentMessage::instruction(role.as_str(), prompts::critic_expert_brief(state))
            }
            Role::Finalizer => {
                AgentMessage::instruction(role.as_str(), prompts::finalizer_brief(state))
            }
            Role::Start => return Err(ConclaveError::validation("cannot execute the start role")),
        };
        Ok(message)
    }

    /// Merge a role's output into the session and log its response
    fn apply(&self, state: &mut SessionState, role: Role, output: RoleOutput) -> Result<()> {
        let response = match output {
            RoleOutput::Plan(plan) => {
                let content = format!(
                    "Planner complete. Research steps: {:?}, Expert steps: {:?}",
                    plan.research_steps, plan.expert_steps
                );
                state.research_steps = plan.research_steps;
                state.expert_steps = plan.expert_steps;
                AgentMessage::response(role.as_str(), content)
            }
            RoleOutput::Review(review) => {
                let reviewed = role.reviewed().ok_or_else(|| {
                    ConclaveError::validation(format!("{} cannot return a review", role))
                })?;
                let content = format!(
                    "Critic complete. Decision: {}, Feedback: {}",
                    review.decision, review.feedback
                );
                tracing::info!(
                    session = %state.session_id,
                    role = %reviewed,
                    decision = %review.decision,
                    "review recorded"
                );
                state.set_review(reviewed, review.decision, review.feedback);
                AgentMessage::response(role.as_str(), content)
            }
            RoleOutput::Research {
                sub_task_id,
                result,
            } => {
                let mode = state.research_results.record(sub_task_id, result)?;
                if mode == RecordMode::Overwritten {
                    tracing::debug!(
                        session = %state.session_id,
                        sub_task = sub_task_id,
                        "research result replaced"
                    );
                }
                AgentMessage::response(
                    role.as_str(),
                    format!("Researcher complete for step {}", sub_task_id),
                )
                .with_sub_task(sub_task_id)
            }
            RoleOutput::Answer(answer) => {
                let content = format!(
                    "Expert complete. Answer: {}, Reasoning: {}",
                    answer.expert_answer, answer.reasoning_trace
                );
                state.expert_answer = answer.expert_answer;
                state.expert_reasoning = answer.reasoning_trace;
                AgentMessage::response(role.as_str(), content)
            }
            RoleOutput::Final(answer) => {
                let content = format!(
                    "Finalizer complete. The final answer is:\n{}\n\nThe final reasoning trace is:\n{}",
                    answer.final_answer, answer.final_reasoning_trace
                );
                state.final_answer = answer.final_answer;
                state.final_reasoning = answer.final_reasoning_trace;
                AgentMessage::response(role.as_str(), content)
            }
        };
        state.messages.append(response)
    }

    /// Finalize a failed session without calling the model
    fn record_failure_answer(&self, state: &mut SessionState) -> Result<()> {
        state.final_answer = SENTINEL_ANSWER.to_string();
        state.final_reasoning = SENTINEL_ANSWER.to_string();
        state.messages.append(AgentMessage::instruction(
            Role::Finalizer.as_str(),
            prompts::finalizer_failure_brief(),
        ))?;
        state.messages.append(AgentMessage::response(
            Role::Finalizer.as_str(),
            format!(
                "Finalizer complete. The final answer is:\n{}\n\nThe final reasoning trace is:\n{}",
                SENTINEL_ANSWER, SENTINEL_ANSWER
            ),
        ))
    }

    /// Record a caught failure and decide between retry and finalization
    fn handle_failure(&self, state: &mut SessionState, role: Role, error: ConclaveError) {
        state.error = Some(ErrorRecord::from_error(role.as_str(), &error));

        if !error.is_recoverable() || state.retry_failed {
            tracing::error!(
                session = %state.session_id,
                role = %role,
                kind = error.kind(),
                error = %error,
                "non-recoverable failure, finalizing"
            );
            state.mark_failed();
            if role == Role::Finalizer {
                // Already at the terminal role: record the sentinel now
                if let Err(e) = self.record_failure_answer(state) {
                    tracing::error!(session = %state.session_id, error = %e, "failed to record sentinel answer");
                }
            }
            return;
        }

        tracing::warn!(
            session = %state.session_id,
            role = %role,
            kind = error.kind(),
            error = %error,
            retry_count = state.retry_count,
            "role failed, scheduling retry"
        );
        if Role::REVIEWED.contains(&role) {
            state.set_review(
                role,
                Decision::Reject,
                format!("The previous attempt failed: {}", error),
            );
        }
        state.pending_retry = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(limit: u32) -> SessionState {
        SessionState::new(SessionId::from("t"), "q?", None, limit, RetryScope::Shared).unwrap()
    }

    #[test]
    fn test_forward_transitions() {
        let mut state = session(5);
        for (current, expected) in [
            (Role::Start, Role::Planner),
            (Role::Planner, Role::CriticPlanner),
            (Role::Researcher, Role::CriticResearcher),
            (Role::Expert, Role::CriticExpert),
            (Role::Finalizer, Role::Finalizer),
        ] {
            state.current_role = current;
            assert_eq!(determine_next_role(&mut state).unwrap(), Transition::Advance);
            assert_eq!(state.next_role, expected);
        }
    }

    #[test]
    fn test_planner_approval_routes_by_plan() {
        let mut state = session(5);
        state.current_role = Role::CriticPlanner;
        state.planner_decision = Decision::Approve;
        determine_next_role(&mut state).unwrap();
        assert_eq!(state.next_role, Role::Expert);

        state.research_steps = vec!["a".into(), "b".into()];
        state.research_results.record(0, "stale".into()).unwrap();
        state.current_research_index.advance(2).unwrap();
        determine_next_role(&mut state).unwrap();
        assert_eq!(state.next_role, Role::Researcher);
        assert!(state.research_results.is_empty());
        assert_eq!(state.current_research_index.current(), -1);
    }

    #[test]
    fn test_rejection_counts_and_keeps_index() {
        let mut state = session(5);
        state.research_steps = vec!["a".into(), "b".into()];
        state.current_research_index.advance(2).unwrap();
        state.current_role = Role::CriticResearcher;
        state.researcher_decision = Decision::Reject;

        assert_eq!(determine_next_role(&mut state).unwrap(), Transition::Retry);
        assert_eq!(state.next_role, Role::Researcher);
        assert_eq!(state.retry_count, 1);
        assert_eq!(state.current_research_index.current(), 0);

        state.researcher_decision = Decision::Approve;
        determine_next_role(&mut state).unwrap();
        assert_eq!(state.next_role, Role::Researcher);

        state.current_research_index.advance(2).unwrap();
        determine_next_role(&mut state).unwrap();
        assert_eq!(state.next_role, Role::Expert);
    }

    #[test]
    fn test_unset_decision_is_validation_error() {
        let mut state = session(5);
        state.current_role = Role::CriticExpert;
        let err = determine_next_role(&mut state).unwrap_err();
        assert!(matches!(err, ConclaveError::Validation(_)));
    }

    #[test]
    fn test_pending_retry_reenters_same_role() {
        let mut state = session(5);
        state.current_role = Role::CriticPlanner;
        state.pending_retry = true;
        assert_eq!(determine_next_role(&mut state).unwrap(), Transition::Retry);
        assert_eq!(state.next_role, Role::CriticPlanner);
        assert_eq!(state.retries_for(Role::Planner), 1);
        assert!(!state.pending_retry);
    }

    #[test]
    fn test_budget_override() {
        let mut state = session(1);
        state.current_role = Role::CriticExpert;
        state.expert_decision = Decision::Reject;
        let transition = determine_next_role(&mut state).unwrap();
        assert_eq!(state.retry_count, 1);

        assert!(enforce_retry_budget(&mut state, transition));
        assert_eq!(state.next_role, Role::Finalizer);
        assert!(state.retry_failed);
        assert_eq!(state.final_answer, SENTINEL_ANSWER);
        assert_eq!(
            state.error.as_ref().map(|e| e.kind.as_str()),
            Some("retry_limit_exceeded")
        );
    }

    #[test]
    fn test_zero_limit_allows_first_pass() {
        let mut state = session(0);
        let transition = determine_next_role(&mut state).unwrap();
        assert!(!enforce_retry_budget(&mut state, transition));
        assert_eq!(state.next_role, Role::Planner);

        state.current_role = Role::CriticPlanner;
        state.planner_decision = Decision::Reject;
        let transition = determine_next_role(&mut state).unwrap();
        assert!(enforce_retry_budget(&mut state, transition));
        assert_eq!(state.next_role, Role::Finalizer);
        assert_eq!(state.retry_count, 0);
    }
}
