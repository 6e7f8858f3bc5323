//! Session state
//!
//! One [`SessionState`] exists per question. It is owned by the orchestrator
//! for the lifetime of that question and carries everything the state
//! machine needs: the plan, research progress, per-sub-task conversational
//! sub-states, critic verdicts, retry bookkeeping and the message log.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::agent::messages::{MessageKind, MessageLog};
use crate::agent::step_tracker::StepTracker;
use crate::core::{ConclaveError, Message, Result, RetryScope};

/// Final answer and reasoning recorded when a session cannot be completed
pub const SENTINEL_ANSWER: &str = "The question could not be answered.";

/// A unit of reasoning work the orchestrator can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Start,
    Planner,
    CriticPlanner,
    Researcher,
    CriticResearcher,
    Expert,
    CriticExpert,
    Finalizer,
}

impl Role {
    /// Roles whose output is reviewed by a critic
    pub const REVIEWED: [Role; 3] = [Role::Planner, Role::Researcher, Role::Expert];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Start => "start",
            Role::Planner => "planner",
            Role::CriticPlanner => "critic_planner",
            Role::Researcher => "researcher",
            Role::CriticResearcher => "critic_researcher",
            Role::Expert => "expert",
            Role::CriticExpert => "critic_expert",
            Role::Finalizer => "finalizer",
        }
    }

    /// The role this critic reviews
    pub fn reviewed(&self) -> Option<Role> {
        match self {
            Role::CriticPlanner => Some(Role::Planner),
            Role::CriticResearcher => Some(Role::Researcher),
            Role::CriticExpert => Some(Role::Expert),
            _ => None,
        }
    }

    /// Key under which failures of this role count against the retry budget
    fn retry_key(&self) -> Role {
        self.reviewed().unwrap_or(*self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ConclaveError;

    fn from_str(s: &str) -> Result<Self> {
        let role = match s {
            "start" => Role::Start,
            "planner" => Role::Planner,
            "critic_planner" => Role::CriticPlanner,
            "researcher" => Role::Researcher,
            "critic_researcher" => Role::CriticResearcher,
            "expert" => Role::Expert,
            "critic_expert" => Role::CriticExpert,
            "finalizer" => Role::Finalizer,
            other => return Err(ConclaveError::validation(format!("unknown role '{}'", other))),
        };
        Ok(role)
    }
}

/// A critic's verdict on a reviewed role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
    #[default]
    Unset,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
            Decision::Unset => "unset",
        };
        f.write_str(s)
    }
}

/// The most recent failure caught by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Role or component that failed
    pub component: String,
    pub message: String,
    /// Short error kind label
    pub kind: String,
}

impl ErrorRecord {
    pub fn from_error(component: impl Into<String>, error: &ConclaveError) -> Self {
        Self {
            component: component.into(),
            message: error.to_string(),
            kind: error.kind().to_string(),
        }
    }
}

/// Conversational history and result of one research sub-task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearcherSubstate {
    /// Index into `research_steps`
    pub sub_task_id: usize,
    /// Instruction, tool-call, tool-result and final-response turns
    pub turns: Vec<Message>,
    /// Latest structured result
    pub result: Option<String>,
}

impl ResearcherSubstate {
    pub fn new(sub_task_id: usize) -> Self {
        Self {
            sub_task_id,
            turns: Vec::new(),
            result: None,
        }
    }
}

/// Conversational history and result of the expert run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpertSubstate {
    pub turns: Vec<Message>,
    pub answer: Option<String>,
    pub reasoning: Option<String>,
}

/// How a research result was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// A new sub-task result grew the collection
    Appended,
    /// A retried sub-task replaced its earlier result
    Overwritten,
}

/// Research results with explicit append-at-frontier and overwrite modes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResearchResults(Vec<String>);

impl ResearchResults {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append the result of the sub-task at the frontier
    pub fn push_frontier(&mut self, index: usize, result: String) -> Result<()> {
        if index != self.0.len() {
            return Err(ConclaveError::validation(format!(
                "cannot append research result {} with {} results recorded",
                index,
                self.0.len()
            )));
        }
        self.0.push(result);
        Ok(())
    }

    /// Replace the result of an already recorded sub-task
    pub fn overwrite(&mut self, index: usize, result: String) -> Result<()> {
        let slot = self.0.get_mut(index).ok_or_else(|| {
            ConclaveError::validation(format!("no research result {} to overwrite", index))
        })?;
        *slot = result;
        Ok(())
    }

    /// Store a result, appending at the frontier or overwriting a retried sub-task
    pub fn record(&mut self, index: usize, result: String) -> Result<RecordMode> {
        if index < self.0.len() {
            self.overwrite(index, result)?;
            Ok(RecordMode::Overwritten)
        } else {
            self.push_frontier(index, result)?;
            Ok(RecordMode::Appended)
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Unique token scoping one session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a random 128-bit hex identifier
    pub fn generate() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mutable record of one in-flight question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: SessionId,
    question: String,
    /// Reference to a file attached to the question
    pub attachment: Option<String>,

    pub research_steps: Vec<String>,
    pub expert_steps: Vec<String>,
    pub current_research_index: StepTracker,
    pub research_results: ResearchResults,
    pub researcher_substates: BTreeMap<usize, ResearcherSubstate>,
    pub expert_substate: Option<ExpertSubstate>,

    pub expert_answer: String,
    pub expert_reasoning: String,

    pub planner_decision: Decision,
    pub planner_feedback: String,
    pub researcher_decision: Decision,
    pub researcher_feedback: String,
    pub expert_decision: Decision,
    pub expert_feedback: String,

    pub final_answer: String,
    pub final_reasoning: String,

    pub current_role: Role,
    pub next_role: Role,

    /// Rejections counted against `retry_limit`
    pub retry_count: u32,
    pub retry_limit: u32,
    pub retry_scope: RetryScope,
    /// Rejections per reviewed role (critic failures count for the role they review)
    pub role_retries: BTreeMap<Role, u32>,
    /// Set once the session is being finalized with the sentinel answer
    pub retry_failed: bool,
    /// A recoverable failure of `current_role` awaits its retry
    pub pending_retry: bool,
    pub error: Option<ErrorRecord>,

    pub messages: MessageLog,
    /// Orchestrator steps taken
    pub steps: usize,
}

impl SessionState {
    /// Create a fresh session with empty collections and initial counters
    pub fn new(
        session_id: SessionId,
        question: impl Into<String>,
        attachment: Option<String>,
        retry_limit: u32,
        retry_scope: RetryScope,
    ) -> Result<Self> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(ConclaveError::validation("question must not be empty"));
        }

        Ok(Self {
            session_id,
            question,
            attachment,
            research_steps: Vec::new(),
            expert_steps: Vec::new(),
            current_research_index: StepTracker::new(),
            research_results: ResearchResults::new(),
            researcher_substates: BTreeMap::new(),
            expert_substate: None,
            expert_answer: String::new(),
            expert_reasoning: String::new(),
            planner_decision: Decision::Unset,
            planner_feedback: String::new(),
            researcher_decision: Decision::Unset,
            researcher_feedback: String::new(),
            expert_decision: Decision::Unset,
            expert_feedback: String::new(),
            final_answer: String::new(),
            final_reasoning: String::new(),
            current_role: Role::Start,
            next_role: Role::Planner,
            retry_count: 0,
            retry_limit,
            retry_scope,
            role_retries: BTreeMap::new(),
            retry_failed: false,
            pending_retry: false,
            error: None,
            messages: MessageLog::new(),
            steps: 0,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// Critic verdict on a reviewed role
    pub fn decision(&self, role: Role) -> Decision {
        match role {
            Role::Planner => self.planner_decision,
            Role::Researcher => self.researcher_decision,
            Role::Expert => self.expert_decision,
            _ => Decision::Unset,
        }
    }

    /// Critic feedback on a reviewed role
    pub fn feedback(&self, role: Role) -> &str {
        match role {
            Role::Planner => &self.planner_feedback,
            Role::Researcher => &self.researcher_feedback,
            Role::Expert => &self.expert_feedback,
            _ => "",
        }
    }

    /// Store a verdict for a reviewed role
    pub fn set_review(&mut self, role: Role, decision: Decision, feedback: impl Into<String>) {
        let feedback = feedback.into();
        match role {
            Role::Planner => {
                self.planner_decision = decision;
                self.planner_feedback = feedback;
            }
            Role::Researcher => {
                self.researcher_decision = decision;
                self.researcher_feedback = feedback;
            }
            Role::Expert => {
                self.expert_decision = decision;
                self.expert_feedback = feedback;
            }
            _ => {}
        }
    }

    /// Clear research progress when a new plan is approved
    pub fn reset_research(&mut self) {
        self.research_results.clear();
        self.researcher_substates.clear();
        self.current_research_index.reset();
        self.researcher_decision = Decision::Unset;
        self.researcher_feedback.clear();
    }

    /// Rejections recorded against one role
    pub fn retries_for(&self, role: Role) -> u32 {
        self.role_retries
            .get(&role.retry_key())
            .copied()
            .unwrap_or(0)
    }

    /// Count a rejection of `role` without ever exceeding `retry_limit`
    pub fn register_rejection(&mut self, role: Role) {
        let limit = self.retry_limit;
        let counter = self.role_retries.entry(role.retry_key()).or_insert(0);
        if *counter < limit {
            *counter += 1;
        }

        match self.retry_scope {
            RetryScope::Shared => {
                if self.retry_count < limit {
                    self.retry_count += 1;
                }
            }
            RetryScope::PerRole => {
                self.retry_count = self.role_retries.values().copied().max().unwrap_or(0);
            }
        }
    }

    /// Whether no further retry may be granted
    pub fn retry_budget_exhausted(&self) -> bool {
        self.retry_count >= self.retry_limit
    }

    /// Route to the finalizer with the sentinel answer
    pub fn mark_failed(&mut self) {
        self.retry_failed = true;
        self.pending_retry = false;
        self.next_role = Role::Finalizer;
        self.final_answer = SENTINEL_ANSWER.to_string();
        self.final_reasoning = SENTINEL_ANSWER.to_string();
    }

    /// Whether the finalizer has run and recorded its response
    pub fn is_complete(&self) -> bool {
        self.current_role == Role::Finalizer
            && self
                .messages
                .iter()
                .any(|m| m.sender == Role::Finalizer.as_str() && m.kind == MessageKind::Response)
    }

    /// Check the structural invariants that must hold after every step
    pub fn validate(&self) -> Result<()> {
        if self.retry_count > self.retry_limit {
            return Err(ConclaveError::validation(format!(
                "retry_count {} exceeds retry_limit {}",
                self.retry_count, self.retry_limit
            )));
        }
        if self.research_results.len() > self.research_steps.len() {
            return Err(ConclaveError::validation(format!(
                "{} research results for {} research steps",
                self.research_results.len(),
                self.research_steps.len()
            )));
        }
        let index = self.current_research_index.current();
        if index < -1 || (index != -1 && index >= self.research_steps.len() as i64) {
            return Err(ConclaveError::validation(format!(
                "research index {} out of range for {} steps",
                index,
                self.research_steps.len()
            )));
        }
        Ok(())
    }
}
