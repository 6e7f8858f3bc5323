//! Agent module - orchestration state machine
//!
//! Session state, the inter-agent message log, research step tracking, the
//! shared tool-calling loop, role handlers, and the orchestrator that ties
//! them together.

pub mod loop_state;
pub mod messages;
pub mod orchestrator;
pub mod outputs;
pub mod prompts;
pub mod roles;
pub mod state;
pub mod step_tracker;
pub mod sub_workflow;

pub use loop_state::{LoopPhase, LoopState};
pub use messages::{AgentMessage, MessageKind, MessageLog, ORCHESTRATOR};
pub use orchestrator::{Orchestrator, SessionOutcome, Transition};
pub use roles::{RoleOutput, RoleRegistry};
pub use state::{Decision, Role, SessionId, SessionState, SENTINEL_ANSWER};
pub use step_tracker::StepTracker;
pub use sub_workflow::SubWorkflowRunner;
