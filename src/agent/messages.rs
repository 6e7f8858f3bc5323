//! Inter-agent message log
//!
//! Append-only record of every instruction the orchestrator sends and every
//! response a role returns. Roles only ever see their own slice of it,
//! selected by participant pair and, for research, by sub-task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ConclaveError, Message, Result};

/// Participant name of the orchestrator in the log
pub const ORCHESTRATOR: &str = "orchestrator";

/// Direction of an inter-agent message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Instruction,
    Response,
}

/// A message exchanged between the orchestrator and a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub sender: String,
    pub receiver: String,
    pub kind: MessageKind,
    pub content: String,
    /// Research sub-task this message belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_task_id: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        kind: MessageKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            kind,
            content: content.into(),
            sub_task_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Instruction from the orchestrator to a role
    pub fn instruction(receiver: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(ORCHESTRATOR, receiver, MessageKind::Instruction, content)
    }

    /// Response from a role to the orchestrator
    pub fn response(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(sender, ORCHESTRATOR, MessageKind::Response, content)
    }

    /// Tag the message with a research sub-task
    pub fn with_sub_task(mut self, sub_task_id: usize) -> Self {
        self.sub_task_id = Some(sub_task_id);
        self
    }

    /// Chat turn as seen by the receiving role: orchestrator text is user input
    pub fn as_turn(&self) -> Message {
        if self.sender == ORCHESTRATOR {
            Message::user(self.content.clone())
        } else {
            Message::assistant(self.content.clone())
        }
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("sender", &self.sender),
            ("receiver", &self.receiver),
            ("content", &self.content),
        ] {
            if value.trim().is_empty() {
                return Err(ConclaveError::validation(format!(
                    "agent message is missing its {}",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Ordered, append-only message log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog {
    messages: Vec<AgentMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message; fails only on a message missing sender, receiver or content
    pub fn append(&mut self, message: AgentMessage) -> Result<()> {
        message.validate()?;
        self.messages.push(message);
        Ok(())
    }

    /// Messages exchanged between two participants, in append order
    ///
    /// When `sub_task_id` is given only messages tagged with it are returned.
    pub fn conversation_between(
        &self,
        role_a: &str,
        role_b: &str,
        sub_task_id: Option<usize>,
    ) -> Vec<&AgentMessage> {
        self.messages
            .iter()
            .filter(|m| {
                (m.sender == role_a && m.receiver == role_b)
                    || (m.sender == role_b && m.receiver == role_a)
            })
            .filter(|m| sub_task_id.is_none() || m.sub_task_id == sub_task_id)
            .collect()
    }

    /// Most recent message between two participants
    pub fn last_between(
        &self,
        role_a: &str,
        role_b: &str,
        sub_task_id: Option<usize>,
    ) -> Option<&AgentMessage> {
        self.conversation_between(role_a, role_b, sub_task_id)
            .last()
            .copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Convert a log slice into chat turns for a role
pub fn to_turns<'a>(messages: impl IntoIterator<Item = &'a AgentMessage>) -> Vec<Message> {
    messages.into_iter().map(AgentMessage::as_turn).collect()
}
