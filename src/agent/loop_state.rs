//! Sub-workflow loop state
//!
//! Tracks the phase and iteration count of a researcher or expert
//! tool-calling loop.

use crate::core::{ConclaveError, Result};

/// Phase of the tool-calling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Waiting on the model
    Reasoning,
    /// Running the tools the model requested
    ToolDispatch,
    /// A final structured result was produced
    Done,
}

/// State of one sub-workflow run
#[derive(Debug, Clone)]
pub struct LoopState {
    pub phase: LoopPhase,
    /// Reasoning iterations started so far
    pub iteration: usize,
    pub max_iterations: usize,
}

impl LoopState {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            phase: LoopPhase::Reasoning,
            iteration: 0,
            max_iterations,
        }
    }

    /// Start a reasoning iteration, failing once the hard cap is reached
    pub fn begin_reasoning(&mut self, role: &str) -> Result<()> {
        if self.iteration >= self.max_iterations {
            return Err(ConclaveError::SubworkflowIterationExceeded {
                role: role.to_string(),
                limit: self.max_iterations,
            });
        }
        self.iteration += 1;
        self.phase = LoopPhase::Reasoning;
        Ok(())
    }

    pub fn dispatch_tools(&mut self) {
        self.phase = LoopPhase::ToolDispatch;
    }

    pub fn finish(&mut self) {
        self.phase = LoopPhase::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_cap() {
        let mut state = LoopState::new(2);
        assert!(state.begin_reasoning("expert").is_ok());
        state.dispatch_tools();
        assert_eq!(state.phase, LoopPhase::ToolDispatch);
        assert!(state.begin_reasoning("expert").is_ok());

        let err = state.begin_reasoning("expert").unwrap_err();
        assert!(matches!(
            err,
            ConclaveError::SubworkflowIterationExceeded { limit: 2, .. }
        ));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_finish() {
        let mut state = LoopState::new(1);
        state.begin_reasoning("researcher").unwrap();
        state.finish();
        assert_eq!(state.phase, LoopPhase::Done);
        assert_eq!(state.iteration, 1);
    }
}
