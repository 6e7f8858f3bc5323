//! Position within the planner's research steps

use serde::{Deserialize, Serialize};

use crate::core::{ConclaveError, Result};

/// Current research sub-task index, `-1` before the first sub-task starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepTracker {
    index: i64,
}

impl StepTracker {
    pub fn new() -> Self {
        Self { index: -1 }
    }

    /// Raw index, `-1` when research has not started
    pub fn current(&self) -> i64 {
        self.index
    }

    /// Index of the active sub-task
    pub fn active(&self) -> Option<usize> {
        usize::try_from(self.index).ok()
    }

    /// Move to the next sub-task, refusing to step past the last one
    pub fn advance(&mut self, total_steps: usize) -> Result<usize> {
        let next = self.index + 1;
        if next >= total_steps as i64 {
            return Err(ConclaveError::validation(format!(
                "cannot advance past research step {} of {}",
                self.index, total_steps
            )));
        }
        self.index = next;
        Ok(next as usize)
    }

    /// Stay on the current sub-task
    pub fn retry(&self) -> Option<usize> {
        self.active()
    }

    /// Whether the last research step is the active one
    pub fn is_complete(&self, total_steps: usize) -> bool {
        total_steps > 0 && self.index == total_steps as i64 - 1
    }

    pub fn reset(&mut self) {
        self.index = -1;
    }
}

impl Default for StepTracker {
    fn default() -> Self {
        Self::new()
    }
}
