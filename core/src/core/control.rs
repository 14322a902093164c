// stepchain/src/core/control.rs

//! Defines signals for controlling chain flow and the outcome of a chain run.

use serde::{Deserialize, Serialize};

/// Decision taken after a step has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainControl {
  /// Move on to the next scheduled step.
  Continue,
  /// Halt the run. No further steps are attempted or recorded.
  Stop,
}

/// Outcome of a full chain execution, recorded in the context metadata under `outcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainOutcome {
  /// Every scheduled step was attempted. Some of them may have failed.
  Completed,
  /// A failing step halted a fail-fast chain.
  Stopped,
  /// The run could not proceed (scheduling fault or internal error); see `chain_error`.
  Aborted,
}

impl ChainOutcome {
  pub fn as_str(&self) -> &'static str {
    match self {
      ChainOutcome::Completed => "completed",
      ChainOutcome::Stopped => "stopped",
      ChainOutcome::Aborted => "aborted",
    }
  }
}
