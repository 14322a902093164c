// stepchain/src/error.rs

//! Error types.
//!
//! `ChainError` covers failures that stop a caller outright: structural problems found while
//! building a chain, scheduling faults, registry lookups and definition loading.
//! `StepError` covers failures of a single step. Those are never returned from
//! `Chain::execute`; they are recorded on the step's `StepResult` instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
  #[error("Duplicate step names: {}", names.join(", "))]
  DuplicateStepName { names: Vec<String> },

  #[error("Step '{step_name}' depends on unknown step '{dependency}'")]
  UnknownDependency { step_name: String, dependency: String },

  #[error("Cyclic dependency involving step '{step_name}' ({})", cycle.join(" -> "))]
  CyclicDependency { step_name: String, cycle: Vec<String> },

  #[error("Unable to schedule steps with unresolved dependencies: {}", remaining.join(", "))]
  UnresolvedDependency { remaining: Vec<String> },

  #[error("Chain not found: {chain_name}")]
  ChainNotFound { chain_name: String },

  #[error("Invalid chain definition. Source: {source}")]
  InvalidDefinition {
    #[from]
    source: serde_json::Error,
  },

  #[error("Internal stepchain error: {0}")]
  Internal(String),
}

impl ChainError {
  /// True for the errors raised while validating a step set.
  pub fn is_structural(&self) -> bool {
    matches!(
      self,
      ChainError::DuplicateStepName { .. }
        | ChainError::UnknownDependency { .. }
        | ChainError::CyclicDependency { .. }
    )
  }
}

pub type ChainResult<T, E = ChainError> = std::result::Result<T, E>;

/// What went wrong on the last attempt of a step that exhausted its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationFailureKind {
  /// The generator returned an error.
  Generator,
  /// The generator did not answer within the step's timeout.
  Timeout,
  /// The step's output transform failed.
  Transform,
}

impl std::fmt::Display for GenerationFailureKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      GenerationFailureKind::Generator => "generator",
      GenerationFailureKind::Timeout => "timeout",
      GenerationFailureKind::Transform => "transform",
    };
    f.write_str(s)
  }
}

/// A failure localized to one step, recorded on its `StepResult`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepError {
  #[error("Step '{step_name}' is missing successful results for dependencies: {}", missing.join(", "))]
  MissingDependencyResult { step_name: String, missing: Vec<String> },

  #[error(
    "Step '{step_name}' references unknown template variable '{variable}'. Available variables: [{}]",
    available.join(", ")
  )]
  MissingTemplateVariable {
    step_name: String,
    variable: String,
    available: Vec<String>,
  },

  #[error("Step '{step_name}' has a malformed template at byte {position}: {reason}")]
  MalformedTemplate {
    step_name: String,
    position: usize,
    reason: String,
  },

  #[error("Step '{step_name}' failed after {attempts} attempt(s) ({kind}): {message}")]
  GenerationFailure {
    step_name: String,
    attempts: u32,
    kind: GenerationFailureKind,
    message: String,
  },
}

impl StepError {
  pub fn step_name(&self) -> &str {
    match self {
      StepError::MissingDependencyResult { step_name, .. }
      | StepError::MissingTemplateVariable { step_name, .. }
      | StepError::MalformedTemplate { step_name, .. }
      | StepError::GenerationFailure { step_name, .. } => step_name,
    }
  }
}
