// stepchain/src/chain/definition.rs

//! Contains the `Chain` struct definition and methods for its construction and structural
//! modification. Every modification re-validates the whole step set, so a `Chain` value is
//! always valid.

use crate::chain::schedule;
use crate::chain::validation::validate_steps;
use crate::core::step::Step;
use crate::error::ChainResult;
use tracing::{event, Level};

pub const DEFAULT_CHAIN_NAME: &str = "chain";

/// A validated set of steps plus the chain-level failure policy.
#[derive(Debug, Clone)]
pub struct Chain {
  /// Steps in insertion order (not execution order).
  pub(crate) steps: Vec<Step>,
  pub(crate) name: String,
  /// Stop at the first failing required step.
  pub(crate) fail_fast: bool,
}

impl Chain {
  /// Creates a fail-fast chain, rejecting duplicate names, unknown dependencies and cycles.
  pub fn new(name: impl Into<String>, steps: Vec<Step>) -> ChainResult<Self> {
    let name = name.into();
    if let Err(err) = validate_steps(&steps) {
      event!(Level::DEBUG, chain_name = %name, error = %err, "Chain rejected.");
      return Err(err);
    }
    event!(Level::DEBUG, chain_name = %name, num_steps = steps.len(), "Chain created.");
    Ok(Self {
      steps,
      name,
      fail_fast: true,
    })
  }

  pub fn from_steps(steps: Vec<Step>) -> ChainResult<Self> {
    Self::new(DEFAULT_CHAIN_NAME, steps)
  }

  pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
    self.fail_fast = fail_fast;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_fail_fast(&self) -> bool {
    self.fail_fast
  }

  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  pub fn get_step(&self, step_name: &str) -> Option<&Step> {
    self.steps.iter().find(|s| s.name == step_name)
  }

  /// Step names in construction order.
  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  /// The order `execute` will run the steps in.
  pub fn execution_order(&self) -> ChainResult<Vec<String>> {
    schedule::execution_order(&self.steps)
  }

  // --- Structural modification ---

  /// Appends a step. The chain is left untouched if the result would be invalid.
  pub fn add_step(&mut self, step: Step) -> ChainResult<()> {
    self.steps.push(step);
    if let Err(err) = validate_steps(&self.steps) {
      self.steps.pop();
      event!(Level::DEBUG, chain_name = %self.name, error = %err, "Step addition rejected.");
      return Err(err);
    }
    Ok(())
  }

  /// Removes a step by name.
  ///
  /// Returns `false` when no such step exists, or when other steps still depend on it (the
  /// chain would otherwise reference an unknown step).
  pub fn remove_step(&mut self, step_name: &str) -> bool {
    let Some(idx) = self.steps.iter().position(|s| s.name == step_name) else {
      return false;
    };
    let removed = self.steps.remove(idx);
    if let Err(err) = validate_steps(&self.steps) {
      event!(Level::WARN, chain_name = %self.name, %step_name, error = %err, "Step removal rejected.");
      self.steps.insert(idx, removed);
      return false;
    }
    true
  }
}
