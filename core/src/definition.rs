// stepchain/src/definition.rs

//! Declarative chain definitions.
//!
//! A `ChainDefinition` describes a chain as plain data so it can be loaded from JSON (or any
//! other serde format). Output transforms are code and cannot be expressed here; attach them
//! to the built steps instead.
//!
//! ```json
//! {
//!   "name": "docs",
//!   "fail_fast": true,
//!   "steps": [
//!     { "name": "analyze", "template": "Analyze: {code}" },
//!     { "name": "documentation", "template": "{analyze}", "depends_on": ["analyze"],
//!       "config": { "retry_count": 2 } }
//!   ]
//! }
//! ```

use crate::chain::definition::{Chain, DEFAULT_CHAIN_NAME};
use crate::core::step::{Step, StepConfig};
use crate::error::ChainResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
  pub name: String,
  pub template: String,
  #[serde(default)]
  pub depends_on: Vec<String>,
  #[serde(default)]
  pub config: StepConfig,
  #[serde(default)]
  pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainDefinition {
  #[serde(default = "default_chain_name")]
  pub name: String,
  #[serde(default = "default_fail_fast")]
  pub fail_fast: bool,
  pub steps: Vec<StepDefinition>,
}

fn default_chain_name() -> String {
  DEFAULT_CHAIN_NAME.to_string()
}

fn default_fail_fast() -> bool {
  true
}

impl ChainDefinition {
  pub fn from_json_str(json: &str) -> ChainResult<Self> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn from_json_value(value: Value) -> ChainResult<Self> {
    Ok(serde_json::from_value(value)?)
  }

  /// Builds and validates the chain.
  pub fn into_chain(self) -> ChainResult<Chain> {
    let steps = self.steps.into_iter().map(Step::from).collect();
    Ok(Chain::new(self.name, steps)?.with_fail_fast(self.fail_fast))
  }
}

impl From<StepDefinition> for Step {
  fn from(def: StepDefinition) -> Self {
    Step {
      name: def.name,
      template: def.template,
      depends_on: Vec::new(),
      config: def.config,
      transform: None,
      metadata: def.metadata,
    }
    .depends_on(def.depends_on)
  }
}

impl From<&Step> for StepDefinition {
  fn from(step: &Step) -> Self {
    StepDefinition {
      name: step.name.clone(),
      template: step.template.clone(),
      depends_on: step.depends_on.clone(),
      config: step.config.clone(),
      metadata: step.metadata.clone(),
    }
  }
}

impl Chain {
  /// Data-only description of this chain. Transforms are not carried over.
  pub fn to_definition(&self) -> ChainDefinition {
    ChainDefinition {
      name: self.name.clone(),
      fail_fast: self.fail_fast,
      steps: self.steps.iter().map(StepDefinition::from).collect(),
    }
  }
}
