// stepchain/src/core/step.rs

//! Defines a single step of a chain: its prompt template, dependencies, retry and timeout
//! configuration, and optional output transform.

use crate::core::context::ChainContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

// Type alias for an output transform.
// Receives the raw generator output and a read-only view of the running context.
// Uses Arc so steps stay cheap to clone.
pub type Transform = Arc<dyn Fn(&str, &ChainContext) -> anyhow::Result<String> + Send + Sync + 'static>;

/// Retry, timeout and failure-policy settings for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
  /// Upper bound for a single generator call. Zero or negative disables the bound.
  pub timeout_seconds: f64,
  /// Additional attempts after the first one.
  pub retry_count: u32,
  /// Pause between attempts.
  pub retry_delay_seconds: f64,
  /// A failing non-required step never stops a fail-fast chain.
  pub required: bool,
  /// The step's failure is recorded as skipped and the chain carries on.
  pub skip_on_failure: bool,
}

impl Default for StepConfig {
  fn default() -> Self {
    Self {
      timeout_seconds: 300.0,
      retry_count: 0,
      retry_delay_seconds: 1.0,
      required: true,
      skip_on_failure: false,
    }
  }
}

impl StepConfig {
  pub fn with_timeout_seconds(mut self, seconds: f64) -> Self {
    self.timeout_seconds = seconds;
    self
  }

  pub fn with_retries(mut self, retry_count: u32, retry_delay_seconds: f64) -> Self {
    self.retry_count = retry_count;
    self.retry_delay_seconds = retry_delay_seconds;
    self
  }

  pub fn optional(mut self) -> Self {
    self.required = false;
    self
  }

  pub fn skip_on_failure(mut self) -> Self {
    self.skip_on_failure = true;
    self
  }

  pub fn max_attempts(&self) -> u32 {
    self.retry_count.saturating_add(1)
  }

  pub fn timeout(&self) -> Option<Duration> {
    seconds_to_duration(self.timeout_seconds).filter(|d| !d.is_zero())
  }

  pub fn retry_delay(&self) -> Duration {
    seconds_to_duration(self.retry_delay_seconds).unwrap_or(Duration::ZERO)
  }

  /// Whether a failure of this step stops a fail-fast chain.
  pub fn halts_chain_on_failure(&self) -> bool {
    self.required && !self.skip_on_failure
  }
}

fn seconds_to_duration(seconds: f64) -> Option<Duration> {
  if seconds.is_finite() && seconds > 0.0 {
    Duration::try_from_secs_f64(seconds).ok()
  } else {
    None
  }
}

/// Definition of a chain step.
///
/// Steps are built with `Step::new` and the `with_*` / `depends_on` methods. Once a step is
/// part of a `Chain` it cannot be changed; mutation goes through `Chain::add_step` and
/// `Chain::remove_step`, which re-validate the whole chain.
#[derive(Clone)]
pub struct Step {
  pub(crate) name: String,
  pub(crate) template: String,
  pub(crate) depends_on: Vec<String>,
  pub(crate) config: StepConfig,
  pub(crate) transform: Option<Transform>,
  pub(crate) metadata: BTreeMap<String, Value>,
}

impl Step {
  pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      template: template.into(),
      depends_on: Vec::new(),
      config: StepConfig::default(),
      transform: None,
      metadata: BTreeMap::new(),
    }
  }

  /// Adds dependencies. Repeated names are kept once, in first-seen order.
  pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for dep in dependencies {
      let dep = dep.into();
      if !self.depends_on.contains(&dep) {
        self.depends_on.push(dep);
      }
    }
    self
  }

  pub fn with_config(mut self, config: StepConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_transform(
    mut self,
    transform: impl Fn(&str, &ChainContext) -> anyhow::Result<String> + Send + Sync + 'static,
  ) -> Self {
    self.transform = Some(Arc::new(transform));
    self
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.metadata.insert(key.into(), value.into());
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn template(&self) -> &str {
    &self.template
  }

  pub fn dependencies(&self) -> &[String] {
    &self.depends_on
  }

  pub fn config(&self) -> &StepConfig {
    &self.config
  }

  pub fn has_transform(&self) -> bool {
    self.transform.is_some()
  }

  pub fn metadata(&self) -> &BTreeMap<String, Value> {
    &self.metadata
  }
}

// Transform (Arc<dyn Fn...>) has no Debug, so print whether one is present.
impl std::fmt::Debug for Step {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Step")
      .field("name", &self.name)
      .field("template", &self.template)
      .field("depends_on", &self.depends_on)
      .field("config", &self.config)
      .field("transform_present", &self.transform.is_some())
      .field("metadata", &self.metadata)
      .finish()
  }
}
