// stepchain/src/core/context.rs

//! Defines `ChainContext`, the record of one chain execution, and `StepResult`, the outcome of
//! running one step once.
//!
//! A context is created by `Chain::execute`, owned by that call, and handed back to the caller
//! once the run is finished. From then on it is read-only: `record` refuses new results after
//! `finish` has run.

use crate::core::control::ChainOutcome;
use crate::error::{ChainError, ChainResult, StepError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

pub const META_CHAIN_NAME: &str = "chain_name";
pub const META_EXECUTION_ORDER: &str = "execution_order";
pub const META_OUTCOME: &str = "outcome";
pub const META_CHAIN_ERROR: &str = "chain_error";

/// Outcome of one step. `error` is present iff the step failed, in which case `output` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
  pub step_name: String,
  pub output: String,
  pub metadata: BTreeMap<String, Value>,
  pub execution_time_seconds: f64,
  pub error: Option<StepError>,
  pub timestamp: DateTime<Utc>,
}

impl StepResult {
  pub fn success(
    step_name: impl Into<String>,
    output: String,
    metadata: BTreeMap<String, Value>,
    elapsed: Duration,
  ) -> Self {
    Self {
      step_name: step_name.into(),
      output,
      metadata,
      execution_time_seconds: elapsed.as_secs_f64(),
      error: None,
      timestamp: Utc::now(),
    }
  }

  pub fn failure(error: StepError, metadata: BTreeMap<String, Value>, elapsed: Duration) -> Self {
    Self {
      step_name: error.step_name().to_string(),
      output: String::new(),
      metadata,
      execution_time_seconds: elapsed.as_secs_f64(),
      error: Some(error),
      timestamp: Utc::now(),
    }
  }

  pub fn is_success(&self) -> bool {
    self.error.is_none()
  }

  /// A failure recorded for a step configured with `skip_on_failure`.
  pub fn is_skipped(&self) -> bool {
    self.metadata.get("skipped").and_then(Value::as_bool).unwrap_or(false)
  }

  /// Attempt number that produced the output, for successful results.
  pub fn attempt(&self) -> Option<u64> {
    self.metadata.get("attempt").and_then(Value::as_u64)
  }
}

#[derive(Debug, Clone)]
pub struct ChainContext {
  inputs: BTreeMap<String, String>,
  results: Vec<StepResult>,
  index: HashMap<String, usize>,
  metadata: BTreeMap<String, Value>,
  start_time: DateTime<Utc>,
  end_time: Option<DateTime<Utc>>,
  started: Instant,
  elapsed: Option<Duration>,
  current_step: Option<String>,
}

impl ChainContext {
  pub fn new<I, K, V>(inputs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    Self {
      inputs: inputs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
      results: Vec::new(),
      index: HashMap::new(),
      metadata: BTreeMap::new(),
      start_time: Utc::now(),
      end_time: None,
      started: Instant::now(),
      elapsed: None,
      current_step: None,
    }
  }

  // --- Inputs and results ---

  pub fn inputs(&self) -> &BTreeMap<String, String> {
    &self.inputs
  }

  pub fn input(&self, name: &str) -> Option<&str> {
    self.inputs.get(name).map(String::as_str)
  }

  /// Results in execution order.
  pub fn results(&self) -> &[StepResult] {
    &self.results
  }

  pub fn get_result(&self, step_name: &str) -> Option<&StepResult> {
    self.index.get(step_name).map(|&i| &self.results[i])
  }

  pub fn has_result(&self, step_name: &str) -> bool {
    self.index.contains_key(step_name)
  }

  /// Output of a step that succeeded. Failed and unknown steps yield `None`.
  pub fn get_output(&self, step_name: &str) -> Option<&str> {
    self
      .get_result(step_name)
      .filter(|r| r.is_success())
      .map(|r| r.output.as_str())
  }

  /// `(step_name, output)` for every successful step, in execution order.
  pub fn get_all_outputs(&self) -> Vec<(&str, &str)> {
    self
      .results
      .iter()
      .filter(|r| r.is_success())
      .map(|r| (r.step_name.as_str(), r.output.as_str()))
      .collect()
  }

  pub fn get_failed_steps(&self) -> Vec<&str> {
    self
      .results
      .iter()
      .filter(|r| !r.is_success())
      .map(|r| r.step_name.as_str())
      .collect()
  }

  pub fn success_count(&self) -> usize {
    self.results.iter().filter(|r| r.is_success()).count()
  }

  pub fn failure_count(&self) -> usize {
    self.results.len() - self.success_count()
  }

  // --- Run state ---

  pub fn is_complete(&self) -> bool {
    self.end_time.is_some()
  }

  pub fn start_time(&self) -> DateTime<Utc> {
    self.start_time
  }

  pub fn end_time(&self) -> Option<DateTime<Utc>> {
    self.end_time
  }

  /// Wall-clock duration of the run; still growing while the run is in flight.
  pub fn execution_time_seconds(&self) -> f64 {
    self.elapsed.unwrap_or_else(|| self.started.elapsed()).as_secs_f64()
  }

  pub fn current_step(&self) -> Option<&str> {
    self.current_step.as_deref()
  }

  pub fn metadata(&self) -> &BTreeMap<String, Value> {
    &self.metadata
  }

  pub fn chain_name(&self) -> Option<&str> {
    self.metadata.get(META_CHAIN_NAME).and_then(Value::as_str)
  }

  pub fn execution_order(&self) -> Vec<&str> {
    self
      .metadata
      .get(META_EXECUTION_ORDER)
      .and_then(Value::as_array)
      .map(|names| names.iter().filter_map(Value::as_str).collect())
      .unwrap_or_default()
  }

  /// Set when the run itself could not proceed, as opposed to individual steps failing.
  pub fn chain_error(&self) -> Option<&str> {
    self.metadata.get(META_CHAIN_ERROR).and_then(Value::as_str)
  }

  pub fn outcome(&self) -> Option<ChainOutcome> {
    self
      .metadata
      .get(META_OUTCOME)
      .and_then(|v| serde_json::from_value(v.clone()).ok())
  }

  // --- Mutation, used by the chain while it runs ---

  pub(crate) fn set_metadata(&mut self, key: &str, value: impl Into<Value>) {
    self.metadata.insert(key.to_string(), value.into());
  }

  pub(crate) fn set_current_step(&mut self, step_name: Option<&str>) {
    self.current_step = step_name.map(str::to_string);
  }

  /// Appends a result. A step may be recorded once, and nothing is recorded after `finish`.
  pub(crate) fn record(&mut self, result: StepResult) -> ChainResult<()> {
    if self.is_complete() {
      return Err(ChainError::Internal(format!(
        "result for step '{}' recorded after the run finished",
        result.step_name
      )));
    }
    if self.index.contains_key(&result.step_name) {
      return Err(ChainError::Internal(format!(
        "step '{}' already has a result",
        result.step_name
      )));
    }
    self.index.insert(result.step_name.clone(), self.results.len());
    self.results.push(result);
    Ok(())
  }

  pub(crate) fn finish(&mut self, outcome: ChainOutcome) {
    if self.is_complete() {
      return;
    }
    self.current_step = None;
    self.set_metadata(META_OUTCOME, outcome.as_str());
    self.elapsed = Some(self.started.elapsed());
    self.end_time = Some(Utc::now());
  }

  // --- Serialization ---

  pub fn to_snapshot(&self) -> ContextSnapshot {
    ContextSnapshot {
      inputs: self.inputs.clone(),
      results: self.results.clone(),
      metadata: self.metadata.clone(),
      start_time: self.start_time,
      end_time: self.end_time,
      execution_time_seconds: self.execution_time_seconds(),
      success_count: self.success_count(),
      failure_count: self.failure_count(),
      is_complete: self.is_complete(),
    }
  }

  pub fn to_json(&self) -> serde_json::Result<Value> {
    serde_json::to_value(self.to_snapshot())
  }
}

/// Serializable form of a `ChainContext`, for logging or persistence by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
  pub inputs: BTreeMap<String, String>,
  pub results: Vec<StepResult>,
  pub metadata: BTreeMap<String, Value>,
  pub start_time: DateTime<Utc>,
  pub end_time: Option<DateTime<Utc>>,
  pub execution_time_seconds: f64,
  pub success_count: usize,
  pub failure_count: usize,
  pub is_complete: bool,
}
