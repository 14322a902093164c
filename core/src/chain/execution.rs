// stepchain/src/chain/execution.rs

//! Contains the `Chain::execute()` method, which schedules the chain's steps and runs them one
//! at a time against a fresh `ChainContext`.

use crate::chain::definition::Chain;
use crate::chain::executor::StepExecutor;
use crate::chain::schedule;
use crate::core::context::{ChainContext, StepResult, META_CHAIN_ERROR, META_CHAIN_NAME, META_EXECUTION_ORDER};
use crate::core::control::{ChainControl, ChainOutcome};
use crate::core::generator::Generator;
use crate::core::step::Step;
use crate::error::{ChainError, ChainResult};
use tracing::{event, instrument, span, Instrument, Level};

/// Empty input set for chains whose templates only reference step outputs.
pub fn no_inputs() -> std::iter::Empty<(String, String)> {
  std::iter::empty()
}

impl Chain {
  /// Executes the chain with `generator` and the initial template `inputs`.
  ///
  /// Never fails: step failures are recorded as failed `StepResult`s, and faults of the run
  /// itself are recorded under the `chain_error` metadata key. The returned context is always
  /// complete.
  #[instrument(
    name = "Chain::execute",
    skip_all,
    fields(chain_name = %self.name, num_steps = self.steps.len(), fail_fast = self.fail_fast)
  )]
  pub async fn execute<G, I, K, V>(&self, generator: &G, inputs: I) -> ChainContext
  where
    G: Generator + ?Sized,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let mut ctx = ChainContext::new(inputs);
    ctx.set_metadata(META_CHAIN_NAME, self.name.as_str());
    event!(Level::DEBUG, "Chain execution starting.");

    let outcome = match self.run_scheduled(generator, &mut ctx).await {
      Ok(outcome) => outcome,
      Err(err) => {
        event!(Level::ERROR, error = %err, "Chain execution aborted.");
        ctx.set_metadata(META_CHAIN_ERROR, err.to_string());
        ChainOutcome::Aborted
      }
    };
    ctx.finish(outcome);

    event!(
      Level::INFO,
      outcome = outcome.as_str(),
      succeeded = ctx.success_count(),
      failed = ctx.failure_count(),
      elapsed_seconds = ctx.execution_time_seconds(),
      "Chain execution finished."
    );
    ctx
  }

  async fn run_scheduled<G>(&self, generator: &G, ctx: &mut ChainContext) -> ChainResult<ChainOutcome>
  where
    G: Generator + ?Sized,
  {
    let order = schedule::execution_order(&self.steps)?;
    ctx.set_metadata(META_EXECUTION_ORDER, order.clone());
    event!(Level::DEBUG, order = ?order, "Execution order resolved.");

    let executor = StepExecutor::new(generator);
    for (step_idx, step_name) in order.iter().enumerate() {
      let step = self
        .get_step(step_name)
        .ok_or_else(|| ChainError::Internal(format!("scheduled step '{step_name}' is not in the chain")))?;

      let step_span = span!(
        Level::INFO,
        "chain_step_execution",
        step_name = step_name.as_str(),
        step_index = step_idx
      );
      let result = executor.execute(step, ctx).instrument(step_span).await?;

      if self.control_after(step, result) == ChainControl::Stop {
        event!(Level::INFO, step_name = step_name.as_str(), "Chain stopped by a failing step.");
        return Ok(ChainOutcome::Stopped);
      }
    }
    Ok(ChainOutcome::Completed)
  }

  fn control_after(&self, step: &Step, result: &StepResult) -> ChainControl {
    match &result.error {
      None => ChainControl::Continue,
      Some(err) => {
        event!(Level::WARN, error = %err, skipped = result.is_skipped(), "Step failed.");
        if self.fail_fast && step.config.halts_chain_on_failure() {
          ChainControl::Stop
        } else {
          ChainControl::Continue
        }
      }
    }
  }
}
