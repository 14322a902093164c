// stepchain/src/chain/executor.rs

//! Runs a single step against the running context.
//!
//! A step goes through three phases: the readiness check (every dependency succeeded), template
//! resolution, and the retry loop around the generator and the optional transform. Whatever
//! happens, exactly one `StepResult` is appended to the context.

use crate::core::context::{ChainContext, StepResult};
use crate::core::generator::Generator;
use crate::core::step::{Step, Transform};
use crate::core::template::{self, TemplateError, TemplateVars};
use crate::error::{ChainError, ChainResult, GenerationFailureKind, StepError};
use futures::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{event, instrument, Level};

/// Builds the variables a step's template can see.
///
/// Sources, later ones overriding earlier ones on a name clash:
/// 1. every context input,
/// 2. each dependency's output as `<dep>` and `<dep>_output`,
/// 3. every successful step so far as `step_<name>`.
pub fn resolve_variables(step: &Step, ctx: &ChainContext) -> TemplateVars {
  let mut vars: TemplateVars = ctx.inputs().clone();
  for dep in &step.depends_on {
    if let Some(output) = ctx.get_output(dep) {
      vars.insert(dep.clone(), output.to_string());
      vars.insert(format!("{dep}_output"), output.to_string());
    }
  }
  for (name, output) in ctx.get_all_outputs() {
    vars.insert(format!("step_{name}"), output.to_string());
  }
  vars
}

// Why a single attempt failed.
struct AttemptFailure {
  kind: GenerationFailureKind,
  message: String,
}

pub struct StepExecutor<'g, G: Generator + ?Sized> {
  generator: &'g G,
}

impl<'g, G: Generator + ?Sized> StepExecutor<'g, G> {
  pub fn new(generator: &'g G) -> Self {
    Self { generator }
  }

  /// Runs `step` and appends its result to `ctx`.
  ///
  /// Step failures are part of the returned result. An `Err` means the context refused the
  /// result (the step already ran, or the run is finished).
  pub async fn execute<'c>(&self, step: &Step, ctx: &'c mut ChainContext) -> ChainResult<&'c StepResult> {
    ctx.set_current_step(Some(&step.name));
    let result = self.run(step, ctx).await;
    ctx.record(result)?;
    ctx
      .get_result(&step.name)
      .ok_or_else(|| ChainError::Internal(format!("result for step '{}' vanished", step.name)))
  }

  /// Runs `step` without touching the context.
  #[instrument(
    name = "StepExecutor::run",
    skip_all,
    fields(step_name = %step.name, max_attempts = step.config.max_attempts())
  )]
  pub async fn run(&self, step: &Step, ctx: &ChainContext) -> StepResult {
    let started = Instant::now();
    let mut metadata = step.metadata.clone();
    metadata.insert("dependencies".to_string(), json!(step.depends_on));

    let missing: Vec<String> = step
      .depends_on
      .iter()
      .filter(|dep| ctx.get_output(dep).is_none())
      .cloned()
      .collect();
    if !missing.is_empty() {
      event!(Level::WARN, missing = ?missing, "Dependencies have no successful result.");
      let err = StepError::MissingDependencyResult {
        step_name: step.name.clone(),
        missing,
      };
      return failed(step, err, metadata, started);
    }

    let vars = resolve_variables(step, ctx);
    let prompt = match template::render(&step.template, &vars) {
      Ok(prompt) => prompt,
      Err(TemplateError::MissingVariable { variable }) => {
        let unresolved: Vec<String> = template::placeholders(&step.template)
          .unwrap_or_default()
          .into_iter()
          .filter(|name| !vars.contains_key(name))
          .collect();
        event!(Level::WARN, %variable, unresolved = ?unresolved, "Template references an unbound variable.");
        metadata.insert("unresolved_variables".to_string(), json!(unresolved));
        let err = StepError::MissingTemplateVariable {
          step_name: step.name.clone(),
          variable,
          available: vars.into_keys().collect(),
        };
        return failed(step, err, metadata, started);
      }
      Err(TemplateError::Malformed { position, reason }) => {
        event!(Level::WARN, position, %reason, "Template is malformed.");
        let err = StepError::MalformedTemplate {
          step_name: step.name.clone(),
          position,
          reason,
        };
        return failed(step, err, metadata, started);
      }
    };
    metadata.insert("prompt_length".to_string(), json!(prompt.chars().count()));

    let max_attempts = step.config.max_attempts();
    let mut last_failure = AttemptFailure {
      kind: GenerationFailureKind::Generator,
      message: String::new(),
    };
    for attempt in 1..=max_attempts {
      event!(Level::DEBUG, attempt, "Calling generator.");
      match self.attempt(step, &prompt, ctx).await {
        Ok(output) => {
          metadata.insert("attempt".to_string(), json!(attempt));
          metadata.insert("output_length".to_string(), json!(output.chars().count()));
          event!(Level::DEBUG, attempt, "Step succeeded.");
          return StepResult::success(step.name.clone(), output, metadata, started.elapsed());
        }
        Err(failure) => {
          event!(
            Level::WARN,
            attempt,
            kind = %failure.kind,
            error = %failure.message,
            "Step attempt failed."
          );
          last_failure = failure;
          let delay = step.config.retry_delay();
          if attempt < max_attempts && !delay.is_zero() {
            tokio::time::sleep(delay).await;
          }
        }
      }
    }

    metadata.insert("attempts".to_string(), json!(max_attempts));
    let err = StepError::GenerationFailure {
      step_name: step.name.clone(),
      attempts: max_attempts,
      kind: last_failure.kind,
      message: last_failure.message,
    };
    failed(step, err, metadata, started)
  }

  async fn attempt(&self, step: &Step, prompt: &str, ctx: &ChainContext) -> Result<String, AttemptFailure> {
    let call = AssertUnwindSafe(self.generator.generate(prompt)).catch_unwind();
    let caught = match step.config.timeout() {
      Some(limit) => match tokio::time::timeout(limit, call).await {
        Ok(caught) => caught,
        Err(_elapsed) => {
          return Err(AttemptFailure {
            kind: GenerationFailureKind::Timeout,
            message: format!("generator did not respond within {:.3}s", limit.as_secs_f64()),
          })
        }
      },
      None => call.await,
    };
    let generated = caught.map_err(|panic| AttemptFailure {
      kind: GenerationFailureKind::Generator,
      message: format!("generator panicked: {}", panic_message(panic.as_ref())),
    })?;
    let raw = generated.map_err(|e| AttemptFailure {
      kind: GenerationFailureKind::Generator,
      message: format!("{e:#}"),
    })?;

    match &step.transform {
      Some(transform) => apply_transform(transform, &raw, ctx),
      None => Ok(raw),
    }
  }
}

fn apply_transform(transform: &Transform, raw: &str, ctx: &ChainContext) -> Result<String, AttemptFailure> {
  match catch_unwind(AssertUnwindSafe(|| transform(raw, ctx))) {
    Ok(Ok(output)) => Ok(output),
    Ok(Err(e)) => Err(AttemptFailure {
      kind: GenerationFailureKind::Transform,
      message: format!("{e:#}"),
    }),
    Err(panic) => Err(AttemptFailure {
      kind: GenerationFailureKind::Transform,
      message: format!("transform panicked: {}", panic_message(panic.as_ref())),
    }),
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  payload
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| payload.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn failed(step: &Step, err: StepError, mut metadata: BTreeMap<String, Value>, started: Instant) -> StepResult {
  if step.config.skip_on_failure {
    metadata.insert("skipped".to_string(), Value::Bool(true));
  }
  StepResult::failure(err, metadata, started.elapsed())
}
