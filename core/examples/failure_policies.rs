// stepchain/examples/failure_policies.rs

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stepchain::{generator_fn, no_inputs, Chain, ChainContext, Step, StepConfig};
use tracing::{info, warn};

fn report(label: &str, ctx: &ChainContext) {
  info!(
    "[{label}] outcome={:?} ok={} failed={:?}",
    ctx.outcome(),
    ctx.success_count(),
    ctx.get_failed_steps()
  );
  for result in ctx.results() {
    if let Some(err) = &result.error {
      warn!("[{label}]   {} -> {err} (skipped: {})", result.step_name, result.is_skipped());
    }
  }
}

fn steps() -> Vec<Step> {
  vec![
    Step::new("fetch", "fetch"),
    Step::new("broken", "broken {fetch}").depends_on(["fetch"]),
    Step::new("independent", "independent"),
  ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Failure Policies Example ---");

  // Fails every prompt that starts with "broken".
  let generator = generator_fn(|prompt: String| async move {
    if prompt.starts_with("broken") {
      anyhow::bail!("model refused the prompt");
    }
    Ok::<_, anyhow::Error>(format!("done: {prompt}"))
  });

  // Scenario 1: fail-fast (default). `independent` never runs.
  let fail_fast = Chain::from_steps(steps())?;
  report("fail-fast", &fail_fast.execute(&generator, no_inputs()).await);

  // Scenario 2: run to the end.
  let run_all = Chain::from_steps(steps())?.with_fail_fast(false);
  report("continue", &run_all.execute(&generator, no_inputs()).await);

  // Scenario 3: an optional step does not stop a fail-fast chain.
  let mut optional_steps = steps();
  optional_steps[1] = Step::new("broken", "broken {fetch}")
    .depends_on(["fetch"])
    .with_config(StepConfig::default().optional());
  report("optional", &Chain::from_steps(optional_steps)?.execute(&generator, no_inputs()).await);

  // Scenario 4: retries. The generator fails twice before answering.
  let calls = Arc::new(AtomicU32::new(0));
  let flaky_calls = Arc::clone(&calls);
  let flaky = generator_fn(move |prompt: String| {
    let calls = Arc::clone(&flaky_calls);
    async move {
      if calls.fetch_add(1, Ordering::SeqCst) < 2 {
        anyhow::bail!("transient error");
      }
      Ok::<_, anyhow::Error>(format!("finally: {prompt}"))
    }
  });
  let retrying = Chain::from_steps(vec![
    Step::new("retry_me", "hello").with_config(StepConfig::default().with_retries(3, 0.05))
  ])?;
  let ctx = retrying.execute(&flaky, no_inputs()).await;
  info!(
    "[retry] output={:?} attempt={:?} calls={}",
    ctx.get_output("retry_me"),
    ctx.get_result("retry_me").and_then(|r| r.attempt()),
    calls.load(Ordering::SeqCst)
  );

  // Scenario 5: timeouts are enforced per attempt.
  let slow = generator_fn(|prompt: String| async move {
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok::<_, anyhow::Error>(prompt)
  });
  let timed = Chain::from_steps(vec![
    Step::new("slow", "slow").with_config(StepConfig::default().with_timeout_seconds(0.05))
  ])?;
  report("timeout", &timed.execute(&slow, no_inputs()).await);

  info!("--- Failure Policies Example Complete ---");
  Ok(())
}
