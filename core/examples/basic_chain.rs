// stepchain/examples/basic_chain.rs

use stepchain::{generator_fn, Chain, ChainError, Step};
use tracing::info;

// Stands in for a model client: echoes a short digest of the prompt it was given.
async fn fake_model(prompt: String) -> anyhow::Result<String> {
  let first_line = prompt.lines().next().unwrap_or_default();
  Ok(format!("<{} chars, starts with '{}'>", prompt.len(), first_line))
}

#[tokio::main]
async fn main() -> Result<(), ChainError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Basic Chain Example ---");

  // 1. Define steps. Templates reference inputs (`{code}`) and outputs of dependencies.
  let chain = Chain::new(
    "basic",
    vec![
      Step::new("analyze", "Analyze this code:\n{code}"),
      Step::new("summary", "Summarize the analysis:\n{analyze}").depends_on(["analyze"]),
      Step::new("title", "Give a title for:\n{summary_output}\n(analysis: {step_analyze})")
        .depends_on(["analyze", "summary"])
        .with_transform(|raw, _ctx| Ok(raw.to_uppercase())),
    ],
  )?;
  info!("Execution order: {:?}", chain.execution_order()?);

  // 2. Run it with a generator built from an async fn.
  let generator = generator_fn(fake_model);
  let ctx = chain.execute(&generator, [("code", "fn add(a: i32, b: i32) -> i32 { a + b }")]).await;

  // 3. Inspect the context.
  for (step_name, output) in ctx.get_all_outputs() {
    info!("{step_name}: {output}");
  }
  info!(
    "Succeeded: {}, failed: {}, took {:.3}s",
    ctx.success_count(),
    ctx.failure_count(),
    ctx.execution_time_seconds()
  );

  // 4. Invalid graphs are rejected when the chain is built.
  let cyclic = Chain::from_steps(vec![
    Step::new("a", "{b}").depends_on(["b"]),
    Step::new("b", "{a}").depends_on(["a"]),
  ]);
  if let Err(e) = cyclic {
    info!("Rejected cyclic chain as expected: {e}");
  }

  info!("--- Basic Chain Example Complete ---");
  Ok(())
}
