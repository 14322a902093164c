// stepchain/examples/registry_basic.rs

use std::sync::Arc;
use stepchain::presets::{documentation_chain, review_chain, DOCUMENTATION_CHAIN, REVIEW_CHAIN};
use stepchain::{blocking_generator_fn, ChainError, ChainRegistry};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Chain Registry Example ---");

  // 1. Register the ready-made chains. The registry is shared across tasks.
  let registry = Arc::new(ChainRegistry::new());
  registry.register(documentation_chain()?);
  registry.register(review_chain()?);
  info!("Registered chains: {:?}", registry.names());

  // 2. A blocking generator, e.g. a synchronous HTTP client.
  let generator = Arc::new(blocking_generator_fn(|prompt: &str| {
    Ok(format!("response to a {}-byte prompt", prompt.len()))
  }));

  let code = "pub fn greet(name: &str) -> String { format!(\"hi {name}\") }";

  // 3. Run both chains concurrently by name.
  let mut handles = Vec::new();
  for chain_name in [DOCUMENTATION_CHAIN, REVIEW_CHAIN] {
    let registry = Arc::clone(&registry);
    let generator = Arc::clone(&generator);
    handles.push(tokio::spawn(async move {
      registry.run(chain_name, &generator, [("code", code)]).await
    }));
  }
  for handle in handles {
    let ctx = handle.await??;
    info!(
      "Chain '{}' finished: {:?}, outputs: {:?}",
      ctx.chain_name().unwrap_or_default(),
      ctx.outcome(),
      ctx.get_all_outputs().iter().map(|(name, _)| *name).collect::<Vec<_>>()
    );
  }

  // 4. Unknown names are reported as errors.
  match registry.run("missing", &generator, [("code", code)]).await {
    Err(ChainError::ChainNotFound { chain_name }) => error!("No chain named '{chain_name}' (expected)"),
    other => error!("Unexpected result: {:?}", other.map(|ctx| ctx.success_count())),
  }

  info!("--- Chain Registry Example Complete ---");
  Ok(())
}
