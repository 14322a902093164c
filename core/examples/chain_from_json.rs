// stepchain/examples/chain_from_json.rs

use stepchain::{generator_fn, ChainDefinition, ChainError};
use tracing::info;

const DEFINITION: &str = r#"{
  "name": "changelog",
  "fail_fast": false,
  "steps": [
    { "name": "diff_summary", "template": "Summarize this diff:\n{diff}" },
    {
      "name": "changelog",
      "template": "Write a changelog entry for version {version} from:\n{diff_summary}",
      "depends_on": ["diff_summary"],
      "config": { "retry_count": 1, "retry_delay_seconds": 0.1, "timeout_seconds": 30 },
      "metadata": { "audience": "users" }
    }
  ]
}"#;

#[tokio::main]
async fn main() -> Result<(), ChainError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
  info!("--- Chain From JSON Example ---");

  let chain = ChainDefinition::from_json_str(DEFINITION)?.into_chain()?;
  info!("Loaded chain '{}' with steps {:?}", chain.name(), chain.step_names());

  let generator = generator_fn(|prompt: String| async move {
    Ok::<_, anyhow::Error>(prompt.lines().last().unwrap_or_default().to_string())
  });
  let ctx = chain
    .execute(&generator, [("diff", "- old line\n+ new line"), ("version", "1.2.0")])
    .await;

  info!("changelog: {:?}", ctx.get_output("changelog"));

  // The finished context serializes to JSON for logging or persistence.
  match ctx.to_json() {
    Ok(json) => info!("Context snapshot:\n{:#}", json),
    Err(e) => info!("Could not serialize context: {e}"),
  }

  // Round-trip the chain back to a definition.
  let definition = chain.to_definition();
  info!("Definition has {} steps, fail_fast={}", definition.steps.len(), definition.fail_fast);

  info!("--- Chain From JSON Example Complete ---");
  Ok(())
}
