// stepchain/src/presets.rs

//! Ready-made chains for source-code documentation. Both expect the caller to supply the
//! source text as the `code` input.

use crate::chain::definition::Chain;
use crate::core::step::{Step, StepConfig};
use crate::error::ChainResult;

pub const DOCUMENTATION_CHAIN: &str = "documentation";
pub const REVIEW_CHAIN: &str = "review";

fn trimmed(raw: &str, _ctx: &crate::core::context::ChainContext) -> anyhow::Result<String> {
  let out = raw.trim();
  if out.is_empty() {
    anyhow::bail!("generator returned only whitespace");
  }
  Ok(out.to_string())
}

/// `analyze` → `documentation` → `examples` (optional, fails without stopping the chain).
pub fn documentation_chain() -> ChainResult<Chain> {
  let retrying = StepConfig::default().with_retries(2, 1.0);
  Chain::new(
    DOCUMENTATION_CHAIN,
    vec![
      Step::new(
        "analyze",
        "Analyze the following source code. Describe its purpose, its main components and any \
         notable patterns or pitfalls.\n\n{code}",
      )
      .with_config(retrying.clone())
      .with_transform(trimmed)
      .with_metadata("stage", "analysis"),
      Step::new(
        "documentation",
        "Using this analysis:\n{analyze}\n\nWrite reference documentation in Markdown for the \
         code below. Cover every public item.\n\n{code}",
      )
      .depends_on(["analyze"])
      .with_config(retrying)
      .with_transform(trimmed)
      .with_metadata("stage", "documentation"),
      Step::new(
        "examples",
        "Based on this documentation:\n{documentation_output}\n\nWrite two short, self-contained \
         usage examples.",
      )
      .depends_on(["documentation"])
      .with_config(StepConfig::default().optional())
      .with_metadata("stage", "examples"),
    ],
  )
}

/// `summary` and `review`, run to the end even when a step fails.
pub fn review_chain() -> ChainResult<Chain> {
  Ok(
    Chain::new(
      REVIEW_CHAIN,
      vec![
        Step::new("summary", "Summarize what this code does in a few sentences.\n\n{code}")
          .with_transform(trimmed)
          .with_metadata("stage", "summary"),
        Step::new(
          "review",
          "Summary of the code: {summary}\n\nReview the code below for bugs, unclear naming and \
           missing error handling. List concrete findings.\n\n{code}",
        )
        .depends_on(["summary"])
        .with_config(StepConfig::default().with_retries(1, 1.0))
        .with_metadata("stage", "review"),
      ],
    )?
    .with_fail_fast(false),
  )
}
