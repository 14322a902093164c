// stepchain/src/chain/schedule.rs

//! Turns a validated step list into one linear execution order.
//!
//! Each round picks the earliest step (in chain order) whose dependencies are all placed, so
//! the order is stable across runs and reads naturally in logs.

use crate::core::step::Step;
use crate::error::{ChainError, ChainResult};
use std::collections::HashSet;
use tracing::{event, Level};

pub fn execution_order(steps: &[Step]) -> ChainResult<Vec<String>> {
  let mut order: Vec<String> = Vec::with_capacity(steps.len());
  let mut placed: HashSet<&str> = HashSet::with_capacity(steps.len());
  let mut remaining: Vec<&Step> = steps.iter().collect();

  while !remaining.is_empty() {
    let ready = remaining
      .iter()
      .position(|step| step.depends_on.iter().all(|dep| placed.contains(dep.as_str())));

    match ready {
      Some(idx) => {
        let step = remaining.remove(idx);
        placed.insert(step.name.as_str());
        order.push(step.name.clone());
      }
      None => {
        // Validation rejects cycles and unknown names, so reaching this is a bug.
        let remaining: Vec<String> = remaining.iter().map(|s| s.name.clone()).collect();
        event!(Level::ERROR, remaining = ?remaining, "No schedulable step left.");
        return Err(ChainError::UnresolvedDependency { remaining });
      }
    }
  }
  Ok(order)
}
