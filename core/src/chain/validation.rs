// stepchain/src/chain/validation.rs

//! Structural checks run before a chain can exist: unique step names, resolvable
//! dependencies, and an acyclic dependency graph. Checks run in that order and stop at the
//! first failing one.

use crate::core::step::Step;
use crate::error::{ChainError, ChainResult};
use std::collections::{HashMap, HashSet};
use tracing::{event, Level};

pub fn validate_steps(steps: &[Step]) -> ChainResult<()> {
  check_unique_names(steps)?;
  check_dependencies_exist(steps)?;
  check_acyclic(steps)?;
  event!(Level::TRACE, num_steps = steps.len(), "Step set validated.");
  Ok(())
}

fn check_unique_names(steps: &[Step]) -> ChainResult<()> {
  let mut seen = HashSet::new();
  let mut duplicates: Vec<String> = Vec::new();
  for step in steps {
    if !seen.insert(step.name.as_str()) && !duplicates.contains(&step.name) {
      duplicates.push(step.name.clone());
    }
  }
  if duplicates.is_empty() {
    Ok(())
  } else {
    Err(ChainError::DuplicateStepName { names: duplicates })
  }
}

fn check_dependencies_exist(steps: &[Step]) -> ChainResult<()> {
  let names: HashSet<&str> = steps.iter().map(|s| s.name.as_str()).collect();
  for step in steps {
    if let Some(dep) = step.depends_on.iter().find(|d| !names.contains(d.as_str())) {
      return Err(ChainError::UnknownDependency {
        step_name: step.name.clone(),
        dependency: dep.clone(),
      });
    }
  }
  Ok(())
}

// Depth-first walk with an explicit frame stack, so long dependency chains cannot exhaust the
// thread stack. Each frame is a step plus the index of its next dependency to visit. Meeting a
// step that is still on the path closes a cycle; fully explored steps land in `finished`.
fn check_acyclic(steps: &[Step]) -> ChainResult<()> {
  let graph: HashMap<&str, &[String]> = steps
    .iter()
    .map(|s| (s.name.as_str(), s.depends_on.as_slice()))
    .collect();
  let mut finished: HashSet<&str> = HashSet::with_capacity(steps.len());
  let mut on_path: HashSet<&str> = HashSet::new();
  let mut frames: Vec<(&str, usize)> = Vec::new();

  for step in steps {
    let root = step.name.as_str();
    if finished.contains(root) {
      continue;
    }
    frames.push((root, 0));
    on_path.insert(root);

    while let Some(frame) = frames.last_mut() {
      let (name, next_dep) = *frame;
      let deps = graph.get(name).copied().unwrap_or_default();
      let Some(dep) = deps.get(next_dep).map(String::as_str) else {
        frames.pop();
        on_path.remove(name);
        finished.insert(name);
        continue;
      };
      frame.1 += 1;

      if finished.contains(dep) {
        continue;
      }
      if on_path.contains(dep) {
        let pos = frames.iter().position(|(on_stack, _)| *on_stack == dep).unwrap_or(0);
        let mut cycle: Vec<String> = frames[pos..].iter().map(|(s, _)| s.to_string()).collect();
        cycle.push(dep.to_string());
        event!(Level::DEBUG, step_name = dep, cycle = ?cycle, "Dependency cycle detected.");
        return Err(ChainError::CyclicDependency {
          step_name: dep.to_string(),
          cycle,
        });
      }
      on_path.insert(dep);
      frames.push((dep, 0));
    }
  }
  Ok(())
}
