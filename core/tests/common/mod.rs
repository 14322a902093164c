// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stepchain::{Generator, Step, StepConfig};
use tracing::Level;

// --- Scripted generators ---

/// Answers from a prompt → response table; unknown prompts fail.
/// Every prompt it receives is recorded in call order.
#[derive(Default)]
pub struct ScriptedGenerator {
  responses: HashMap<String, String>,
  pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
  pub fn new(pairs: &[(&str, &str)]) -> Self {
    Self {
      responses: pairs.iter().map(|(p, r)| (p.to_string(), r.to_string())).collect(),
      prompts: Mutex::new(Vec::new()),
    }
  }

  pub fn received(&self) -> Vec<String> {
    self.prompts.lock().clone()
  }
}

#[async_trait]
impl Generator for ScriptedGenerator {
  async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
    self.prompts.lock().push(prompt.to_string());
    self
      .responses
      .get(prompt)
      .cloned()
      .ok_or_else(|| anyhow::anyhow!("no scripted response for prompt {prompt:?}"))
  }
}

/// Echoes the prompt back as `out(<prompt>)`, failing for prompts that contain `fail_marker`.
pub struct EchoGenerator {
  pub fail_marker: Option<String>,
  pub calls: AtomicUsize,
}

impl EchoGenerator {
  pub fn new() -> Self {
    Self {
      fail_marker: None,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn failing_on(marker: &str) -> Self {
    Self {
      fail_marker: Some(marker.to_string()),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Generator for EchoGenerator {
  async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(marker) = &self.fail_marker {
      if prompt.contains(marker.as_str()) {
        anyhow::bail!("model refused prompt containing {marker:?}");
      }
    }
    Ok(format!("out({prompt})"))
  }
}

/// Fails the first `failures` calls, then answers `response`.
pub struct FlakyGenerator {
  failures: usize,
  response: String,
  pub calls: AtomicUsize,
}

impl FlakyGenerator {
  pub fn new(failures: usize, response: &str) -> Self {
    Self {
      failures,
      response: response.to_string(),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Generator for FlakyGenerator {
  async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if call <= self.failures {
      anyhow::bail!("transient failure #{call}");
    }
    Ok(self.response.clone())
  }
}

/// Sleeps for `delay` before answering.
pub struct SlowGenerator {
  pub delay: Duration,
  pub calls: AtomicUsize,
}

impl SlowGenerator {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Generator for SlowGenerator {
  async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(self.delay).await;
    Ok(prompt.to_string())
  }
}

// --- Step helpers ---

/// Step without retry delay, so failing tests stay fast.
pub fn quick_step(name: &str, template: &str, deps: &[&str]) -> Step {
  Step::new(name, template)
    .depends_on(deps.iter().copied())
    .with_config(StepConfig::default().with_retries(0, 0.0))
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
