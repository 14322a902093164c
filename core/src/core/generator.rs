// stepchain/src/core/generator.rs

//! The boundary to the external text-generation function.
//!
//! A `Generator` turns a fully rendered prompt into text. The chain treats every error it
//! returns the same way: as a retryable step failure. Anything the generator needs (a loaded
//! model, an HTTP client, a cache) lives inside the implementing type and is shared by
//! reference across runs.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

#[async_trait]
pub trait Generator: Send + Sync {
  async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for Arc<G> {
  async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
    (**self).generate(prompt).await
  }
}

#[async_trait]
impl<G: Generator + ?Sized> Generator for &G {
  async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
    (**self).generate(prompt).await
  }
}

/// Adapts an async closure `Fn(String) -> Future<Output = anyhow::Result<String>>`.
pub struct FnGenerator<F> {
  f: F,
}

impl<F, Fut> FnGenerator<F>
where
  F: Fn(String) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
  pub fn new(f: F) -> Self {
    Self { f }
  }
}

#[async_trait]
impl<F, Fut> Generator for FnGenerator<F>
where
  F: Fn(String) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
  async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
    (self.f)(prompt.to_string()).await
  }
}

/// Adapts a blocking closure `Fn(&str) -> anyhow::Result<String>`.
///
/// Calls run on tokio's blocking pool so the step timeout still applies. A call that overruns
/// its deadline keeps running in the background until it returns; its result is discarded.
pub struct SyncFnGenerator<F> {
  f: Arc<F>,
}

impl<F> SyncFnGenerator<F>
where
  F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
{
  pub fn new(f: F) -> Self {
    Self { f: Arc::new(f) }
  }
}

#[async_trait]
impl<F> Generator for SyncFnGenerator<F>
where
  F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
{
  async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
    let f = Arc::clone(&self.f);
    let prompt = prompt.to_string();
    match tokio::task::spawn_blocking(move || f(&prompt)).await {
      Ok(result) => result,
      Err(join_err) => Err(anyhow::anyhow!("blocking generator task failed: {join_err}")),
    }
  }
}

pub fn generator_fn<F, Fut>(f: F) -> FnGenerator<F>
where
  F: Fn(String) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
  FnGenerator::new(f)
}

pub fn blocking_generator_fn<F>(f: F) -> SyncFnGenerator<F>
where
  F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
{
  SyncFnGenerator::new(f)
}
