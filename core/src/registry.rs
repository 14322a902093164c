// stepchain/src/registry.rs

//! Defines `ChainRegistry`, a name-keyed registry for sharing and running validated chains.
//!
//! Chains are stored behind `Arc` and never mutated once registered, so any number of runs can
//! execute the same chain concurrently, each with its own `ChainContext`. Replacing a chain
//! means registering a new one under the same name.

use crate::chain::definition::Chain;
use crate::core::context::ChainContext;
use crate::core::generator::Generator;
use crate::error::{ChainError, ChainResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{event, instrument, Level};

#[derive(Default)]
pub struct ChainRegistry {
  chains: RwLock<HashMap<String, Arc<Chain>>>,
}

impl ChainRegistry {
  /// Creates a new, empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `chain` under its own name, returning the chain it replaced.
  pub fn register(&self, chain: Chain) -> Option<Arc<Chain>> {
    self.register_shared(Arc::new(chain))
  }

  pub fn register_shared(&self, chain: Arc<Chain>) -> Option<Arc<Chain>> {
    let name = chain.name().to_string();
    event!(Level::DEBUG, chain_name = %name, num_steps = chain.len(), "Registering chain.");
    let previous = self.chains.write().insert(name, chain);
    if previous.is_some() {
      event!(Level::DEBUG, "Replaced a previously registered chain.");
    }
    previous
  }

  pub fn unregister(&self, chain_name: &str) -> Option<Arc<Chain>> {
    self.chains.write().remove(chain_name)
  }

  pub fn get(&self, chain_name: &str) -> Option<Arc<Chain>> {
    self.chains.read().get(chain_name).cloned()
  }

  pub fn contains(&self, chain_name: &str) -> bool {
    self.chains.read().contains_key(chain_name)
  }

  /// Registered chain names, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.chains.read().keys().cloned().collect();
    names.sort();
    names
  }

  pub fn len(&self) -> usize {
    self.chains.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.chains.read().is_empty()
  }

  /// Runs the chain registered as `chain_name`.
  ///
  /// Only the lookup can fail; the run itself reports through the returned context.
  #[instrument(name = "ChainRegistry::run", skip(self, generator, inputs), err(Display))]
  pub async fn run<G, I, K, V>(&self, chain_name: &str, generator: &G, inputs: I) -> ChainResult<ChainContext>
  where
    G: Generator + ?Sized,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    // The read guard is released here, before the first await.
    let chain = self.get(chain_name).ok_or_else(|| {
      event!(Level::ERROR, "No chain registered under this name.");
      ChainError::ChainNotFound {
        chain_name: chain_name.to_string(),
      }
    })?;
    Ok(chain.execute(generator, inputs).await)
  }
}

impl std::fmt::Debug for ChainRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ChainRegistry").field("chains", &self.names()).finish()
  }
}
