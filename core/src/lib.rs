// src/lib.rs

//! stepchain: a dependency-aware engine for multi-step text-generation workflows.
//!
//! A chain is a fixed set of named steps, each one rendering a prompt template and handing it
//! to a caller-supplied `Generator`. stepchain provides:
//!  - Validation at construction time: unique names, known dependencies, no cycles.
//!  - A deterministic execution order that respects every dependency.
//!  - Propagation of earlier outputs into later templates (`{analyze}`, `{analyze_output}`,
//!    `{step_analyze}`).
//!  - Per-step retries, enforced timeouts and optional output transforms.
//!  - Fail-fast or run-to-the-end chain policies.
//!  - A `ChainContext` recording every result, serializable for logging or persistence.
//!  - Declarative JSON definitions and a name-keyed registry for shared chains.

pub mod chain;
pub mod core;
pub mod definition;
pub mod error;
pub mod presets;
pub mod registry;

// --- Re-exports for the Public API ---

// Core types that users will interact with frequently
pub use crate::core::context::{ChainContext, ContextSnapshot, StepResult};
pub use crate::core::control::{ChainControl, ChainOutcome};
pub use crate::core::generator::{blocking_generator_fn, generator_fn, FnGenerator, Generator, SyncFnGenerator};
pub use crate::core::step::{Step, StepConfig, Transform};

// The main Chain struct
pub use crate::chain::{no_inputs, Chain};

pub use crate::definition::{ChainDefinition, StepDefinition};

pub use crate::error::{ChainError, ChainResult, GenerationFailureKind, StepError};

// The registry for sharing and running chains by name
pub use crate::registry::ChainRegistry;

/*
    Typical use:
    1. Build `Step`s with templates that reference inputs (`{code}`) and dependency outputs.
    2. Create a `Chain` from them; construction fails on an invalid step graph.
    3. Implement `Generator` for your model client, or wrap a closure with `generator_fn`.
    4. `chain.execute(&generator, [("code", source)]).await` returns the finished `ChainContext`.
    5. Inspect `get_output`, `get_failed_steps` and `chain_error` on the context.
*/
