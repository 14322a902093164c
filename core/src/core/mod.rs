pub mod context;
pub mod control;
pub mod generator;
pub mod step;
pub mod template;

// Re-export key types for easier access from other stepchain modules (and lib.rs)
pub use context::{ChainContext, ContextSnapshot, StepResult};
pub use control::{ChainControl, ChainOutcome};
pub use generator::{Generator, FnGenerator, SyncFnGenerator};
pub use step::{Step, StepConfig, Transform};
