// stepchain/src/chain/mod.rs

//! Defines the `Chain` struct, its validation, scheduling and execution logic.

pub mod definition;
pub mod execution;
pub mod executor;
pub mod schedule;
pub mod validation;

// Re-export the main Chain struct
pub use definition::Chain;
pub use execution::no_inputs;
pub use executor::StepExecutor;
