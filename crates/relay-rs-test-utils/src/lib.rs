//! Test helpers shared across Relay crates.

pub mod model;
pub mod tools;

pub use model::{FailingModel, LoopingToolCallModel, ScriptedModel, StallingModel};
pub use tools::{DummyToolProvider, FailingToolProvider, SlowToolProvider};
