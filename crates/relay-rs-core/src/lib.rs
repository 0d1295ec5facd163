//! Core engine of the relay gateway.
//!
//! This crate owns the streaming tool-call orchestration loop (fragment
//! accumulation, argument repair, sequential tool dispatch) and the session
//! lifecycle manager (bounded registry plus background reaper).

pub mod accumulator;
pub mod error;
pub mod orchestrator;
pub mod reaper;
pub mod record;
pub mod repair;
pub mod sessions;

pub use accumulator::{MAX_TOOL_CALLS_PER_ROUND, RoundState, ToolCallDraft};
pub use error::RelayCoreError;
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunStream};
pub use reaper::Reaper;
pub use record::{ExecutingCall, PendingCall, ToolCallRecord, ToolCallStatus};
pub use repair::{RepairOutcome, RepairedArguments, repair_arguments, repair_value};
pub use sessions::{Session, SessionSettings, SessionStats, SessionStore};
