//! Execution Sandbox
//!
//! Runs the shared buffer in an isolated JavaScript engine and returns what
//! it printed. Languages other than JavaScript are placeholders and come back
//! as [`ExecutionStatus::Unsupported`].

pub mod console;
pub mod engine;
pub mod executor;
pub mod limits;

pub use console::{CaptureGuard, CaptureSink, CapturedOutput, Console, OutputSink, TracingSink};
pub use engine::{ScriptError, ScriptErrorKind, MEMORY_LIMIT_MESSAGE, STEP_LIMIT_MESSAGE};
pub use executor::{
    ExecutionResult, ExecutionStatus, Sandbox, NOT_RUN_MESSAGE, SUCCESS_MESSAGE,
    UNSUPPORTED_MESSAGE,
};
pub use limits::ExecutionLimits;
