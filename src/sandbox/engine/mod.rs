//! The JavaScript engine behind the sandbox.
//!
//! Native builds embed QuickJS: every run gets a fresh runtime whose heap,
//! stack and step budget come from [`ExecutionLimits`]. The global scope holds
//! the standard ECMAScript built-ins plus a `console` whose only member is
//! `log`; there is no module loader, no timers and no host I/O.
//!
//! Browser builds (`wasm32` with the `wasm` feature) evaluate in the page's
//! own engine with the same `console` shim. Limits other than output capture
//! are not enforced there.

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod browser;
#[cfg(not(target_arch = "wasm32"))]
mod quickjs;

use thiserror::Error;

use super::console::CaptureSink;
use super::limits::ExecutionLimits;

/// Description of a run stopped by the step budget.
pub const STEP_LIMIT_MESSAGE: &str = "Execution step limit exceeded";
/// Description of a run stopped by the heap budget.
pub const MEMORY_LIMIT_MESSAGE: &str = "Execution memory limit exceeded";

/// Installs `console.log` as a closure over `print`.
const CONSOLE_SHIM: &str = "(print) => ({ log: (...args) => print(args.join(' ')) })";

/// Category of a failed script run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptErrorKind {
    /// The source did not parse.
    Syntax,
    /// The script threw and nothing caught it.
    Thrown,
    /// A resource limit stopped the run.
    Limit,
    /// The engine itself failed.
    Internal,
}

/// Why a script run did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    kind: ScriptErrorKind,
    message: String,
}

impl ScriptError {
    pub(crate) fn new(kind: ScriptErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn limit(message: impl Into<String>) -> Self {
        Self::new(ScriptErrorKind::Limit, message)
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(ScriptErrorKind::Internal, message)
    }

    /// Classifies an uncaught value from its `name` and `message` properties.
    ///
    /// Objects with a `message` report it; anything else reports its string
    /// conversion.
    pub(crate) fn uncaught(name: Option<&str>, message: Option<String>, text: String) -> Self {
        let Some(message) = message else {
            return Self::new(ScriptErrorKind::Thrown, text);
        };
        match (name, message.as_str()) {
            (Some("SyntaxError"), _) => Self::new(ScriptErrorKind::Syntax, message),
            (Some("InternalError"), "out of memory") => Self::limit(MEMORY_LIMIT_MESSAGE),
            (Some("RangeError"), "Maximum call stack size exceeded") => Self::limit(message),
            _ => Self::new(ScriptErrorKind::Thrown, message),
        }
    }

    pub fn kind(&self) -> ScriptErrorKind {
        self.kind
    }

    /// Human-readable description of the fault.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Evaluates `source`, sending every `console.log` line to `sink`.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn run(
    source: &str,
    sink: CaptureSink,
    limits: &ExecutionLimits,
) -> Result<(), ScriptError> {
    quickjs::run(source, sink, limits)
}

/// Evaluates `source`, sending every `console.log` line to `sink`.
#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
pub(crate) fn run(
    source: &str,
    sink: CaptureSink,
    limits: &ExecutionLimits,
) -> Result<(), ScriptError> {
    browser::run(source, sink, limits)
}

#[cfg(all(target_arch = "wasm32", not(feature = "wasm")))]
pub(crate) fn run(
    _source: &str,
    _sink: CaptureSink,
    _limits: &ExecutionLimits,
) -> Result<(), ScriptError> {
    Err(ScriptError::internal("no script engine on this target"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncaught_classification() {
        let err = ScriptError::uncaught(Some("Error"), Some("kaput".into()), "Error: kaput".into());
        assert_eq!(err.kind(), ScriptErrorKind::Thrown);
        assert_eq!(err.message(), "kaput");

        let err = ScriptError::uncaught(Some("SyntaxError"), Some("bad".into()), String::new());
        assert_eq!(err.kind(), ScriptErrorKind::Syntax);

        let err = ScriptError::uncaught(
            Some("InternalError"),
            Some("out of memory".into()),
            String::new(),
        );
        assert_eq!(err.kind(), ScriptErrorKind::Limit);
        assert_eq!(err.message(), MEMORY_LIMIT_MESSAGE);

        let err = ScriptError::uncaught(None, None, "7".into());
        assert_eq!(err.kind(), ScriptErrorKind::Thrown);
        assert_eq!(err.message(), "7");
    }
}
