//! Sandbox entry point: run the buffer, capture its output, never fault.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use serde::{Deserialize, Serialize};

use super::console::{CaptureSink, CapturedOutput, Console, OutputSink};
use super::engine::{self, ScriptError};
use super::limits::ExecutionLimits;
use crate::session::model::Language;

/// Output panel text for a run that printed nothing.
pub const SUCCESS_MESSAGE: &str = "Code executed successfully";
/// Output panel text for languages that do not execute.
pub const UNSUPPORTED_MESSAGE: &str = "Code execution for this language is not supported yet.";
/// Output panel text before anything has run.
pub const NOT_RUN_MESSAGE: &str = "Run your code to see output...";
/// Description of a run that panicked inside the engine.
pub const INTERNAL_FAULT_MESSAGE: &str = "internal sandbox fault";

/// Native stack the worker keeps on top of the script's own stack budget.
const WORKER_STACK_HEADROOM: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionStatus {
    Success,
    RuntimeError,
    Unsupported,
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// One entry per `console.log` call, in call order
    pub captured_output: Vec<String>,
    /// Message of the fault that ended the run, if any
    pub error_description: Option<String>,
    pub status: ExecutionStatus,
    /// Whether output limits dropped or cut lines
    pub truncated: bool,
}

impl ExecutionResult {
    fn unsupported() -> Self {
        Self {
            captured_output: Vec::new(),
            error_description: Some(UNSUPPORTED_MESSAGE.to_string()),
            status: ExecutionStatus::Unsupported,
            truncated: false,
        }
    }

    fn from_run(output: CapturedOutput, outcome: Result<(), ScriptError>) -> Self {
        let (status, error_description) = match outcome {
            Ok(()) => (ExecutionStatus::Success, None),
            Err(err) => (ExecutionStatus::RuntimeError, Some(err.message().to_string())),
        };
        Self {
            captured_output: output.lines,
            error_description,
            status,
            truncated: output.truncated,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Text for the output panel.
    pub fn display_text(&self) -> String {
        match self.status {
            ExecutionStatus::Unsupported => UNSUPPORTED_MESSAGE.to_string(),
            ExecutionStatus::RuntimeError => format!(
                "Error: {}",
                self.error_description.as_deref().unwrap_or_default()
            ),
            ExecutionStatus::Success => {
                let joined = self.captured_output.join("\n");
                if joined.is_empty() {
                    SUCCESS_MESSAGE.to_string()
                } else {
                    joined
                }
            }
        }
    }
}

/// Runs buffer content under capture-and-isolate semantics.
#[derive(Debug, Default)]
pub struct Sandbox {
    limits: ExecutionLimits,
    console: Console,
}

impl Sandbox {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            limits,
            console: Console::default(),
        }
    }

    /// Builder: replace the host sink `console.log` writes to outside a run.
    pub fn with_output(mut self, host: impl OutputSink + 'static) -> Self {
        self.console = Console::new(host);
        self
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn console(&mut self) -> &mut Console {
        &mut self.console
    }

    /// Runs `content` as `language`. Every fault comes back as result data.
    pub fn execute(&mut self, content: &str, language: Language) -> ExecutionResult {
        if !language.is_executable() {
            tracing::debug!(language = %language.as_str(), "execution not supported");
            return ExecutionResult::unsupported();
        }

        let limits = &self.limits;
        let guard = self.console.capture(limits);
        let outcome = run_isolated(content, guard.sink(), limits);
        let output = guard.finish();

        let result = ExecutionResult::from_run(output, outcome);
        tracing::debug!(
            status = ?result.status,
            lines = result.captured_output.len(),
            truncated = result.truncated,
            "execution finished"
        );
        result
    }
}

/// Runs the engine on a scoped worker sized for the script's stack budget,
/// or on the current thread where spawning is unsupported (wasm32).
fn run_isolated(
    content: &str,
    sink: CaptureSink,
    limits: &ExecutionLimits,
) -> Result<(), ScriptError> {
    let stack_bytes = limits.max_stack_bytes.saturating_add(WORKER_STACK_HEADROOM);
    let joined = thread::scope(|scope| {
        let worker_sink = sink.clone();
        let worker = thread::Builder::new()
            .name("pairpad-sandbox".to_string())
            .stack_size(stack_bytes)
            .spawn_scoped(scope, move || guarded_run(content, worker_sink, limits));
        match worker {
            Ok(handle) => Some(handle.join().unwrap_or_else(|_| {
                tracing::error!("sandbox worker panicked");
                Err(ScriptError::internal(INTERNAL_FAULT_MESSAGE))
            })),
            Err(err) => {
                tracing::debug!(error = %err, "sandbox worker unavailable; running inline");
                None
            }
        }
    });
    match joined {
        Some(outcome) => outcome,
        None => guarded_run(content, sink, limits),
    }
}

fn guarded_run(
    content: &str,
    sink: CaptureSink,
    limits: &ExecutionLimits,
) -> Result<(), ScriptError> {
    panic::catch_unwind(AssertUnwindSafe(|| engine::run(content, sink, limits))).unwrap_or_else(
        |_| {
            tracing::error!("sandbox engine panicked");
            Err(ScriptError::internal(INTERNAL_FAULT_MESSAGE))
        },
    )
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::sandbox::engine::{MEMORY_LIMIT_MESSAGE, STEP_LIMIT_MESSAGE};

    fn run_js(source: &str) -> ExecutionResult {
        Sandbox::default().execute(source, Language::JavaScript)
    }

    fn output_of(source: &str) -> Vec<String> {
        let result = run_js(source);
        assert!(result.is_success(), "{source}: {:?}", result.error_description);
        result.captured_output
    }

    #[test]
    fn test_capture_joins_arguments_per_call() {
        let result = run_js("console.log('x')\nconsole.log('y', 'z')");
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.captured_output, vec!["x", "y z"]);
        assert_eq!(result.display_text(), "x\ny z");
    }

    #[test]
    fn test_runs_are_isolated_even_after_fault() {
        let host_lines = Arc::new(Mutex::new(Vec::new()));
        let host = {
            let host_lines = Arc::clone(&host_lines);
            move |line: &str| host_lines.lock().unwrap().push(line.to_string())
        };
        let mut sandbox = Sandbox::default().with_output(host);

        let first = sandbox.execute("globalThis.leak = 1; console.log('a')", Language::JavaScript);
        let faulted = sandbox.execute(
            "console.log('mid'); throw new Error('bad')",
            Language::JavaScript,
        );
        let second = sandbox.execute("console.log(typeof leak, 'b')", Language::JavaScript);

        assert_eq!(first.captured_output, vec!["a"]);
        assert_eq!(faulted.captured_output, vec!["mid"]);
        assert_eq!(second.captured_output, vec!["undefined b"]);
        assert!(!sandbox.console().is_capturing());

        sandbox.console().print("host");
        assert_eq!(*host_lines.lock().unwrap(), vec!["host"]);
    }

    #[test]
    fn test_fault_maps_to_runtime_error() {
        let result = run_js("throw new Error('kaput')");
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.error_description.as_deref(), Some("kaput"));
        assert_eq!(result.display_text(), "Error: kaput");

        let result = run_js("let x = ;");
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert!(result.error_description.is_some_and(|message| !message.is_empty()));

        let result = run_js("missing()");
        assert_eq!(result.error_description.as_deref(), Some("missing is not defined"));
    }

    #[test]
    fn test_thrown_values_report_message_or_text() {
        let result = run_js("throw { message: 'obj' }");
        assert_eq!(result.error_description.as_deref(), Some("obj"));

        let result = run_js("throw 'plain'");
        assert_eq!(result.error_description.as_deref(), Some("plain"));

        let result = run_js("throw 42");
        assert_eq!(result.error_description.as_deref(), Some("42"));
    }

    #[test]
    fn test_unsupported_languages() {
        let mut sandbox = Sandbox::default();
        for language in [Language::Python, Language::Java, Language::C] {
            let result = sandbox.execute("console.log('hi')", language);
            assert_eq!(result.status, ExecutionStatus::Unsupported);
            assert!(result.captured_output.is_empty());
            assert_eq!(result.display_text(), UNSUPPORTED_MESSAGE);
        }
    }

    #[test]
    fn test_empty_and_silent_content() {
        let empty = run_js("");
        assert!(empty.is_success());
        assert!(empty.captured_output.is_empty());

        let silent = run_js("let x = 1 + 1");
        assert_eq!(silent.display_text(), SUCCESS_MESSAGE);
    }

    #[test]
    fn test_everyday_language_features() {
        let source = r#"
            class Point {
                constructor(x, y) { this.x = x; this.y = y }
                toString() { return `(${this.x}, ${this.y})` }
            }
            console.log(String(new Point(1, 2)))
            switch (3) { case 3: console.log('three'); break; default: console.log('other') }
            let n = 0; do { n++ } while (n < 3); console.log(n)
            console.log(2 ** 10, null ?? 'd', 5 & 3)
            console.log([3, 1, 2].sort(), JSON.stringify({ a: [1] }), parseInt('42px'))
            const [a, b] = [1, 2]; console.log(a + b, [...'ab'].length)
            console.log(Object.keys({ k: 1 }), Array.isArray([]), typeof Math.random())
        "#;
        assert_eq!(
            output_of(source),
            vec![
                "(1, 2)",
                "three",
                "3",
                "1024 d 1",
                "1,2,3 {\"a\":[1]} 42",
                "3 2",
                "k true number",
            ]
        );
    }

    #[test]
    fn test_function_scoping_rules() {
        let named = "let f = function fact(n) { return n <= 1 ? 1 : n * fact(n - 1) };
                     console.log(f(5))";
        assert_eq!(output_of(named), vec!["120"]);

        assert_eq!(output_of("var x = 1; { var x = 2 } console.log(x)"), vec!["2"]);
        assert_eq!(output_of("console.log((255).toString(16))"), vec!["ff"]);
    }

    #[test]
    fn test_infinite_loop_hits_step_limit() {
        let mut sandbox = Sandbox::new(ExecutionLimits::default().with_max_steps(10_000));
        let result = sandbox.execute("while (true) {}", Language::JavaScript);
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.error_description.as_deref(), Some(STEP_LIMIT_MESSAGE));
    }

    #[test]
    fn test_runaway_recursion_is_a_runtime_error() {
        let result = run_js("function down(n) { return down(n + 1) }\ndown(0)");
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(
            result.error_description.as_deref(),
            Some("Maximum call stack size exceeded")
        );
    }

    #[test]
    fn test_total_allocation_is_capped() {
        let limits = ExecutionLimits::default().with_max_memory_bytes(32 * 1024 * 1024);
        let mut sandbox = Sandbox::new(limits);
        let result = sandbox.execute(
            "let keep = []; for (let i = 0; i < 40; i++) { let a = []; a.length = 1048576; \
             a.fill(i); keep.push(a) } console.log(keep.length)",
            Language::JavaScript,
        );
        assert_eq!(result.status, ExecutionStatus::RuntimeError);
        assert_eq!(result.error_description.as_deref(), Some(MEMORY_LIMIT_MESSAGE));
        assert!(result.captured_output.is_empty());

        // The same sandbox keeps working afterwards.
        let next = sandbox.execute("console.log('ok')", Language::JavaScript);
        assert_eq!(next.captured_output, vec!["ok"]);
    }

    #[test]
    fn test_output_limit_truncates() {
        let mut sandbox = Sandbox::new(ExecutionLimits::default().with_max_output_lines(3));
        let result = sandbox.execute(
            "for (let i = 0; i < 10; i++) console.log(i)",
            Language::JavaScript,
        );
        assert!(result.is_success());
        assert_eq!(result.captured_output, vec!["0", "1", "2"]);
        assert!(result.truncated);
    }
}
