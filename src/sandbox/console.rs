//! The print primitive exposed to sandboxed scripts.
//!
//! A [`Console`] normally forwards lines to its host [`OutputSink`]. While a
//! [`CaptureGuard`] is alive, lines go into a per-run buffer instead; dropping
//! the guard restores the host sink whether the run succeeded, faulted or
//! panicked.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::limits::ExecutionLimits;

/// Where console lines end up when nothing is capturing them.
pub trait OutputSink: Send {
    fn write_line(&mut self, line: &str);
}

/// Default host sink: logs each line through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn write_line(&mut self, line: &str) {
        tracing::info!(target: "pairpad::console", "{}", line);
    }
}

impl<F> OutputSink for F
where
    F: FnMut(&str) + Send,
{
    fn write_line(&mut self, line: &str) {
        self(line)
    }
}

/// Lines captured during one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub lines: Vec<String>,
    pub truncated: bool,
}

#[derive(Debug)]
struct CaptureBuffer {
    output: CapturedOutput,
    max_lines: usize,
    max_line_bytes: usize,
}

impl CaptureBuffer {
    fn new(limits: &ExecutionLimits) -> Self {
        Self {
            output: CapturedOutput::default(),
            max_lines: limits.max_output_lines,
            max_line_bytes: limits.max_line_bytes,
        }
    }

    fn push(&mut self, mut line: String) {
        if self.output.lines.len() >= self.max_lines {
            self.output.truncated = true;
            return;
        }
        if line.len() > self.max_line_bytes {
            let mut cut = self.max_line_bytes;
            while !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
            self.output.truncated = true;
        }
        self.output.lines.push(line);
    }
}

/// Write end of an active capture, handed to the script engine.
///
/// Lines printed after the capture ended land in a detached buffer and are
/// discarded.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    buffer: Arc<Mutex<CaptureBuffer>>,
}

impl CaptureSink {
    fn new(limits: &ExecutionLimits) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(CaptureBuffer::new(limits))),
        }
    }

    pub fn print(&self, line: impl Into<String>) {
        self.lock().push(line.into());
    }

    fn lock(&self) -> MutexGuard<'_, CaptureBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self) -> CapturedOutput {
        std::mem::take(&mut self.lock().output)
    }
}

/// The output primitive with swappable capture.
pub struct Console {
    host: Box<dyn OutputSink>,
    capture: Option<CaptureSink>,
}

impl Console {
    pub fn new(host: impl OutputSink + 'static) -> Self {
        Self {
            host: Box::new(host),
            capture: None,
        }
    }

    /// Writes a line to the capture buffer if one is active, else to the host.
    pub fn print(&mut self, line: impl Into<String>) {
        let line = line.into();
        match self.capture.as_ref() {
            Some(sink) => sink.print(line),
            None => self.host.write_line(&line),
        }
    }

    /// Whether a capture is currently installed.
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Installs a fresh capture buffer until the returned guard is dropped.
    pub fn capture(&mut self, limits: &ExecutionLimits) -> CaptureGuard<'_> {
        let sink = CaptureSink::new(limits);
        self.capture = Some(sink.clone());
        CaptureGuard {
            console: self,
            sink,
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new(TracingSink)
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("capturing", &self.is_capturing())
            .finish()
    }
}

/// Scoped redirection of a [`Console`] into a capture buffer.
pub struct CaptureGuard<'a> {
    console: &'a mut Console,
    sink: CaptureSink,
}

impl CaptureGuard<'_> {
    /// A handle that writes into this capture.
    pub fn sink(&self) -> CaptureSink {
        self.sink.clone()
    }

    pub fn print(&mut self, line: impl Into<String>) {
        self.console.print(line);
    }

    /// Ends the capture and returns what was printed.
    pub fn finish(self) -> CapturedOutput {
        self.sink.take()
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.console.capture = None;
    }
}
