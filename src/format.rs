//! Formatter collaborator.
//!
//! Formatting is delegated to an external program. A failed format never
//! touches the buffer; the session surfaces the failure as a notice instead.

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;

use crate::session::model::Language;

/// Placeholder in formatter arguments replaced by the language identifier.
pub const LANGUAGE_PLACEHOLDER: &str = "{language}";

/// Why a format attempt failed.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to start formatter '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("formatter exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("formatter produced invalid UTF-8")]
    InvalidOutput,

    #[error("{0}")]
    Rejected(String),
}

impl FormatError {
    /// Creates a Rejected error, for in-process formatters.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// `format(content, languageHint) -> content'`.
pub trait Formatter {
    fn format(&self, content: &str, language: Language) -> Result<String, FormatError>;
}

impl<F> Formatter for F
where
    F: Fn(&str, Language) -> Result<String, FormatError>,
{
    fn format(&self, content: &str, language: Language) -> Result<String, FormatError> {
        self(content, language)
    }
}

/// Pipes the buffer through an external command and takes its stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFormatter {
    program: String,
    args: Vec<String>,
}

impl CommandFormatter {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a formatter from a command line such as
    /// `["prettier", "--parser", "babel"]`. Returns `None` for an empty list.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.iter().cloned()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Formatter for CommandFormatter {
    fn format(&self, content: &str, language: Language) -> Result<String, FormatError> {
        let args = self
            .args
            .iter()
            .map(|arg| arg.replace(LANGUAGE_PLACEHOLDER, language.as_str()));
        let spawn_error = |source| FormatError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Feed stdin from another thread so a formatter that streams output
        // cannot deadlock against a full pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = content.to_string();
            thread::spawn(move || stdin.write_all(input.as_bytes()))
        });
        let output = child.wait_with_output().map_err(spawn_error)?;
        if let Some(writer) = writer {
            if let Ok(Err(err)) = writer.join() {
                tracing::debug!(error = %err, "formatter closed stdin early");
            }
        }

        if !output.status.success() {
            return Err(FormatError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        String::from_utf8(output.stdout).map_err(|_| FormatError::InvalidOutput)
    }
}
