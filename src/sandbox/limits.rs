//! Resource limits for sandboxed script execution

use serde::{Deserialize, Serialize};

/// Resource limits for one sandbox run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Maximum engine steps (loop iterations and calls), checked in slices
    pub max_steps: u64,
    /// Maximum JavaScript stack in bytes
    pub max_stack_bytes: usize,
    /// Maximum heap the script may hold at once, in bytes
    pub max_memory_bytes: usize,
    /// Maximum captured output lines; later lines are dropped
    pub max_output_lines: usize,
    /// Maximum bytes per captured line; longer lines are cut
    pub max_line_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: 10_000_000,
            max_stack_bytes: 1024 * 1024,       // 1 MB
            max_memory_bytes: 64 * 1024 * 1024, // 64 MB
            max_output_lines: 10_000,
            max_line_bytes: 64 * 1024, // 64 KB per line
        }
    }
}

impl ExecutionLimits {
    /// Builder: Set step budget.
    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = steps;
        self
    }

    /// Builder: Set stack size.
    pub fn with_max_stack_bytes(mut self, bytes: usize) -> Self {
        self.max_stack_bytes = bytes;
        self
    }

    /// Builder: Set heap budget.
    pub fn with_max_memory_bytes(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    /// Builder: Set output line cap.
    pub fn with_max_output_lines(mut self, lines: usize) -> Self {
        self.max_output_lines = lines;
        self
    }

    /// Builder: Set per-line byte cap.
    pub fn with_max_line_bytes(mut self, bytes: usize) -> Self {
        self.max_line_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let limits: ExecutionLimits = toml::from_str("max_steps = 10").unwrap();
        assert_eq!(limits.max_steps, 10);
        assert_eq!(limits.max_memory_bytes, 64 * 1024 * 1024);
        assert_eq!(limits.max_stack_bytes, ExecutionLimits::default().max_stack_bytes);
    }

    #[test]
    fn test_builders() {
        let limits = ExecutionLimits::default()
            .with_max_memory_bytes(1024)
            .with_max_stack_bytes(2048);
        assert_eq!(limits.max_memory_bytes, 1024);
        assert_eq!(limits.max_stack_bytes, 2048);
    }
}
