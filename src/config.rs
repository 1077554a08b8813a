//! File-based configuration.
//!
//! Every section is optional; a missing file section falls back to defaults.
//!
//! ```toml
//! [relay]
//! addr = "127.0.0.1:7341"
//!
//! [suggestions]
//! debounce_ms = 300
//! request_timeout_ms = 10000
//! backend = { kind = "http", base_url = "http://localhost:8080" }
//!
//! [sandbox]
//! max_steps = 1000000
//!
//! [formatter]
//! command = ["prettier", "--parser", "babel"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PadError, PadResult};
use crate::format::CommandFormatter;
use crate::sandbox::ExecutionLimits;

/// Relay address used when nothing else is configured.
pub const DEFAULT_RELAY_ADDR: &str = "127.0.0.1:7341";

/// Upper bound on one newline-delimited frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadConfig {
    pub relay: RelaySection,
    pub suggestions: SuggestionsSection,
    pub sandbox: ExecutionLimits,
    pub formatter: FormatterSection,
}

impl PadConfig {
    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> PadResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PadError::config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
            .map_err(|e| PadError::config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> PadResult<Self> {
        toml::from_str(text).map_err(|e| PadError::config(e.to_string()))
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> PadResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySection {
    pub addr: String,
    pub max_frame_len: usize,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            addr: DEFAULT_RELAY_ADDR.to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[cfg(feature = "net")]
impl RelaySection {
    pub fn channel_config(&self) -> crate::sync::ChannelConfig {
        crate::sync::ChannelConfig::new(self.addr.clone()).with_max_frame_len(self.max_frame_len)
    }

    pub fn relay_config(&self) -> crate::sync::RelayConfig {
        crate::sync::RelayConfig {
            addr: self.addr.clone(),
            max_frame_len: self.max_frame_len,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionsSection {
    pub debounce_ms: u64,
    pub request_timeout_ms: u64,
    pub backend: BackendConfig,
}

impl Default for SuggestionsSection {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            request_timeout_ms: 10_000,
            backend: BackendConfig::default(),
        }
    }
}

impl SuggestionsSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Which advisory backend to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Canned suggestions after `delay_ms`.
    Stub {
        #[serde(default = "default_stub_delay_ms")]
        delay_ms: u64,
    },
    Http { base_url: String },
}

fn default_stub_delay_ms() -> u64 {
    1000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Stub {
            delay_ms: default_stub_delay_ms(),
        }
    }
}

#[cfg(feature = "net")]
impl BackendConfig {
    /// Instantiates the configured backend.
    pub fn build(&self) -> PadResult<std::sync::Arc<dyn crate::suggest::AdvisoryBackend>> {
        use crate::suggest::{HttpAdvisor, StubAdvisor};

        Ok(match self {
            Self::Stub { delay_ms } => {
                std::sync::Arc::new(StubAdvisor::new(Duration::from_millis(*delay_ms)))
            }
            Self::Http { base_url } => std::sync::Arc::new(HttpAdvisor::new(base_url)?),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterSection {
    /// Program and arguments; `{language}` is replaced per call.
    pub command: Vec<String>,
}

impl FormatterSection {
    pub fn formatter(&self) -> Option<CommandFormatter> {
        CommandFormatter::from_command(&self.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = PadConfig::from_toml_str("").unwrap();
        assert_eq!(config, PadConfig::default());
        assert_eq!(config.relay.addr, DEFAULT_RELAY_ADDR);
        assert_eq!(config.suggestions.debounce(), Duration::from_millis(300));
        assert!(config.formatter.formatter().is_none());
    }

    #[test]
    fn test_full_file() {
        let config = PadConfig::from_toml_str(
            r#"
            [relay]
            addr = "0.0.0.0:9000"

            [suggestions]
            debounce_ms = 150
            backend = { kind = "http", base_url = "http://advisor.local" }

            [sandbox]
            max_steps = 500

            [formatter]
            command = ["prettier", "--parser", "babel"]
            "#,
        )
        .unwrap();

        assert_eq!(config.relay.addr, "0.0.0.0:9000");
        assert_eq!(config.relay.max_frame_len, DEFAULT_MAX_FRAME_LEN);
        assert_eq!(config.suggestions.debounce_ms, 150);
        assert_eq!(config.suggestions.request_timeout_ms, 10_000);
        assert_eq!(
            config.suggestions.backend,
            BackendConfig::Http {
                base_url: "http://advisor.local".to_string()
            }
        );
        assert_eq!(config.sandbox.max_steps, 500);
        assert_eq!(config.sandbox.max_memory_bytes, ExecutionLimits::default().max_memory_bytes);
        assert_eq!(config.formatter.formatter().unwrap().program(), "prettier");
    }

    #[test]
    fn test_stub_delay_defaults() {
        let config =
            PadConfig::from_toml_str("[suggestions]\nbackend = { kind = \"stub\" }\n").unwrap();
        assert_eq!(config.suggestions.backend, BackendConfig::Stub { delay_ms: 1000 });
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let err = PadConfig::from_toml_str("[relay]\naddr = 5\n").unwrap_err();
        assert!(matches!(err, PadError::Config(_)));

        let err = PadConfig::load(Path::new("/nonexistent/pairpad.toml")).unwrap_err();
        assert!(matches!(err, PadError::Config(_)));
    }
}
