//! Data models for a participant's session.
//!
//! Plain serde structs: the document is replaced wholesale on every accepted
//! change, so there is no merge metadata to carry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PadError, PadResult};

/// Buffer content a fresh session starts with.
pub const INITIAL_CONTENT: &str = "// Start typing your code here...";

// =============================================================================
// LANGUAGE
// =============================================================================

/// The language selector of the document.
///
/// Only [`Language::JavaScript`] executes; the others are placeholders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    JavaScript,
    Python,
    Java,
    C,
}

impl Language {
    /// Every selectable language, in selector order.
    pub const ALL: [Language; 4] = [
        Language::JavaScript,
        Language::Python,
        Language::Java,
        Language::C,
    ];

    /// Whether the sandbox can execute this language.
    pub fn is_executable(self) -> bool {
        matches!(self, Language::JavaScript)
    }

    /// Identifier used on the wire, in config files and as a formatter hint.
    pub fn as_str(self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Java => "java",
            Language::C => "c",
        }
    }

    /// Human-readable selector label.
    pub fn label(self) -> &'static str {
        match self {
            Language::JavaScript => "JavaScript",
            Language::Python => "Python (Mocked)",
            Language::Java => "Java (Mocked)",
            Language::C => "C (Mocked)",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = PadError;

    fn from_str(s: &str) -> PadResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" => Ok(Language::JavaScript),
            "python" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "c" => Ok(Language::C),
            other => Err(PadError::unknown_language(other)),
        }
    }
}

// =============================================================================
// THEME
// =============================================================================

/// Editor color theme. Local display flag, never synced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Theme {
    #[default]
    #[serde(rename = "vs-dark")]
    Dark,
    #[serde(rename = "light")]
    Light,
}

impl Theme {
    /// Returns the other theme.
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "vs-dark",
            Theme::Light => "light",
        }
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// The single logical text buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    content: String,
    language: Language,
    /// Local change counter. Never compared across participants.
    revision: u64,
}

impl Document {
    /// Creates a document with the given content at revision 0.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            language: Language::default(),
            revision: 0,
        }
    }

    /// Builder: Set language.
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Number of buffer replacements this participant has accepted.
    ///
    /// The counter is local: it advances for local edits and for remote
    /// changes adopted here, and is never sent over the wire, so two
    /// participants holding the same content may report different revisions.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces the whole buffer and bumps the revision. Last write wins.
    pub(crate) fn replace(&mut self, content: impl Into<String>) -> u64 {
        self.content = content.into();
        self.revision += 1;
        self.revision
    }

    pub(crate) fn set_language(&mut self, language: Language) {
        self.language = language;
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(INITIAL_CONTENT)
    }
}

// =============================================================================
// SNAPSHOT HISTORY
// =============================================================================

/// An immutable copy of the document taken on request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    sequence: usize,
    content: String,
    language: Language,
    revision: u64,
}

impl SnapshotEntry {
    fn capture(sequence: usize, document: &Document) -> Self {
        Self {
            sequence,
            content: document.content.clone(),
            language: document.language,
            revision: document.revision,
        }
    }

    /// Position of this entry in the history, starting at 0.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Document revision at capture time.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Append-only ordered list of snapshots.
///
/// There is intentionally no way to remove or mutate an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct History {
    entries: Vec<SnapshotEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures `document` as the next entry.
    pub(crate) fn record(&mut self, document: &Document) -> &SnapshotEntry {
        let entry = SnapshotEntry::capture(self.entries.len(), document);
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> PadResult<&SnapshotEntry> {
        self.entries
            .get(index)
            .ok_or_else(|| PadError::snapshot_out_of_bounds(index, self.entries.len()))
    }

    pub fn latest(&self) -> Option<&SnapshotEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[SnapshotEntry] {
        &self.entries
    }
}

// =============================================================================
// NOTICE
// =============================================================================

/// A blocking notice the presentation layer must acknowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum Notice {
    Info(String),
    Error(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::Info(m) | Notice::Error(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_default() {
        let doc = Document::default();
        assert_eq!(doc.content(), INITIAL_CONTENT);
        assert_eq!(doc.language(), Language::JavaScript);
        assert_eq!(doc.revision(), 0);
    }

    #[test]
    fn test_replace_bumps_revision() {
        let mut doc = Document::new("");
        assert_eq!(doc.replace("a"), 1);
        assert_eq!(doc.replace("b"), 2);
        assert_eq!(doc.content(), "b");
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("JavaScript".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("py".parse::<Language>().unwrap(), Language::Python);
        assert_eq!(" c ".parse::<Language>().unwrap(), Language::C);
        assert!(matches!(
            "cobol".parse::<Language>(),
            Err(PadError::UnknownLanguage(name)) if name == "cobol"
        ));
    }

    #[test]
    fn test_only_javascript_executes() {
        let executable: Vec<_> = Language::ALL.iter().filter(|l| l.is_executable()).collect();
        assert_eq!(executable, vec![&Language::JavaScript]);
    }

    #[test]
    fn test_theme_toggle_and_serde() {
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"vs-dark\"");
    }

    #[test]
    fn test_history_records_copies() {
        let mut doc = Document::new("one");
        let mut history = History::new();

        history.record(&doc);
        doc.replace("two");
        history.record(&doc);

        assert_eq!(history.len(), 2);
        assert_eq!(history.get(0).unwrap().content(), "one");
        assert_eq!(history.get(0).unwrap().revision(), 0);
        assert_eq!(history.get(1).unwrap().content(), "two");
        assert_eq!(history.latest().unwrap().sequence(), 1);
        assert!(matches!(
            history.get(5),
            Err(PadError::SnapshotOutOfBounds { index: 5, length: 2 })
        ));
    }
}
