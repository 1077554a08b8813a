//! Line commands and update rendering for the terminal participant.

use std::path::PathBuf;

use pairpad::participant::ParticipantUpdate;
use pairpad::{Language, ParticipantCommand};

pub const HELP: &str = "\
:set <text>      replace the buffer (\\n and \\t escapes)
:append <text>   append to the buffer
:load <path>     replace the buffer with a file
:show            print the buffer
:run             execute the buffer
:fmt             format the buffer
:snap            save a snapshot
:history         list snapshots
:lang <name>     javascript | python | java | c
:theme           toggle the theme
:status          connection and document status
:quit            leave the session";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(ParticipantCommand),
    Load(PathBuf),
    Help,
    Empty,
}

pub fn parse_line(line: &str) -> Result<Input, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(Input::Empty);
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Err("commands start with ':' (try :help)".to_string());
    };
    let (name, arg) = match rest.split_once(' ') {
        Some((name, arg)) => (name, arg),
        None => (rest, ""),
    };

    let command = match name {
        "set" => ParticipantCommand::Edit(unescape(arg)),
        "append" => ParticipantCommand::Append(unescape(arg)),
        "load" if arg.trim().is_empty() => return Err("usage: :load <path>".to_string()),
        "load" => return Ok(Input::Load(PathBuf::from(arg.trim()))),
        "show" => ParticipantCommand::Show,
        "run" => ParticipantCommand::Run,
        "fmt" => ParticipantCommand::Format,
        "snap" => ParticipantCommand::Snapshot,
        "history" => ParticipantCommand::History,
        "lang" => {
            let language: Language = arg
                .trim()
                .parse()
                .map_err(|e: pairpad::PadError| e.to_string())?;
            ParticipantCommand::SetLanguage(language)
        }
        "theme" => ParticipantCommand::ToggleTheme,
        "status" => ParticipantCommand::Status,
        "quit" | "q" => ParticipantCommand::Quit,
        "help" => return Ok(Input::Help),
        other => return Err(format!("unknown command ':{other}' (try :help)")),
    };
    Ok(Input::Command(command))
}

/// Expands `\n`, `\t` and `\\`.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn render(update: &ParticipantUpdate) -> String {
    match update {
        ParticipantUpdate::ContentChanged {
            content,
            revision,
            remote,
        } => {
            let source = if *remote { "remote" } else { "local" };
            format!("--- buffer r{revision} ({source}) ---\n{content}\n---")
        }
        ParticipantUpdate::Execution(result) => format!("[output]\n{}", result.display_text()),
        ParticipantUpdate::Suggestion(text) => format!("[suggestion] {text}"),
        ParticipantUpdate::Notice(notice) if notice.is_error() => {
            format!("[error] {}", notice.message())
        }
        ParticipantUpdate::Notice(notice) => format!("[notice] {}", notice.message()),
        ParticipantUpdate::LanguageChanged(language) => format!("[language] {}", language.label()),
        ParticipantUpdate::ThemeChanged(theme) => format!("[theme] {}", theme.as_str()),
        ParticipantUpdate::SnapshotSaved(entry) => {
            format!(
                "[snapshot #{}] r{} {}",
                entry.sequence(),
                entry.revision(),
                entry.language().as_str()
            )
        }
        ParticipantUpdate::History(entries) if entries.is_empty() => "[history] empty".to_string(),
        ParticipantUpdate::History(entries) => {
            let mut out = format!("[history] {} snapshot(s)", entries.len());
            for entry in entries {
                let first_line = entry.content().lines().next().unwrap_or_default();
                out.push_str(&format!(
                    "\n  #{} r{} {}: {}",
                    entry.sequence(),
                    entry.revision(),
                    entry.language().as_str(),
                    first_line
                ));
            }
            out
        }
        ParticipantUpdate::Status {
            connection,
            revision,
            language,
            theme,
        } => format!(
            "[status] {connection}, revision {revision}, {}, theme {}",
            language.as_str(),
            theme.as_str()
        ),
        ParticipantUpdate::Connection(status) => format!("[connection] {status}"),
    }
}
