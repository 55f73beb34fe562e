//! Terminal input handling for the console front-end.
//!
//! Wraps rustyline configuration and completion for the `:` commands and the
//! occupied save slots, with a plain stdin fallback when no terminal is attached.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use crate::slots::SaveSlotRegistry;

/// Outcome of reading a line from the REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    Eof,
    Interrupted,
}

pub(crate) const REPL_COMMANDS: &[&str] = &[
    ":help", ":load", ":quit", ":restart", ":save", ":slots", ":theme",
];

/// Commands whose argument is a slot number.
const SLOT_COMMANDS: &[&str] = &[":load", ":save"];

type ReplEditor = rustyline::Editor<ReplHelper, DefaultHistory>;

struct ReplHelper {
    registry: SaveSlotRegistry,
}

impl Helper for ReplHelper {}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let (start, prefix) = current_prefix(line, pos);
        if !prefix.starts_with(':') {
            return Ok((start, Vec::new()));
        }
        if let Some(completions) = slot_completions(&prefix, start, &self.registry.occupied()) {
            return Ok(completions);
        }
        Ok((start, command_completions(&prefix)))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

fn current_prefix(line: &str, pos: usize) -> (usize, String) {
    let slice = &line[..pos];
    let trimmed = slice.trim_start_matches(char::is_whitespace);
    let start = pos - trimmed.len();
    (start, trimmed.to_string())
}

fn command_completions(prefix: &str) -> Vec<Pair> {
    let lower = prefix.to_lowercase();
    REPL_COMMANDS
        .iter()
        .filter(|cmd| cmd.starts_with(&lower))
        .map(|cmd| Pair {
            display: (*cmd).to_string(),
            replacement: (*cmd).to_string(),
        })
        .collect()
}

/// Offer occupied slot numbers after `:load ` or `:save `.
fn slot_completions(prefix: &str, start: usize, occupied: &[u8]) -> Option<(usize, Vec<Pair>)> {
    let (command, rest) = prefix.split_once(char::is_whitespace)?;
    if !SLOT_COMMANDS.contains(&command.to_lowercase().as_str()) {
        return None;
    }
    let partial = rest.trim_start();
    let insertion = start + prefix.len() - partial.len();
    let pairs = occupied
        .iter()
        .map(u8::to_string)
        .filter(|slot| slot.starts_with(partial))
        .map(|slot| Pair {
            display: slot.clone(),
            replacement: slot,
        })
        .collect();
    Some((insertion, pairs))
}

/// Helper responsible for managing the interactive input backend.
///
/// Prefers `rustyline` when an interactive terminal is available, falling back to
/// a basic stdin reader otherwise.
pub struct InputManager {
    backend: Backend,
}

impl InputManager {
    pub fn new(registry: SaveSlotRegistry) -> Self {
        let backend = if io::stdin().is_terminal() {
            match RustylineInput::new(registry) {
                Ok(editor) => {
                    info!("using rustyline-backed REPL input");
                    Backend::Rustyline(Box::new(editor))
                },
                Err(err) => {
                    warn!("failed to initialize rustyline ({err}), falling back to basic stdin");
                    Backend::plain()
                },
            }
        } else {
            info!("stdin is not a TTY; using basic input mode");
            Backend::plain()
        };

        Self { backend }
    }

    /// Read a line from the current backend. If the interactive backend reports an
    /// unrecoverable error, switch to the plain stdin backend and retry once.
    ///
    /// # Errors
    /// Returns the stdin error if the plain backend fails as well.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<InputEvent> {
        match self.backend.read_line(prompt) {
            Ok(event) => Ok(event),
            Err(err) if self.backend.is_rustyline() => {
                warn!("rustyline input failed: {err} -- switching to basic stdin");
                self.backend = Backend::plain();
                self.backend.read_line(prompt)
            },
            Err(err) => Err(err),
        }
    }
}

enum Backend {
    Rustyline(Box<RustylineInput>),
    Plain(StdinInput),
}

impl Backend {
    fn plain() -> Self {
        Backend::Plain(StdinInput::default())
    }

    fn is_rustyline(&self) -> bool {
        matches!(self, Backend::Rustyline(_))
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<InputEvent> {
        match self {
            Backend::Rustyline(editor) => editor.read_line(prompt),
            Backend::Plain(stdin) => stdin.read_line(prompt),
        }
    }
}

struct RustylineInput {
    editor: ReplEditor,
    history_path: Option<PathBuf>,
}

impl RustylineInput {
    fn new(registry: SaveSlotRegistry) -> io::Result<Self> {
        let mut editor = ReplEditor::new().map_err(map_io_err)?;
        editor.set_helper(Some(ReplHelper { registry }));
        let history_path = history_file_path();

        if let Some(path) = history_path.as_ref() {
            if let Some(dir) = path.parent()
                && let Err(err) = fs::create_dir_all(dir)
            {
                warn!("failed to create history directory {}: {err}", dir.display());
            }

            if let Err(err) = editor.load_history(path) {
                match err {
                    ReadlineError::Io(ref io_err) if io_err.kind() == io::ErrorKind::NotFound => {
                        info!("no prior history found at {}, starting fresh", path.display());
                    },
                    other => {
                        warn!("failed to load history from {}: {other}", path.display());
                    },
                }
            }
        }

        Ok(Self { editor, history_path })
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<InputEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                        warn!("failed to append to history: {err}");
                    }
                    if let Some(path) = self.history_path.as_ref()
                        && let Err(err) = self.editor.save_history(path)
                    {
                        warn!("failed to persist history to {}: {err}", path.display());
                    }
                }
                Ok(InputEvent::Line(line))
            },
            Err(err) => convert_readline_error(err),
        }
    }
}

#[derive(Default)]
struct StdinInput {
    buffer: String,
}

impl StdinInput {
    fn read_line(&mut self, prompt: &str) -> io::Result<InputEvent> {
        print!("{prompt}");
        io::stdout().flush()?;

        self.buffer.clear();
        let bytes = io::stdin().read_line(&mut self.buffer)?;
        if bytes == 0 {
            return Ok(InputEvent::Eof);
        }

        if self.buffer.ends_with('\n') {
            self.buffer.pop();
            if self.buffer.ends_with('\r') {
                self.buffer.pop();
            }
        }

        Ok(InputEvent::Line(self.buffer.clone()))
    }
}

fn convert_readline_error(err: ReadlineError) -> io::Result<InputEvent> {
    match err {
        ReadlineError::Interrupted => Ok(InputEvent::Interrupted),
        ReadlineError::Eof => Ok(InputEvent::Eof),
        other => Err(map_io_err(other)),
    }
}

fn map_io_err(err: ReadlineError) -> io::Error {
    match err {
        ReadlineError::Io(io_err) => io_err,
        other => io::Error::other(other),
    }
}

fn history_file_path() -> Option<PathBuf> {
    dirs::data_dir()
        .or_else(dirs::data_local_dir)
        .map(|base| build_history_path(&base))
}

fn build_history_path(base: &Path) -> PathBuf {
    base.join("metaparser").join("history.txt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_readline_ctrl_c_to_interrupt() -> io::Result<()> {
        assert_eq!(convert_readline_error(ReadlineError::Interrupted)?, InputEvent::Interrupted);
        assert_eq!(convert_readline_error(ReadlineError::Eof)?, InputEvent::Eof);
        Ok(())
    }

    #[test]
    fn history_path_appends_components() {
        let path = build_history_path(Path::new("/tmp/mp-test"));
        assert!(path.ends_with(Path::new("metaparser/history.txt")));
    }

    #[test]
    fn colon_prefix_completes_commands() {
        let names: Vec<_> = command_completions(":s").into_iter().map(|p| p.replacement).collect();
        assert_eq!(names, vec![":save", ":slots"]);
    }

    #[test]
    fn slot_arguments_complete_from_occupied_slots() {
        let (at, pairs) = slot_completions(":load ", 0, &[1, 3]).unwrap_or_default();
        assert_eq!(at, 6);
        let slots: Vec<_> = pairs.into_iter().map(|p| p.replacement).collect();
        assert_eq!(slots, vec!["1", "3"]);

        let (at, pairs) = slot_completions(":save 3", 2, &[1, 3]).unwrap_or_default();
        assert_eq!(at, 8);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn other_commands_get_no_slot_completion() {
        assert!(slot_completions(":theme d", 0, &[1]).is_none());
        assert!(slot_completions(":load", 0, &[1]).is_none());
    }
}
