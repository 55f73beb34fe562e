//! The running transcript shown to the player.

use crate::markup::{StyledText, parse};

/// Prefix put in front of echoed player commands.
pub const COMMAND_PROMPT: &str = "> ";

/// One command and the interpreter's answer to it.
///
/// `command` is empty for entries the session produces on its own (game start,
/// loading a slot).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub command: StyledText,
    pub response: StyledText,
}

impl TranscriptEntry {
    /// Entry for a player command; the response is parsed for markup.
    pub fn for_command(command: &str, response: &str) -> Self {
        Self {
            command: StyledText::plain(format!("{COMMAND_PROMPT}{command}")),
            response: parse(response),
        }
    }

    /// Entry with no echoed command.
    pub fn system(response: &str) -> Self {
        Self {
            command: StyledText::default(),
            response: parse(response),
        }
    }
}

/// Append-only list of entries, cleared wholesale on restart or load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
