//! Outbound notifications from the session to whatever front-end drives it.
//!
//! The session emits events synchronously at the point of decision. Front-ends
//! hand the session an [`EventSink`], usually the sending half of an unbounded
//! tokio channel.

use std::fmt;

use tokio::sync::mpsc::UnboundedSender;

use crate::transcript::TranscriptEntry;

/// Short user-facing messages. `Display` gives the default English text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    GameSaved,
    GameLoaded,
    AutosaveDeleteFailed(String),
    CommandFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::GameSaved => write!(f, "Game saved"),
            Notice::GameLoaded => write!(f, "Game loaded"),
            Notice::AutosaveDeleteFailed(err) => write!(f, "Could not delete the autosave: {err}"),
            Notice::CommandFailed(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    EntryAppended(TranscriptEntry),
    TranscriptCleared,
    ShowSaveMenu,
    ShowLoadMenu,
    Notice(Notice),
    /// Long-running work (asset installation) started or finished.
    Progress(bool),
    /// The session is faulted; carries the raw error text.
    Fatal(String),
}

pub trait EventSink {
    fn emit(&mut self, event: SessionEvent);
}

impl EventSink for UnboundedSender<SessionEvent> {
    fn emit(&mut self, event: SessionEvent) {
        // the receiver may already be gone during shutdown
        let _ = self.send(event);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: SessionEvent) {}
}
