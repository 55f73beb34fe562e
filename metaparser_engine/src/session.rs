//! The session controller.
//!
//! A [`Session`] owns the interpreter (through its [`CommandChannel`]), the
//! transcript and the storage layout. It drives the interpreter lifecycle,
//! routes player input, reacts to restart/save/load requests raised by the game
//! and reports everything a front-end needs through an [`EventSink`].
//!
//! ```text
//!   Uninitialized --initialize()--> Ready --fatal error--> Faulted
//!         ^                           |
//!         +--------shutdown()---------+
//! ```
//!
//! Restart and loading a slot tear the interpreter down and bring it back up
//! inside a single call, so from the outside the session stays `Ready` unless
//! re-initialization fails. `Faulted` is terminal.
//!
//! A `Session` is not thread-safe and is meant to be driven from one thread;
//! [`crate::executor::SessionHandle`] provides that thread.

use std::fmt;
use std::fs;

use log::{error, info, warn};

use crate::assets::AssetBundle;
use crate::channel::{CommandChannel, commands};
use crate::config::{CommandErrorPolicy, EngineConfig};
use crate::error::EngineError;
use crate::events::{EventSink, Notice, SessionEvent};
use crate::interpreter::Interpreter;
use crate::preferences::Preferences;
use crate::storage::StorageLayout;
use crate::transcript::{Transcript, TranscriptEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    /// Carries the error text that ended the session.
    Faulted(String),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Faulted(_) => write!(f, "faulted"),
        }
    }
}

/// What a player turn led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A normal response was added to the transcript.
    Response,
    /// The game asked for a restart, which has been carried out.
    Restarted,
    /// The game asked the front-end to show its save menu.
    SaveRequested,
    /// The game asked the front-end to show its load menu.
    LoadRequested,
}

struct AssetInstall {
    bundle: AssetBundle,
    force: bool,
}

pub struct Session<I: Interpreter> {
    channel: CommandChannel<I>,
    layout: StorageLayout,
    state: SessionState,
    transcript: Transcript,
    events: Box<dyn EventSink>,
    policy: CommandErrorPolicy,
    assets: Option<AssetInstall>,
}

impl<I: Interpreter> Session<I> {
    pub fn new(interpreter: I, layout: StorageLayout, events: Box<dyn EventSink>) -> Self {
        Self {
            channel: CommandChannel::new(interpreter),
            layout,
            state: SessionState::Uninitialized,
            transcript: Transcript::new(),
            events,
            policy: CommandErrorPolicy::default(),
            assets: None,
        }
    }

    /// Build a session from config: error policy and asset bundle included.
    pub fn from_config(
        interpreter: I,
        layout: StorageLayout,
        config: &EngineConfig,
        events: Box<dyn EventSink>,
    ) -> Self {
        let mut session = Self::new(interpreter, layout, events).with_policy(config.command_errors);
        if let Some(source) = &config.asset_source {
            session = session.with_assets(AssetBundle::new(source), config.force_asset_refresh);
        }
        session
    }

    #[must_use]
    pub fn with_policy(mut self, policy: CommandErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Install `bundle` into the storage root during [`Session::launch`].
    #[must_use]
    pub fn with_assets(mut self, bundle: AssetBundle, force: bool) -> Self {
        self.assets = Some(AssetInstall { bundle, force });
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn interpreter(&self) -> &I {
        self.channel.interpreter()
    }

    /// Bring a fresh session all the way up: install assets if configured,
    /// initialize the interpreter and start the game. Does nothing when the
    /// session is already running.
    ///
    /// # Errors
    /// Any fatal [`EngineError`]; the session is then `Faulted`.
    pub fn launch(&mut self) -> Result<(), EngineError> {
        match &self.state {
            SessionState::Ready => return Ok(()),
            SessionState::Faulted(msg) => return Err(EngineError::Faulted(msg.clone())),
            SessionState::Uninitialized => {},
        }

        if let Some(assets) = &self.assets {
            let prefs_path = self.layout.preferences_path();
            let mut prefs = Preferences::load(&prefs_path);
            self.events.emit(SessionEvent::Progress(true));
            let installed = assets.bundle.install(&self.layout, &mut prefs, assets.force);
            self.events.emit(SessionEvent::Progress(false));
            if let Err(err) = installed {
                return Err(self.fault(err));
            }
        }

        self.initialize()?;
        self.start_game()
    }

    /// Register the extension, initialize and load the interpreter.
    ///
    /// # Errors
    /// The fatal error of the first step that failed; the session is then `Faulted`.
    pub fn initialize(&mut self) -> Result<(), EngineError> {
        match &self.state {
            SessionState::Ready => return Ok(()),
            SessionState::Faulted(msg) => return Err(EngineError::Faulted(msg.clone())),
            SessionState::Uninitialized => {},
        }

        match self.channel.start(&self.layout) {
            Ok(()) => {
                self.state = SessionState::Ready;
                Ok(())
            },
            Err(err) => Err(self.fault(err)),
        }
    }

    /// Produce the opening transcript entry: resume from the autosave when one
    /// exists, otherwise describe the starting location.
    ///
    /// # Errors
    /// A failing opening command is fatal; the session is then `Faulted`.
    pub fn start_game(&mut self) -> Result<(), EngineError> {
        self.ensure_ready()?;

        let command = if self.layout.autosave_path().exists() {
            info!("resuming from autosave");
            commands::load_autosave()
        } else {
            info!("starting a new game");
            commands::LOOK.to_string()
        };

        match self.channel.submit(&command) {
            Ok(response) => {
                self.append(TranscriptEntry::system(&response));
                Ok(())
            },
            Err(err) => Err(self.fault(err)),
        }
    }

    /// Send one line of player input to the game.
    ///
    /// After the response is recorded the game's restart, save and load
    /// requests are checked in that order; the first one raised is acted on
    /// and the rest are ignored for this turn.
    ///
    /// # Errors
    /// - [`EngineError::NotReady`] / [`EngineError::Faulted`] outside `Ready`
    /// - [`EngineError::Command`] when the interpreter rejects the turn
    /// - fatal errors from a requested restart
    pub fn process_input(&mut self, text: &str) -> Result<TurnOutcome, EngineError> {
        self.ensure_ready()?;

        let text = commands::strip_quotes(text);
        let response = match self.channel.submit(&commands::user_turn(&text)) {
            Ok(response) => response,
            Err(err) => return Err(self.command_failed(err)),
        };
        self.append(TranscriptEntry::for_command(&text, &response));

        if self.channel.restart_requested() {
            self.restart()?;
            return Ok(TurnOutcome::Restarted);
        }
        if self.channel.save_requested() {
            self.events.emit(SessionEvent::ShowSaveMenu);
            return Ok(TurnOutcome::SaveRequested);
        }
        if self.channel.load_requested() {
            self.events.emit(SessionEvent::ShowLoadMenu);
            return Ok(TurnOutcome::LoadRequested);
        }
        Ok(TurnOutcome::Response)
    }

    /// Start over: drop the autosave, clear the transcript, re-initialize the
    /// interpreter and show the opening text again.
    ///
    /// # Errors
    /// Fatal errors from re-initialization or the opening command.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        self.ensure_ready()?;
        info!("restarting game");

        let autosave = self.layout.autosave_path();
        if autosave.exists()
            && let Err(err) = fs::remove_file(&autosave)
        {
            warn!("failed to delete autosave {}: {err}", autosave.display());
            self.events
                .emit(SessionEvent::Notice(Notice::AutosaveDeleteFailed(err.to_string())));
        }

        self.clear_transcript();
        self.reinitialize()?;
        self.start_game()
    }

    /// Save to the autosave (no name, or a blank one) or to the named slot.
    ///
    /// Only named saves are confirmed with [`Notice::GameSaved`].
    ///
    /// # Errors
    /// - [`EngineError::InvalidSlot`] for names that cannot be addressed
    /// - [`EngineError::Command`] when the interpreter fails to save
    pub fn save(&mut self, slot: Option<&str>) -> Result<(), EngineError> {
        self.ensure_ready()?;

        let Some(name) = slot.map(str::trim).filter(|name| !name.is_empty()) else {
            if let Err(err) = self.channel.submit(&commands::save_autosave()) {
                return Err(self.command_failed(err));
            }
            info!("autosaved");
            return Ok(());
        };

        let name = validate_slot_name(name)?;
        let lock = self.layout.slot_lock();
        let saved = {
            let _guard = lock.write();
            self.channel.submit(&commands::save(name))
        };
        if let Err(err) = saved {
            return Err(self.command_failed(err));
        }
        info!("saved game to '{name}'");
        self.events.emit(SessionEvent::Notice(Notice::GameSaved));
        Ok(())
    }

    /// Replace the running game with the one saved in `name`.
    ///
    /// # Errors
    /// - [`EngineError::InvalidSlot`] before anything is touched
    /// - fatal errors from re-initialization
    /// - [`EngineError::Command`] when the interpreter cannot load the slot
    pub fn load_state(&mut self, name: &str) -> Result<(), EngineError> {
        self.ensure_ready()?;
        let name = validate_slot_name(name.trim())?;
        info!("loading game from '{name}'");

        self.clear_transcript();
        self.reinitialize()?;

        let response = match self.channel.submit(&commands::load(name)) {
            Ok(response) => response,
            Err(err) => return Err(self.command_failed(err)),
        };
        self.events.emit(SessionEvent::Notice(Notice::GameLoaded));
        self.append(TranscriptEntry::system(&response));
        Ok(())
    }

    /// Autosave if possible, then tear the interpreter down.
    ///
    /// Never fails: a failed autosave is logged and teardown happens anyway.
    /// A faulted session stays faulted; its interpreter is only torn down if it
    /// got far enough to need it, and only once.
    pub fn shutdown(&mut self) {
        match self.state {
            SessionState::Uninitialized => return,
            SessionState::Ready => {
                if let Err(err) = self.channel.submit(&commands::save_autosave()) {
                    warn!("autosave during shutdown failed: {err}");
                }
                self.state = SessionState::Uninitialized;
            },
            SessionState::Faulted(_) => {},
        }
        self.channel.teardown();
        info!("session shut down");
    }

    fn ensure_ready(&self) -> Result<(), EngineError> {
        match &self.state {
            SessionState::Ready => Ok(()),
            SessionState::Faulted(msg) => Err(EngineError::Faulted(msg.clone())),
            state @ SessionState::Uninitialized => Err(EngineError::NotReady(state.clone())),
        }
    }

    fn reinitialize(&mut self) -> Result<(), EngineError> {
        self.channel.teardown();
        self.state = SessionState::Uninitialized;
        self.initialize()
    }

    fn append(&mut self, entry: TranscriptEntry) {
        self.transcript.push(entry.clone());
        self.events.emit(SessionEvent::EntryAppended(entry));
    }

    fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.events.emit(SessionEvent::TranscriptCleared);
    }

    /// Move to `Faulted`, announce it and hand the error back.
    fn fault(&mut self, err: EngineError) -> EngineError {
        let message = err.to_string();
        error!("session faulted: {message}");
        self.state = SessionState::Faulted(message.clone());
        self.events.emit(SessionEvent::Fatal(message));
        err
    }

    fn command_failed(&mut self, err: EngineError) -> EngineError {
        match self.policy {
            CommandErrorPolicy::Recoverable => {
                self.events
                    .emit(SessionEvent::Notice(Notice::CommandFailed(err.to_string())));
                err
            },
            CommandErrorPolicy::Fatal => self.fault(err),
        }
    }
}

/// Check that `name` can be addressed as `../<name>` without leaving the
/// storage root or breaking the command syntax.
fn validate_slot_name(name: &str) -> Result<&str, EngineError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.chars().any(|ch| matches!(ch, '/' | '\\' | '"') || ch.is_control());
    if bad {
        Err(EngineError::InvalidSlot(name.to_string()))
    } else {
        Ok(name)
    }
}
