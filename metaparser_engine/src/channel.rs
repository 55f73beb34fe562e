//! Synchronous request/response channel to the interpreter.
//!
//! [`CommandChannel`] owns the [`Interpreter`] and turns its C-style return
//! codes and null results into [`EngineError`]s. It never retries; that is the
//! session's call. Failures are logged here, at the boundary, since the
//! interpreter's error text is only retrievable right after the failing call.

use log::{debug, error, info};

use crate::error::EngineError;
use crate::interpreter::Interpreter;
use crate::storage::{AUTOSAVE, StorageLayout, interpreter_target};

/// Command strings understood by the metaparser game.
pub mod commands {
    use super::{AUTOSAVE, interpreter_target};

    /// Neutral probe that describes the current location.
    pub const LOOK: &str = "look";

    /// Wrap player input for the metaparser dispatcher.
    ///
    /// Double quotes are removed so the input cannot terminate the argument early.
    pub fn user_turn(text: &str) -> String {
        format!("@metaparser \"{}\"", strip_quotes(text))
    }

    pub fn strip_quotes(text: &str) -> String {
        text.replace('"', "")
    }

    pub fn save(name: &str) -> String {
        format!("save {}", interpreter_target(name))
    }

    pub fn load(name: &str) -> String {
        format!("load {}", interpreter_target(name))
    }

    pub fn save_autosave() -> String {
        save(AUTOSAVE)
    }

    pub fn load_autosave() -> String {
        load(AUTOSAVE)
    }
}

/// The only path through which the session talks to the interpreter.
#[derive(Debug)]
pub struct CommandChannel<I: Interpreter> {
    interpreter: I,
    /// Set once `init` succeeded, cleared by `teardown`.
    live: bool,
}

impl<I: Interpreter> CommandChannel<I> {
    pub fn new(interpreter: I) -> Self {
        Self {
            interpreter,
            live: false,
        }
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    /// Whether the interpreter holds state that `teardown` must release.
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Register the extension, initialise against `layout` and run the
    /// interpreter's load step, stopping at the first failure.
    ///
    /// # Errors
    /// - [`EngineError::Extension`] / [`EngineError::Init`] with the return code
    /// - [`EngineError::Load`] with the interpreter's last error text
    pub fn start(&mut self, layout: &StorageLayout) -> Result<(), EngineError> {
        let code = self.interpreter.register_extension();
        if code != 0 {
            error!("instead_extension() failed with code {code}");
            return Err(EngineError::Extension { code });
        }

        let game_dir = layout.game_dir();
        let code = self.interpreter.init(layout.root(), &game_dir);
        if code != 0 {
            error!("instead_init({}) failed with code {code}", game_dir.display());
            return Err(EngineError::Init { code });
        }
        self.live = true;

        if self.interpreter.load() != 0 {
            let err = self.interpreter.last_error();
            error!("instead_load(): {err}");
            return Err(EngineError::Load(err));
        }

        info!("interpreter initialized in {}", layout.root().display());
        Ok(())
    }

    /// Submit one command and wait for its response.
    ///
    /// # Errors
    /// [`EngineError::Command`] carrying the interpreter's last error text.
    pub fn submit(&mut self, command: &str) -> Result<String, EngineError> {
        debug!("instead_cmd({command})");
        match self.interpreter.command(command) {
            Some(response) => Ok(response),
            None => {
                let err = self.interpreter.last_error();
                error!("instead_cmd({command}): {err}");
                Err(EngineError::Command(err))
            },
        }
    }

    /// Release the interpreter. Does nothing unless it was initialized.
    pub fn teardown(&mut self) {
        if !self.live {
            return;
        }
        self.interpreter.done();
        self.live = false;
        debug!("interpreter torn down");
    }

    pub fn restart_requested(&mut self) -> bool {
        self.interpreter.restart_requested()
    }

    pub fn save_requested(&mut self) -> bool {
        self.interpreter.save_requested()
    }

    pub fn load_requested(&mut self) -> bool {
        self.interpreter.load_requested()
    }
}
