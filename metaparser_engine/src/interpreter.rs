//! The boundary to the native story interpreter.
//!
//! [`Interpreter`] mirrors the entry points the INSTEAD library and the
//! metaparser shim expose. The real binding lives in [`crate::native`] behind
//! the `native` feature; [`ScriptedInterpreter`] is an in-memory stand-in used
//! by the test suite and handy for front-end development without the library.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::warn;

/// Raw command-execution interface of the interpreter.
///
/// Return codes follow the C convention: `0` is success. `command` returns
/// `None` when the interpreter failed; the reason is then available from
/// `last_error`. Implementations need not be thread-safe; the session layer
/// confines every call to a single thread.
pub trait Interpreter {
    fn register_extension(&mut self) -> i32;
    fn init(&mut self, storage_root: &Path, game_dir: &Path) -> i32;
    fn load(&mut self) -> i32;
    fn command(&mut self, cmd: &str) -> Option<String>;
    fn last_error(&mut self) -> String;
    fn done(&mut self);
    fn restart_requested(&mut self) -> bool;
    fn save_requested(&mut self) -> bool;
    fn load_requested(&mut self) -> bool;
}

/// One recorded call against a [`ScriptedInterpreter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RegisterExtension,
    Init { storage_root: PathBuf, game_dir: PathBuf },
    Load,
    Command(String),
    LastError,
    Done,
    QueryRestart,
    QuerySave,
    QueryLoad,
}

/// Signals a game can raise from inside a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Signals {
    pub restart: bool,
    pub save: bool,
    pub load: bool,
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<Call>,
    responses: HashMap<String, String>,
    failures: HashMap<String, String>,
    extension_code: i32,
    init_code: i32,
    load_error: Option<String>,
    last_error: String,
    pending: Signals,
    active: Signals,
    storage_root: Option<PathBuf>,
    delay: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Scripted interpreter double.
///
/// Clones share the same script, so a test can keep one clone for inspection
/// while the session owns another. `save ../<name>` writes `<root>/<name>` and
/// `load ../<name>` fails when that file is missing, which keeps the save-slot
/// registry honest.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInterpreter {
    script: Arc<Mutex<Script>>,
}

pub const DEFAULT_RESPONSE: &str = "Nothing happens.";

impl ScriptedInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer `cmd` with `response` from now on.
    pub fn respond(&self, cmd: impl Into<String>, response: impl Into<String>) -> &Self {
        let mut script = self.script();
        let cmd = cmd.into();
        script.failures.remove(&cmd);
        script.responses.insert(cmd, response.into());
        self
    }

    /// Make `cmd` fail with `error` until it is given a response again.
    pub fn fail(&self, cmd: impl Into<String>, error: impl Into<String>) -> &Self {
        self.script().failures.insert(cmd.into(), error.into());
        self
    }

    pub fn set_extension_code(&self, code: i32) -> &Self {
        self.script().extension_code = code;
        self
    }

    pub fn set_init_code(&self, code: i32) -> &Self {
        self.script().init_code = code;
        self
    }

    /// Make the load step fail with `error`; `None` lets it succeed.
    pub fn set_load_error(&self, error: Option<&str>) -> &Self {
        self.script().load_error = error.map(str::to_string);
        self
    }

    /// Raise `signals` during the next user turn.
    pub fn signal_next_turn(&self, signals: Signals) -> &Self {
        self.script().pending = signals;
        self
    }

    /// Block every command for `delay`.
    pub fn set_delay(&self, delay: Duration) -> &Self {
        self.script().delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script().calls.clone()
    }

    /// Commands submitted so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.script()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Command(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    /// Highest number of commands that were ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.script().max_in_flight
    }

    fn record(&self, call: Call) {
        self.script().calls.push(call);
    }
}

impl Interpreter for ScriptedInterpreter {
    fn register_extension(&mut self) -> i32 {
        self.record(Call::RegisterExtension);
        self.script().extension_code
    }

    fn init(&mut self, storage_root: &Path, game_dir: &Path) -> i32 {
        self.record(Call::Init {
            storage_root: storage_root.to_path_buf(),
            game_dir: game_dir.to_path_buf(),
        });
        let mut script = self.script();
        if script.init_code == 0 {
            script.storage_root = Some(storage_root.to_path_buf());
        }
        script.init_code
    }

    fn load(&mut self) -> i32 {
        self.record(Call::Load);
        let mut script = self.script();
        match script.load_error.clone() {
            Some(err) => {
                script.last_error = err;
                1
            },
            None => 0,
        }
    }

    fn command(&mut self, cmd: &str) -> Option<String> {
        self.record(Call::Command(cmd.to_string()));
        let delay = {
            let mut script = self.script();
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
            script.active = if cmd.starts_with("@metaparser ") {
                std::mem::take(&mut script.pending)
            } else {
                Signals::default()
            };
            script.delay
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let mut script = self.script();
        script.in_flight -= 1;

        if let Some(err) = script.failures.get(cmd).cloned() {
            script.last_error = err;
            return None;
        }

        if let Some(name) = cmd.strip_prefix("save ../") {
            let Some(root) = script.storage_root.clone() else {
                script.last_error = "interpreter is not initialized".into();
                return None;
            };
            if let Err(err) = fs::write(root.join(name), format!("-- {name}\n")) {
                warn!("scripted save to '{name}' failed: {err}");
                script.last_error = format!("Can not write file: {name}");
                return None;
            }
        } else if let Some(name) = cmd.strip_prefix("load ../") {
            let exists = script.storage_root.as_ref().is_some_and(|root| root.join(name).is_file());
            if !exists {
                script.last_error = format!("Can not open file: {name}");
                return None;
            }
        }

        Some(
            script
                .responses
                .get(cmd)
                .cloned()
                .unwrap_or_else(|| DEFAULT_RESPONSE.to_string()),
        )
    }

    fn last_error(&mut self) -> String {
        self.record(Call::LastError);
        self.script().last_error.clone()
    }

    fn done(&mut self) {
        self.record(Call::Done);
        let mut script = self.script();
        script.storage_root = None;
        script.active = Signals::default();
    }

    fn restart_requested(&mut self) -> bool {
        self.record(Call::QueryRestart);
        self.script().active.restart
    }

    fn save_requested(&mut self) -> bool {
        self.record(Call::QuerySave);
        self.script().active.save
    }

    fn load_requested(&mut self) -> bool {
        self.record(Call::QueryLoad);
        self.script().active.load
    }
}
