//! Console front-end.
//!
//! Reads player input, hands it to the session through a [`SessionHandle`] and
//! prints whatever [`SessionEvent`]s the session queued in response. Lines
//! starting with `:` are front-end commands; everything else is a game turn.

mod input;

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Result, anyhow, bail};
use colored::Colorize;
use log::{info, warn};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::EngineError;
use crate::events::SessionEvent;
use crate::executor::SessionHandle;
use crate::interpreter::Interpreter;
use crate::preferences::Preferences;
use crate::slots::SlotId;
use crate::style::{TranscriptStyle, render_entry};
use crate::theme::Theme;

use input::{InputEvent, InputManager};

const PROMPT: &str = "> ";

/// A parsed line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Free text for the game.
    Play(String),
    /// Numbered slot, or the autosave when no number is given.
    Save(Option<u8>),
    Load(u8),
    Slots,
    Restart,
    /// Switch theme, or show the current one.
    Theme(Option<Theme>),
    Help,
    Quit,
    Empty,
    /// Malformed front-end command; carries the message to show.
    Invalid(String),
}

/// Parse one line of input.
pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix(':') else {
        return ReplCommand::Play(line.to_string());
    };

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default().to_lowercase();
    let arg = words.next();
    if words.next().is_some() {
        return ReplCommand::Invalid(format!("too many arguments for :{name}"));
    }

    match (name.as_str(), arg) {
        ("save", None) => ReplCommand::Save(None),
        ("save", Some(slot)) => slot_number(slot).map_or_else(ReplCommand::Invalid, |n| ReplCommand::Save(Some(n))),
        ("load", Some(slot)) => slot_number(slot).map_or_else(ReplCommand::Invalid, ReplCommand::Load),
        ("load", None) => ReplCommand::Invalid("usage: :load <slot>".into()),
        ("slots", None) => ReplCommand::Slots,
        ("restart", None) => ReplCommand::Restart,
        ("theme", None) => ReplCommand::Theme(None),
        ("theme", Some(name)) => name
            .parse::<Theme>()
            .map_or_else(ReplCommand::Invalid, |theme| ReplCommand::Theme(Some(theme))),
        ("help" | "h" | "?", None) => ReplCommand::Help,
        ("quit" | "q" | "exit", None) => ReplCommand::Quit,
        (name, _) if input::REPL_COMMANDS.contains(&format!(":{name}").as_str()) => {
            ReplCommand::Invalid(format!(":{name} takes no argument"))
        },
        (name, _) => ReplCommand::Invalid(format!("unknown command :{name} (try :help)")),
    }
}

fn slot_number(raw: &str) -> Result<u8, String> {
    raw.parse::<u8>().map_err(|_| format!("'{raw}' is not a slot number"))
}

/// Run the console until the player quits or the session faults.
///
/// `events` must be the receiving end of the sink the session was built with.
///
/// # Errors
/// - fatal session errors, with the interpreter's text
/// - the worker thread stopping unexpectedly
pub fn run_repl<I: Interpreter + 'static>(
    handle: &SessionHandle<I>,
    events: UnboundedReceiver<SessionEvent>,
    prefs_path: &Path,
) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let mut console = Console {
        handle,
        events,
        runtime,
        input: InputManager::new(handle.registry().clone()),
        theme: Preferences::load(prefs_path).theme,
        prefs_path,
    };
    console.run()
}

struct Console<'a, I: Interpreter + 'static> {
    handle: &'a SessionHandle<I>,
    events: UnboundedReceiver<SessionEvent>,
    runtime: Runtime,
    input: InputManager,
    theme: Theme,
    prefs_path: &'a Path,
}

enum Flow {
    Continue,
    Quit,
}

impl<I: Interpreter + 'static> Console<'_, I> {
    fn run(&mut self) -> Result<()> {
        println!("{}\n", "METAPARSER".bold().underline());
        let launched = self.runtime.block_on(self.handle.launch());
        self.settle(launched)?;

        loop {
            let line = match self.input.read_line(PROMPT) {
                Ok(InputEvent::Line(line)) => line,
                Ok(InputEvent::Eof) => ":quit".to_string(),
                Ok(InputEvent::Interrupted) => {
                    println!("{}", "Command canceled.".notice_style(self.theme));
                    continue;
                },
                Err(err) => {
                    warn!("failed to read input: {err}");
                    println!("{}", "Failed to read input. Try again.".error_style(self.theme));
                    continue;
                },
            };

            if let Flow::Quit = self.dispatch(parse_command(&line))? {
                info!("player quit");
                return Ok(());
            }
        }
    }

    fn dispatch(&mut self, command: ReplCommand) -> Result<Flow> {
        match command {
            ReplCommand::Empty => {},
            ReplCommand::Play(text) => {
                let turn = self.runtime.block_on(self.handle.process_input(text));
                self.settle(turn)?;
            },
            ReplCommand::Save(None) => {
                let saved = self.runtime.block_on(self.handle.save(None));
                if self.settle(saved)?.is_some() {
                    println!("{}", "Autosaved.".notice_style(self.theme));
                }
            },
            ReplCommand::Save(Some(number)) => {
                if let Some(slot) = self.slot(number) {
                    let saved = self.runtime.block_on(self.handle.save(Some(slot.file_name())));
                    self.settle(saved)?;
                }
            },
            ReplCommand::Load(number) => {
                if let Some(slot) = self.slot(number) {
                    let loaded = self.runtime.block_on(self.handle.load_state(slot.file_name()));
                    self.settle(loaded)?;
                }
            },
            ReplCommand::Slots => self.print_slots(),
            ReplCommand::Restart => {
                let restarted = self.runtime.block_on(self.handle.restart());
                self.settle(restarted)?;
            },
            ReplCommand::Theme(None) => {
                println!("{}", format!("Current theme: {}", self.theme).notice_style(self.theme));
            },
            ReplCommand::Theme(Some(theme)) => self.set_theme(theme),
            ReplCommand::Help => self.print_help(),
            ReplCommand::Quit => {
                let stopped = self.runtime.block_on(self.handle.shutdown());
                self.settle(stopped)?;
                return Ok(Flow::Quit);
            },
            ReplCommand::Invalid(msg) => println!("{}", msg.error_style(self.theme)),
        }
        Ok(Flow::Continue)
    }

    /// Print queued events, then decide what an operation's result means here.
    ///
    /// Returns `Ok(None)` for failures already shown to the player.
    fn settle<T>(&mut self, result: Result<T, EngineError>) -> Result<Option<T>> {
        self.render_events()?;
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err @ EngineError::WorkerGone) => Err(anyhow!(err)),
            Err(err) if err.is_fatal() => {
                println!("{}", err.to_string().error_style(self.theme));
                release_after_fatal(&self.runtime, self.handle);
                Err(anyhow!(err))
            },
            // already reported through a notice
            Err(EngineError::Command(_)) => Ok(None),
            Err(err) => {
                println!("{}", err.to_string().error_style(self.theme));
                Ok(None)
            },
        }
    }

    fn render_events(&mut self) -> Result<()> {
        let width = textwrap::termwidth();
        while let Ok(event) = self.events.try_recv() {
            match event {
                SessionEvent::EntryAppended(entry) => println!("{}\n", render_entry(&entry, width, self.theme)),
                SessionEvent::TranscriptCleared => {
                    print!("\x1B[2J\x1B[H");
                    io::stdout().flush()?;
                },
                SessionEvent::ShowSaveMenu => {
                    println!("{}", "Save game".section_style(self.theme));
                    self.print_slots();
                    println!("{}", "Use :save <slot> to save.".notice_style(self.theme));
                },
                SessionEvent::ShowLoadMenu => {
                    println!("{}", "Load game".section_style(self.theme));
                    self.print_slots();
                    println!("{}", "Use :load <slot> to load.".notice_style(self.theme));
                },
                SessionEvent::Notice(notice) => println!("{}", notice.to_string().notice_style(self.theme)),
                SessionEvent::Progress(true) => {
                    println!("{}", "Installing game files...".notice_style(self.theme));
                },
                SessionEvent::Progress(false) => {},
                SessionEvent::Fatal(message) => {
                    println!("{}", message.error_style(self.theme));
                    release_after_fatal(&self.runtime, self.handle);
                    bail!(message);
                },
            }
        }
        Ok(())
    }

    fn slot(&self, number: u8) -> Option<SlotId> {
        match SlotId::new(number, self.handle.registry().count()) {
            Ok(slot) => Some(slot),
            Err(err) => {
                println!("{}", err.to_string().error_style(self.theme));
                None
            },
        }
    }

    fn print_slots(&self) {
        for (number, stamp) in self.handle.list_slots() {
            let stamp = stamp.unwrap_or_else(|| "empty".to_string());
            println!("  {number}: {stamp}");
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        // reread so asset bookkeeping written during launch is kept
        let mut prefs = Preferences::load(self.prefs_path);
        prefs.theme = theme;
        if let Err(err) = prefs.save(self.prefs_path) {
            warn!("failed to save preferences: {err:#}");
            println!("{}", "Theme changed, but could not be saved.".error_style(theme));
            return;
        }
        println!("{}", format!("Theme set to {theme}.").notice_style(theme));
    }

    fn print_help(&self) {
        println!("{}", "Commands".section_style(self.theme));
        let rows = [
            (":save [n]", "save to slot n, or to the autosave"),
            (":load <n>", "load slot n"),
            (":slots", "list save slots"),
            (":restart", "start the game over"),
            (":theme [name]", "show or set the theme (default, light, dark)"),
            (":quit", "autosave and exit"),
        ];
        for (cmd, what) in rows {
            println!("  {} {what}", format!("{cmd:<14}").command_style(self.theme));
        }
        println!("Anything else is sent to the game.");
    }
}

/// Best-effort shutdown once the session has faulted, so the interpreter is
/// still released before the front-end exits.
fn release_after_fatal<I: Interpreter + 'static>(runtime: &Runtime, handle: &SessionHandle<I>) {
    if let Err(err) = runtime.block_on(handle.shutdown()) {
        warn!("shutdown after fatal error failed: {err}");
    }
}
