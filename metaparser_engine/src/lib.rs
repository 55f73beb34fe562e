#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub const METAPARSER_VERSION: &str = env!("CARGO_PKG_VERSION");

// Interpreter boundary
pub mod channel;
pub mod interpreter;
#[cfg(feature = "native")]
pub mod native;

// Session layer
pub mod error;
pub mod events;
pub mod executor;
pub mod session;
pub mod transcript;

// Storage
pub mod assets;
pub mod config;
pub mod preferences;
pub mod slots;
pub mod storage;

// Presentation
pub mod markup;
pub mod repl;
pub mod style;
pub mod theme;

// Re-exports for convenience
pub use config::EngineConfig;
pub use error::EngineError;
pub use events::{EventSink, Notice, SessionEvent};
pub use executor::SessionHandle;
pub use interpreter::{Interpreter, ScriptedInterpreter};
pub use markup::{StyledText, parse};
pub use repl::run_repl;
pub use session::{Session, SessionState, TurnOutcome};
pub use slots::SaveSlotRegistry;
pub use storage::StorageLayout;
