//! Failures surfaced by the session layer.

use thiserror::Error;

use crate::session::SessionState;

/// Everything that can go wrong while talking to the interpreter.
///
/// Variants carrying interpreter text keep it verbatim; it is the only
/// diagnostic the native layer gives us.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("instead_extension() return code: {code}")]
    Extension { code: i32 },
    #[error("instead_init() return code: {code}")]
    Init { code: i32 },
    #[error("{0}")]
    Load(String),
    #[error("{0}")]
    Command(String),
    #[error("{0}")]
    Assets(String),
    #[error("invalid save slot name '{0}'")]
    InvalidSlot(String),
    #[error("session is not ready (state: {0})")]
    NotReady(SessionState),
    #[error("{0}")]
    Faulted(String),
    #[error("interpreter worker has stopped")]
    WorkerGone,
}

impl EngineError {
    /// Fatal errors end the session; the front-end should show them and stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Extension { .. }
                | EngineError::Init { .. }
                | EngineError::Load(_)
                | EngineError::Assets(_)
                | EngineError::Faulted(_)
        )
    }
}
