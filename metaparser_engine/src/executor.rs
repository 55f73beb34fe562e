//! Single-worker executor for the session.
//!
//! The interpreter is neither reentrant nor thread-safe, so one dedicated
//! thread owns the [`Session`] and runs every interpreter call. Callers hold a
//! cheap [`SessionHandle`]; each method queues a job and suspends until the
//! worker has run it. Jobs run strictly in submission order and always to
//! completion: there is no cancellation and no timeout.
//!
//! Slot listing is the one operation that does not go through the queue. It
//! only reads file metadata and is kept apart from slot writes by the shared
//! [`crate::storage::SlotLock`].

use std::collections::BTreeMap;
use std::io;
use std::thread;

use log::debug;
use tokio::sync::{mpsc, oneshot};

use crate::error::EngineError;
use crate::interpreter::Interpreter;
use crate::session::{Session, SessionState, TurnOutcome};
use crate::slots::SaveSlotRegistry;
use crate::transcript::Transcript;

type Job<I> = Box<dyn FnOnce(&mut Session<I>) + Send>;

pub const WORKER_THREAD_NAME: &str = "interpreter";

pub struct SessionHandle<I: Interpreter + 'static> {
    jobs: mpsc::UnboundedSender<Job<I>>,
    registry: SaveSlotRegistry,
}

impl<I: Interpreter + 'static> Clone for SessionHandle<I> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<I: Interpreter + 'static> SessionHandle<I> {
    /// Start the worker thread and build the session on it with `factory`.
    ///
    /// Building on the worker means the interpreter never crosses threads and
    /// need not be `Send`. The worker exits once every handle is dropped and
    /// the queue is empty.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn<F>(registry: SaveSlotRegistry, factory: F) -> io::Result<Self>
    where
        F: FnOnce() -> Session<I> + Send + 'static,
    {
        let (jobs, mut queue) = mpsc::unbounded_channel::<Job<I>>();
        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let mut session = factory();
                while let Some(job) = queue.blocking_recv() {
                    job(&mut session);
                }
                debug!("interpreter worker exiting");
            })?;
        Ok(Self { jobs, registry })
    }

    /// Queue `job` and wait for its result.
    async fn call<T, F>(&self, job: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session<I>) -> T + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.jobs
            .send(Box::new(move |session| {
                // the caller may have stopped waiting; the job still ran
                let _ = reply.send(job(session));
            }))
            .map_err(|_| EngineError::WorkerGone)?;
        result.await.map_err(|_| EngineError::WorkerGone)
    }

    /// See [`Session::launch`].
    ///
    /// # Errors
    /// As [`Session::launch`], or [`EngineError::WorkerGone`].
    pub async fn launch(&self) -> Result<(), EngineError> {
        self.call(Session::launch).await?
    }

    /// See [`Session::process_input`].
    ///
    /// # Errors
    /// As [`Session::process_input`], or [`EngineError::WorkerGone`].
    pub async fn process_input(&self, text: impl Into<String>) -> Result<TurnOutcome, EngineError> {
        let text = text.into();
        self.call(move |session| session.process_input(&text)).await?
    }

    /// See [`Session::restart`].
    ///
    /// # Errors
    /// As [`Session::restart`], or [`EngineError::WorkerGone`].
    pub async fn restart(&self) -> Result<(), EngineError> {
        self.call(Session::restart).await?
    }

    /// See [`Session::save`].
    ///
    /// # Errors
    /// As [`Session::save`], or [`EngineError::WorkerGone`].
    pub async fn save(&self, slot: Option<String>) -> Result<(), EngineError> {
        self.call(move |session| session.save(slot.as_deref())).await?
    }

    /// See [`Session::load_state`].
    ///
    /// # Errors
    /// As [`Session::load_state`], or [`EngineError::WorkerGone`].
    pub async fn load_state(&self, name: impl Into<String>) -> Result<(), EngineError> {
        let name = name.into();
        self.call(move |session| session.load_state(&name)).await?
    }

    /// Queue a shutdown behind any in-flight work and wait for it.
    ///
    /// # Errors
    /// [`EngineError::WorkerGone`] if the worker already stopped.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.call(Session::shutdown).await
    }

    /// # Errors
    /// [`EngineError::WorkerGone`] if the worker already stopped.
    pub async fn state(&self) -> Result<SessionState, EngineError> {
        self.call(|session| session.state().clone()).await
    }

    /// Snapshot of the transcript.
    ///
    /// # Errors
    /// [`EngineError::WorkerGone`] if the worker already stopped.
    pub async fn transcript(&self) -> Result<Transcript, EngineError> {
        self.call(|session| session.transcript().clone()).await
    }

    /// Slot number to save time, read directly from the storage root.
    pub fn list_slots(&self) -> BTreeMap<u8, Option<String>> {
        self.registry.list_slots()
    }

    pub fn registry(&self) -> &SaveSlotRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::interpreter::{Call, ScriptedInterpreter};
    use crate::storage::StorageLayout;
    use anyhow::Result;
    use std::time::Duration;
    use tempfile::tempdir;
    use time::UtcOffset;

    fn spawn(root: &std::path::Path, script: &ScriptedInterpreter) -> Result<SessionHandle<ScriptedInterpreter>> {
        let layout = StorageLayout::new(root);
        let registry = SaveSlotRegistry::with_offset(layout.clone(), 3, UtcOffset::UTC);
        let script = script.clone();
        Ok(SessionHandle::spawn(registry, move || {
            Session::new(script, layout, Box::new(NullSink))
        })?)
    }

    #[tokio::test]
    async fn concurrent_inputs_never_interleave() -> Result<()> {
        let dir = tempdir()?;
        let script = ScriptedInterpreter::new();
        let handle = spawn(dir.path(), &script)?;
        handle.launch().await?;
        script.set_delay(Duration::from_millis(20));

        let other = handle.clone();
        let (first, second) = tokio::join!(handle.process_input("one"), other.process_input("two"));
        assert_eq!(first?, TurnOutcome::Response);
        assert_eq!(second?, TurnOutcome::Response);
        assert_eq!(script.max_in_flight(), 1);

        let calls = script.calls();
        let one = calls
            .iter()
            .position(|c| *c == Call::Command("@metaparser \"one\"".into()))
            .unwrap_or(usize::MAX);
        let two = calls
            .iter()
            .position(|c| *c == Call::Command("@metaparser \"two\"".into()))
            .unwrap_or(usize::MAX);
        assert!(one < two);
        // the first turn, including its signal queries, finished before the second began
        assert_eq!(
            &calls[one + 1..two],
            &[Call::QueryRestart, Call::QuerySave, Call::QueryLoad]
        );
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_waits_behind_queued_input() -> Result<()> {
        let dir = tempdir()?;
        let script = ScriptedInterpreter::new();
        let handle = spawn(dir.path(), &script)?;
        handle.launch().await?;
        script.set_delay(Duration::from_millis(10));

        let (turn, shutdown) = tokio::join!(handle.process_input("wait"), handle.shutdown());
        turn?;
        shutdown?;
        let commands = script.commands();
        assert_eq!(
            &commands[commands.len() - 2..],
            &["@metaparser \"wait\"", "save ../autosave"]
        );
        assert_eq!(script.calls().last(), Some(&Call::Done));
        assert_eq!(handle.state().await?, SessionState::Uninitialized);
        Ok(())
    }

    #[tokio::test]
    async fn named_save_shows_up_in_slot_listing() -> Result<()> {
        let dir = tempdir()?;
        let script = ScriptedInterpreter::new();
        let handle = spawn(dir.path(), &script)?;
        assert!(handle.list_slots().values().all(Option::is_none));

        handle.launch().await?;
        handle.save(Some("2.sav".into())).await?;
        let slots = handle.list_slots();
        assert!(slots[&1].is_none());
        assert!(slots[&2].is_some());
        assert!(slots[&3].is_none());
        Ok(())
    }

    #[tokio::test]
    async fn transcript_snapshot_reflects_turns() -> Result<()> {
        let dir = tempdir()?;
        let script = ScriptedInterpreter::new();
        let handle = spawn(dir.path(), &script)?;
        handle.launch().await?;
        handle.process_input("inventory").await?;
        let transcript = handle.transcript().await?;
        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript.last().map(|e| e.command.as_str()),
            Some("> inventory")
        );
        Ok(())
    }
}
