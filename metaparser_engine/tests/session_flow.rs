use std::fs;
use std::path::Path;

use anyhow::Result;
use metaparser_engine as mp;
use mp::config::CommandErrorPolicy;
use mp::events::NullSink;
use mp::interpreter::{Call, Signals};
use mp::*;
use tempfile::tempdir;
use time::UtcOffset;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

fn drain(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn write_bundle(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir.join("game"))?;
    fs::create_dir_all(dir.join("stead"))?;
    fs::write(dir.join("game/main3.lua"), "-- game")?;
    fs::write(dir.join("stead/stead.lua"), "-- stead")?;
    fs::write(dir.join("metaparser.lua"), "-- mp")?;
    Ok(())
}

#[test]
fn test_full_session_lifecycle() -> Result<()> {
    let root = tempdir()?;
    let script = ScriptedInterpreter::new();
    script.respond("look", "<center><b>Cellar</b></center>\nIt is damp.");
    let (sink, mut events) = unbounded_channel();
    let mut session = Session::new(script.clone(), StorageLayout::new(root.path()), Box::new(sink));

    session.launch()?;
    let opening = drain(&mut events);
    assert!(matches!(&opening[..], [SessionEvent::EntryAppended(entry)] if entry.response.as_str() == "Cellar\nIt is damp."));

    session.process_input("north")?;
    session.save(Some("1.sav"))?;
    session.shutdown();
    assert!(session.layout().autosave_path().is_file());
    assert!(session.layout().slot_path(1).is_file());

    // a fresh launch resumes from the autosave
    session.launch()?;
    assert_eq!(script.commands().last().map(String::as_str), Some("load ../autosave"));
    Ok(())
}

#[test]
fn test_configured_assets_are_installed_before_init() -> Result<()> {
    let bundle = tempdir()?;
    let root = tempdir()?;
    write_bundle(bundle.path())?;
    let config = EngineConfig::from_toml(&format!(
        "asset_source = {:?}\nforce_asset_refresh = false\n",
        bundle.path().display().to_string()
    ))?;

    let (sink, mut events) = unbounded_channel();
    let layout = StorageLayout::new(root.path());
    let mut session = Session::from_config(ScriptedInterpreter::new(), layout.clone(), &config, Box::new(sink));
    session.launch()?;

    assert!(layout.game_dir().join("main3.lua").is_file());
    let events = drain(&mut events);
    assert_eq!(events[..2], [SessionEvent::Progress(true), SessionEvent::Progress(false)]);
    let prefs = mp::preferences::Preferences::load(&layout.preferences_path());
    assert_eq!(prefs.app_version.as_deref(), Some(METAPARSER_VERSION));
    Ok(())
}

#[test]
fn test_missing_assets_fault_the_session() -> Result<()> {
    let root = tempdir()?;
    let config = EngineConfig {
        asset_source: Some(root.path().join("nowhere")),
        ..EngineConfig::default()
    };
    let script = ScriptedInterpreter::new();
    let mut session = Session::from_config(script.clone(), StorageLayout::new(root.path()), &config, Box::new(NullSink));

    let err = session.launch().unwrap_err();
    assert!(matches!(err, EngineError::Assets(_)));
    assert!(matches!(session.state(), SessionState::Faulted(_)));
    assert!(script.calls().is_empty());
    Ok(())
}

#[test]
fn test_fatal_command_policy_from_config() -> Result<()> {
    let root = tempdir()?;
    let config = EngineConfig::from_toml("command_errors = \"fatal\"")?;
    assert_eq!(config.command_errors, CommandErrorPolicy::Fatal);

    let script = ScriptedInterpreter::new();
    script.fail("@metaparser \"jump\"", "stack overflow");
    let mut session = Session::from_config(script, StorageLayout::new(root.path()), &config, Box::new(NullSink));
    session.launch()?;
    assert!(session.process_input("jump").is_err());
    assert_eq!(session.state(), &SessionState::Faulted("stack overflow".into()));
    Ok(())
}

#[tokio::test]
async fn test_game_driven_save_then_load_through_handle() -> Result<()> {
    let root = tempdir()?;
    let layout = StorageLayout::new(root.path());
    let registry = SaveSlotRegistry::with_offset(layout.clone(), 3, UtcOffset::UTC);
    let script = ScriptedInterpreter::new();
    let (sink, mut events) = unbounded_channel();

    let handle = SessionHandle::spawn(registry, {
        let script = script.clone();
        move || Session::new(script, layout, Box::new(sink))
    })?;
    handle.launch().await?;

    script.signal_next_turn(Signals {
        save: true,
        ..Signals::default()
    });
    assert_eq!(handle.process_input("save").await?, TurnOutcome::SaveRequested);
    assert!(drain(&mut events).contains(&SessionEvent::ShowSaveMenu));

    handle.save(Some("3.sav".into())).await?;
    assert_eq!(handle.registry().occupied(), vec![3]);

    script.signal_next_turn(Signals {
        load: true,
        ..Signals::default()
    });
    assert_eq!(handle.process_input("load").await?, TurnOutcome::LoadRequested);
    handle.load_state("3.sav").await?;

    let events = drain(&mut events);
    assert!(events.contains(&SessionEvent::ShowLoadMenu));
    assert!(events.contains(&SessionEvent::Notice(Notice::GameLoaded)));
    assert_eq!(handle.transcript().await?.len(), 1);
    assert!(script.calls().contains(&Call::Done));

    handle.shutdown().await?;
    assert_eq!(handle.state().await?, SessionState::Uninitialized);
    Ok(())
}

#[tokio::test]
async fn test_dropped_worker_reports_worker_gone() -> Result<()> {
    let root = tempdir()?;
    let layout = StorageLayout::new(root.path());
    let registry = SaveSlotRegistry::with_offset(layout.clone(), 3, UtcOffset::UTC);
    let handle = SessionHandle::spawn(registry, move || -> Session<ScriptedInterpreter> {
        panic!("factory failed for {}", layout.root().display())
    })?;
    assert_eq!(handle.launch().await, Err(EngineError::WorkerGone));
    Ok(())
}
