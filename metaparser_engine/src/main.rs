#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Metaparser **
//! Terminal front-end for INSTEAD metaparser games

use metaparser_engine::native::NativeInterpreter;
use metaparser_engine::{
    EngineConfig, METAPARSER_VERSION, SaveSlotRegistry, Session, SessionHandle, StorageLayout, run_repl,
};

use anyhow::{Context, Result};
use log::info;
use tokio::sync::mpsc;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Start: metaparser {METAPARSER_VERSION}");

    let config_path = EngineConfig::path_from_env().unwrap_or_else(|| StorageLayout::resolve(None).config_path());
    let config = EngineConfig::load_or_default(&config_path).context("while loading engine config")?;
    let layout = StorageLayout::resolve(config.storage_root.as_deref());
    info!("storage root: {}", layout.root().display());

    // still single threaded here, so the registry can read the local UTC offset
    let registry = SaveSlotRegistry::new(layout.clone(), config.slot_count);
    let prefs_path = layout.preferences_path();

    let (sink, events) = mpsc::unbounded_channel();
    let handle = SessionHandle::spawn(registry, move || {
        Session::from_config(NativeInterpreter::new(), layout, &config, Box::new(sink))
    })
    .context("while starting the interpreter thread")?;

    run_repl(&handle, events, &prefs_path)
}
