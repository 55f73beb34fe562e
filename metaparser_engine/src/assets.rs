//! Installing the bundled game into the storage root.
//!
//! The game scripts (`game/`), the interpreter library (`stead/`) and the
//! metaparser module ship with the application. They are copied into the
//! storage root whenever the engine version changes, or on every launch when a
//! refresh is forced. Without them the game cannot start, so any failure here is
//! fatal for the session.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use walkdir::WalkDir;

use crate::METAPARSER_VERSION;
use crate::error::EngineError;
use crate::preferences::Preferences;
use crate::storage::{GAME_DIR, STEAD_DIR, StorageLayout};

pub const METAPARSER_MODULE: &str = "metaparser.lua";

/// A directory laid out like the storage root's asset part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundle {
    source: PathBuf,
}

impl AssetBundle {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self { source: source.into() }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Copy the bundle into `layout` unless `prefs` shows it is already current.
    ///
    /// Returns whether anything was copied. On success the installed version is
    /// recorded in `prefs` and written to the layout's preferences file.
    ///
    /// # Errors
    /// [`EngineError::Assets`] with the underlying IO message.
    pub fn install(&self, layout: &StorageLayout, prefs: &mut Preferences, force: bool) -> Result<bool, EngineError> {
        let current = prefs.app_version.as_deref() == Some(METAPARSER_VERSION);
        if current && !force {
            info!("assets already installed for v{METAPARSER_VERSION}");
            return Ok(false);
        }

        info!("installing assets from {}", self.source.display());
        self.copy_all(layout)
            .map_err(|err| EngineError::Assets(format!("Copy error: {err}")))?;

        prefs.app_version = Some(METAPARSER_VERSION.to_string());
        prefs
            .save(&layout.preferences_path())
            .map_err(|err| EngineError::Assets(format!("Copy error: {err:#}")))?;
        Ok(true)
    }

    fn copy_all(&self, layout: &StorageLayout) -> io::Result<()> {
        fs::create_dir_all(layout.root())?;

        replace_dir(&self.source.join(STEAD_DIR), &layout.stead_dir())?;
        replace_dir(&self.source.join(GAME_DIR), &layout.game_dir())?;

        let module = self.source.join(METAPARSER_MODULE);
        fs::copy(&module, layout.stead_dir().join(METAPARSER_MODULE))
            .map_err(|err| io::Error::new(err.kind(), format!("{}: {err}", module.display())))?;
        Ok(())
    }
}

/// Remove `to` and copy the tree at `from` in its place.
fn replace_dir(from: &Path, to: &Path) -> io::Result<()> {
    if !from.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("assets not found: {}", from.display()),
        ));
    }
    if to.exists() {
        fs::remove_dir_all(to)?;
    }

    for entry in WalkDir::new(from) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
