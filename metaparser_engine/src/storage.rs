//! On-disk layout of the session's storage root.
//!
//! ```text
//! <root>/
//!   autosave            autosave slot, written by the interpreter
//!   1.sav .. N.sav      numbered save slots
//!   game/               game scripts (interpreter working directory)
//!   stead/              interpreter library assets
//!   preferences.toml
//!   metaparser.toml     optional configuration
//! ```
//!
//! The interpreter runs inside `game/`, so save targets it is given are
//! addressed one level up (`../autosave`, `../2.sav`). File names here must not
//! change: existing installs depend on them.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const GAME_DIR: &str = "game";
pub const STEAD_DIR: &str = "stead";
pub const AUTOSAVE: &str = "autosave";
pub const SLOT_EXTENSION: &str = "sav";
pub const PREFERENCES_FILE: &str = "preferences.toml";
pub const CONFIG_FILE: &str = "metaparser.toml";

/// Environment variable overriding the storage root.
pub const HOME_ENV: &str = "METAPARSER_HOME";

/// Prefix that takes an interpreter path from `game/` back to the storage root.
const PARENT_ESCAPE: &str = "../";

/// Guards slot files against a registry read racing a slot write.
#[derive(Debug, Clone, Default)]
pub struct SlotLock(Arc<RwLock<()>>);

impl SlotLock {
    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Paths inside the storage root. Clones share one [`SlotLock`].
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    slots: SlotLock,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            slots: SlotLock::default(),
        }
    }

    /// Layout rooted at the explicit path if given, otherwise at [`detect_storage_root`].
    pub fn resolve(explicit: Option<&Path>) -> Self {
        Self::new(explicit.map_or_else(detect_storage_root, Path::to_path_buf))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn game_dir(&self) -> PathBuf {
        self.root.join(GAME_DIR)
    }

    pub fn stead_dir(&self) -> PathBuf {
        self.root.join(STEAD_DIR)
    }

    pub fn autosave_path(&self) -> PathBuf {
        self.root.join(AUTOSAVE)
    }

    pub fn slot_path(&self, slot: u8) -> PathBuf {
        self.root.join(slot_file_name(slot))
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.root.join(PREFERENCES_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn slot_lock(&self) -> SlotLock {
        self.slots.clone()
    }
}

/// File name of a numbered slot, e.g. `2.sav`.
pub fn slot_file_name(slot: u8) -> String {
    format!("{slot}.{SLOT_EXTENSION}")
}

/// Interpreter-relative path of a file in the storage root.
pub fn interpreter_target(name: &str) -> String {
    format!("{PARENT_ESCAPE}{name}")
}

/// Pick the storage root: `$METAPARSER_HOME`, then the platform data directory,
/// then a directory next to the current working directory.
pub fn detect_storage_root() -> PathBuf {
    if let Some(home) = env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::data_dir()
        .or_else(dirs::data_local_dir)
        .map_or_else(|| PathBuf::from("metaparser-data"), |base| base.join("metaparser"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_follow_fixed_names() {
        let layout = StorageLayout::new("/data/mp");
        assert_eq!(layout.game_dir(), PathBuf::from("/data/mp/game"));
        assert_eq!(layout.stead_dir(), PathBuf::from("/data/mp/stead"));
        assert_eq!(layout.autosave_path(), PathBuf::from("/data/mp/autosave"));
        assert_eq!(layout.slot_path(3), PathBuf::from("/data/mp/3.sav"));
    }

    #[test]
    fn targets_escape_the_game_directory() {
        assert_eq!(interpreter_target(AUTOSAVE), "../autosave");
        assert_eq!(interpreter_target(&slot_file_name(1)), "../1.sav");
    }

    #[test]
    fn explicit_root_wins() {
        let layout = StorageLayout::resolve(Some(Path::new("/tmp/explicit")));
        assert_eq!(layout.root(), Path::new("/tmp/explicit"));
    }

    #[test]
    fn clones_share_the_slot_lock() {
        let layout = StorageLayout::new("/x");
        let other = layout.clone();
        let lock = layout.slot_lock();
        let _write = lock.write();
        assert!(other.slot_lock().0.try_read().is_err());
    }
}
