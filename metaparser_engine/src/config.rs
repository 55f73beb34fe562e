//! Engine configuration (`metaparser.toml`).
//!
//! Every key is optional:
//!
//! ```toml
//! storage_root = "/home/me/.local/share/metaparser"
//! slot_count = 3
//! command_errors = "recoverable"   # or "fatal"
//! asset_source = "/usr/share/metaparser"
//! force_asset_refresh = false
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::slots::DEFAULT_SLOT_COUNT;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "METAPARSER_CONFIG";

/// What a failed play command does to the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandErrorPolicy {
    /// Report the error and keep playing.
    #[default]
    Recoverable,
    /// Treat it like a startup failure and fault the session.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage_root: Option<PathBuf>,
    pub slot_count: u8,
    pub command_errors: CommandErrorPolicy,
    /// Directory holding the bundled `game/`, `stead/` and `metaparser.lua`.
    pub asset_source: Option<PathBuf>,
    /// Reinstall assets on every launch, not just after a version change.
    pub force_asset_refresh: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            slot_count: DEFAULT_SLOT_COUNT,
            command_errors: CommandErrorPolicy::default(),
            asset_source: None,
            force_asset_refresh: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    /// Parse a config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid config TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Like [`EngineConfig::load`], but a missing file gives the defaults.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() { Self::load(path) } else { Ok(Self::default()) }
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    /// Returns an error on invalid TOML or a zero `slot_count`.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        anyhow::ensure!(config.slot_count > 0, "slot_count must be at least 1");
        Ok(config)
    }

    /// Config path named by `$METAPARSER_CONFIG`, if set.
    pub fn path_from_env() -> Option<PathBuf> {
        env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()).map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_file_gives_defaults() -> Result<()> {
        let config = EngineConfig::from_toml("")?;
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.slot_count, 3);
        assert_eq!(config.command_errors, CommandErrorPolicy::Recoverable);
        Ok(())
    }

    #[test]
    fn keys_override_defaults() -> Result<()> {
        let config = EngineConfig::from_toml(
            r#"
            storage_root = "/srv/mp"
            slot_count = 5
            command_errors = "fatal"
            force_asset_refresh = false
            "#,
        )?;
        assert_eq!(config.storage_root, Some(PathBuf::from("/srv/mp")));
        assert_eq!(config.slot_count, 5);
        assert_eq!(config.command_errors, CommandErrorPolicy::Fatal);
        assert!(!config.force_asset_refresh);
        Ok(())
    }

    #[test]
    fn zero_slots_is_rejected() {
        assert!(EngineConfig::from_toml("slot_count = 0").is_err());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(EngineConfig::from_toml("command_errors = \"sometimes\"").is_err());
    }

    #[test]
    fn missing_file_is_default_but_broken_file_is_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("metaparser.toml");
        assert_eq!(EngineConfig::load_or_default(&path)?, EngineConfig::default());
        fs::write(&path, "slot_count = \"three\"")?;
        assert!(EngineConfig::load_or_default(&path).is_err());
        Ok(())
    }
}
