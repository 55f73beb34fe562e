//! Player preferences persisted next to the save files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::theme::Theme;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    /// Engine version whose game assets were last installed.
    pub app_version: Option<String>,
}

impl Preferences {
    /// Read preferences from `path`.
    ///
    /// A missing file yields defaults. So does a malformed one, after a warning.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!("failed to read preferences {}: {err}", path.display());
                return Self::default();
            },
        };
        toml::from_str(&raw).unwrap_or_else(|err| {
            warn!("ignoring malformed preferences {}: {err}", path.display());
            Self::default()
        })
    }

    /// Write preferences to `path`, creating its directory if needed.
    ///
    /// # Errors
    /// Returns an error if serialization or any filesystem step fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("serializing preferences")?;
        fs::write(path, raw).with_context(|| format!("writing preferences {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(Preferences::load(&dir.path().join("nope.toml")), Preferences::default());
        Ok(())
    }

    #[test]
    fn saved_preferences_load_back() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested/preferences.toml");
        let prefs = Preferences {
            theme: Theme::Dark,
            app_version: Some("0.12.0".into()),
        };
        prefs.save(&path)?;
        assert_eq!(Preferences::load(&path), prefs);
        Ok(())
    }

    #[test]
    fn malformed_file_gives_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("preferences.toml");
        fs::write(&path, "theme = 12")?;
        assert_eq!(Preferences::load(&path), Preferences::default());
        Ok(())
    }
}
