//! Save-slot discovery.
//!
//! Slots are plain files in the storage root (`1.sav` .. `N.sav`). Their
//! contents belong to the interpreter; this module only looks at whether a slot
//! file exists and when it was last written.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::time::SystemTime;

use log::warn;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::error::EngineError;
use crate::storage::{StorageLayout, slot_file_name};

/// Number of numbered slots offered to the player.
pub const DEFAULT_SLOT_COUNT: u8 = 3;

/// A numbered save slot within the registry's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u8);

impl SlotId {
    /// Validate `number` against a registry of `count` slots.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidSlot`] when `number` is outside `1..=count`.
    pub fn new(number: u8, count: u8) -> Result<Self, EngineError> {
        if (1..=count).contains(&number) {
            Ok(Self(number))
        } else {
            Err(EngineError::InvalidSlot(number.to_string()))
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Slot name as handed to the session, e.g. `2.sav`.
    pub fn file_name(self) -> String {
        slot_file_name(self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reports which slots are occupied and when they were written.
#[derive(Debug, Clone)]
pub struct SaveSlotRegistry {
    layout: StorageLayout,
    count: u8,
    offset: UtcOffset,
}

impl SaveSlotRegistry {
    /// Registry over `count` slots, showing times in the local offset.
    ///
    /// The local offset can only be read reliably while the process is single
    /// threaded, so build the registry early; otherwise times fall back to UTC.
    pub fn new(layout: StorageLayout, count: u8) -> Self {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        Self::with_offset(layout, count, offset)
    }

    pub fn with_offset(layout: StorageLayout, count: u8, offset: UtcOffset) -> Self {
        Self { layout, count, offset }
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    /// Map every slot number to the formatted modification time of its file,
    /// or `None` when the slot is empty.
    pub fn list_slots(&self) -> BTreeMap<u8, Option<String>> {
        let lock = self.layout.slot_lock();
        let _guard = lock.read();
        (1..=self.count).map(|slot| (slot, self.slot_timestamp(slot))).collect()
    }

    /// Slot numbers that currently hold a save.
    pub fn occupied(&self) -> Vec<u8> {
        self.list_slots()
            .into_iter()
            .filter_map(|(slot, stamp)| stamp.map(|_| slot))
            .collect()
    }

    fn slot_timestamp(&self, slot: u8) -> Option<String> {
        let path = self.layout.slot_path(slot);
        let meta = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return None,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("failed to read save slot {slot} ({}): {err}", path.display());
                return None;
            },
        };
        let stamp = meta
            .modified()
            .ok()
            .and_then(|modified| format_timestamp(modified, self.offset));
        if stamp.is_none() {
            warn!("save slot {slot} ({}) has no usable modification time", path.display());
        }
        Some(stamp.unwrap_or_else(|| "unknown".to_string()))
    }
}

/// Format a file time as `dd-mm-yyyy HH:mm` in the given offset.
pub fn format_timestamp(modified: SystemTime, offset: UtcOffset) -> Option<String> {
    let format = format_description!("[day]-[month]-[year] [hour]:[minute]");
    OffsetDateTime::from(modified).to_offset(offset).format(&format).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn empty_root_lists_every_slot_as_absent() -> Result<()> {
        let dir = tempdir()?;
        let registry = SaveSlotRegistry::with_offset(StorageLayout::new(dir.path()), 3, UtcOffset::UTC);
        let slots = registry.list_slots();
        assert_eq!(slots.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(slots.values().all(Option::is_none));
        Ok(())
    }

    #[test]
    fn missing_root_is_not_an_error() {
        let registry = SaveSlotRegistry::with_offset(StorageLayout::new("/nonexistent/mp"), 3, UtcOffset::UTC);
        assert!(registry.occupied().is_empty());
    }

    #[test]
    fn only_written_slots_report_a_timestamp() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("2.sav"), "state")?;
        fs::write(dir.path().join("autosave"), "state")?;
        fs::create_dir(dir.path().join("3.sav"))?;

        let registry = SaveSlotRegistry::with_offset(StorageLayout::new(dir.path()), 3, UtcOffset::UTC);
        let slots = registry.list_slots();
        assert!(slots[&1].is_none());
        assert!(slots[&2].is_some());
        assert!(slots[&3].is_none());
        assert_eq!(registry.occupied(), vec![2]);
        Ok(())
    }

    #[test]
    fn timestamp_uses_day_month_year_format() {
        // 2021-03-04 05:06:07 UTC
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_614_834_367);
        assert_eq!(format_timestamp(when, UtcOffset::UTC).as_deref(), Some("04-03-2021 05:06"));
        let plus_two = UtcOffset::from_hms(2, 0, 0).unwrap();
        assert_eq!(format_timestamp(when, plus_two).as_deref(), Some("04-03-2021 07:06"));
    }

    #[test]
    fn slot_ids_are_range_checked() {
        assert_eq!(SlotId::new(2, 3).map(SlotId::file_name), Ok("2.sav".to_string()));
        assert!(SlotId::new(0, 3).is_err());
        assert!(SlotId::new(4, 3).is_err());
    }
}
