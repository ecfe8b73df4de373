//! Calibration slot persistence
//!
//! A slot holds one encoded [`SavedProperties`] record. Stores only move
//! bytes; validation happens in [`SavedProperties::decode`], so a record is
//! never handed out unless its magic and checksum are correct.

mod record;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;

use crate::constants::SAVEAREA_MAX;
use crate::error::PersistError;

pub use record::{checksum, SavedProperties, RECORD_LEN};

/// Storage for the calibration save slots `0..SAVEAREA_MAX`
pub trait SlotStore: Send {
    /// Write `props` into `slot`, replacing any previous record
    fn save(&mut self, slot: usize, props: &SavedProperties) -> Result<(), PersistError>;

    /// Read back `slot`. `Ok(None)` means the slot is empty.
    fn load(&self, slot: usize) -> Result<Option<SavedProperties>, PersistError>;
}

fn check_slot(slot: usize) -> Result<(), PersistError> {
    if slot >= SAVEAREA_MAX {
        return Err(PersistError::InvalidField {
            field: "slot",
            value: slot as i64,
        });
    }
    Ok(())
}

/// Encoded records kept in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySlots {
    records: [Option<Vec<u8>>; SAVEAREA_MAX],
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes stored in a slot
    pub fn record(&self, slot: usize) -> Option<&[u8]> {
        self.records.get(slot)?.as_deref()
    }
}

impl SlotStore for MemorySlots {
    fn save(&mut self, slot: usize, props: &SavedProperties) -> Result<(), PersistError> {
        check_slot(slot)?;
        self.records[slot] = Some(props.encode()?);
        Ok(())
    }

    fn load(&self, slot: usize) -> Result<Option<SavedProperties>, PersistError> {
        check_slot(slot)?;
        self.records[slot]
            .as_deref()
            .map(SavedProperties::decode)
            .transpose()
    }
}

/// One record file per slot in a directory
#[derive(Debug, Clone)]
pub struct FileSlots {
    dir: PathBuf,
}

impl FileSlots {
    /// Use `dir` for slot files, creating it if needed
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self, PersistError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self, slot: usize) -> PathBuf {
        self.dir.join(format!("slot{slot}.cal"))
    }
}

impl SlotStore for FileSlots {
    fn save(&mut self, slot: usize, props: &SavedProperties) -> Result<(), PersistError> {
        check_slot(slot)?;
        let bytes = props.encode()?;
        let path = self.path(slot);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn load(&self, slot: usize) -> Result<Option<SavedProperties>, PersistError> {
        check_slot(slot)?;
        let path = self.path(slot);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        SavedProperties::decode(&bytes).map(Some)
    }
}
