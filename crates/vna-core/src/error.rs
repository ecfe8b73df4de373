//! Error types for the measurement core.

use std::time::Duration;

use thiserror::Error;

use crate::constants::{POINT_COUNT, RAW_SCAN_MAX_COUNT, SAVEAREA_MAX};

/// Rejected configuration changes. Engine state is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid frequency range: start {start} Hz, stop {stop} Hz")]
    InvalidRange { start: u32, stop: u32 },

    #[error("Sweep point count {0} is outside 1..={POINT_COUNT}")]
    InvalidPointCount(usize),

    #[error("Save slot {0} is outside 0..{SAVEAREA_MAX}")]
    InvalidSlot(usize),

    #[error("{what} index {index} is out of range")]
    InvalidIndex { what: &'static str, index: usize },

    #[error("Raw scan count {0} is outside 1..={RAW_SCAN_MAX_COUNT}")]
    InvalidScanCount(usize),

    #[error("Average count {0} is outside 1..=1000")]
    InvalidAverage(u16),

    #[error("Invalid configuration: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("No valid calibration is saved in slot {0}")]
    SlotNotFound(usize),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Errors reading or writing a saved properties record.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad magic number: expected {expected:#010x}, got {got:#010x}")]
    BadMagic { expected: u32, got: u32 },

    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Record is {got} bytes, expected {expected}")]
    Length { expected: usize, got: usize },

    #[error("Invalid value {value} for field '{field}'")]
    InvalidField { field: &'static str, value: i64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeasurementError {
    #[error("Sweep index {index} is outside the measurement buffer ({POINT_COUNT} points)")]
    IndexOutOfRange { index: usize },

    #[error("Error correction was already applied to sweep point {0}")]
    AlreadyCorrected(usize),
}

/// Failures reported by a hardware backend.
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("Detection did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Hardware backend failure: {0}")]
    Backend(String),
}
