//! Calibration module - standards, error terms and correction
//!
//! Raw standard measurements (load, open, short, thru, isolation) are
//! collected from the measurement buffer, then reduced to five error terms
//! per frequency point (directivity, source match, reflection tracking,
//! transmission tracking, isolation) which correct every subsequent sweep.
//!
//! Raw standards and error terms are held separately. `CalStatus` records
//! which raw standards are still pending derivation; `done` consumes them.

mod correction;
mod interpolation;
mod terms;

use log::{debug, info};
use num_complex::Complex32;

use crate::error::MeasurementError;
use crate::frequency::FrequencySet;
use crate::measurement::{Channel, Measurement};

pub use correction::correct_point;
pub use interpolation::{brackets, Bracket};
pub use terms::{open_model_inverse, ErrorTerms, RawStandards};

/// Calibration standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalStandard {
    Load = 0,
    Open = 1,
    Short = 2,
    Thru = 3,
    Isoln = 4,
}

impl CalStandard {
    pub const ALL: [CalStandard; 5] = [
        CalStandard::Load,
        CalStandard::Open,
        CalStandard::Short,
        CalStandard::Thru,
        CalStandard::Isoln,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Channel the standard is measured on
    pub fn channel(self) -> Channel {
        match self {
            CalStandard::Load | CalStandard::Open | CalStandard::Short => Channel::Reflection,
            CalStandard::Thru | CalStandard::Isoln => Channel::Transmission,
        }
    }

    /// Status bit set when the standard is collected
    pub fn status_bit(self) -> CalStatus {
        match self {
            CalStandard::Load => CalStatus::LOAD,
            CalStandard::Open => CalStatus::OPEN,
            CalStandard::Short => CalStatus::SHORT,
            CalStandard::Thru => CalStatus::THRU,
            CalStandard::Isoln => CalStatus::ISOLN,
        }
    }
}

/// Error term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorTerm {
    /// Directivity
    Ed = 0,
    /// Source match
    Es = 1,
    /// Reflection tracking
    Er = 2,
    /// Transmission tracking, stored inverted
    Et = 3,
    /// Isolation
    Ex = 4,
}

impl ErrorTerm {
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Calibration status bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CalStatus(u16);

impl CalStatus {
    pub const LOAD: CalStatus = CalStatus(1 << 0);
    pub const OPEN: CalStatus = CalStatus(1 << 1);
    pub const SHORT: CalStatus = CalStatus(1 << 2);
    pub const THRU: CalStatus = CalStatus(1 << 3);
    pub const ISOLN: CalStatus = CalStatus(1 << 4);
    pub const ES: CalStatus = CalStatus(1 << 5);
    pub const ER: CalStatus = CalStatus(1 << 6);
    pub const ET: CalStatus = CalStatus(1 << 7);
    /// Directivity comes from the load standard
    pub const ED: CalStatus = CalStatus::LOAD;
    /// Isolation comes from the isolation standard
    pub const EX: CalStatus = CalStatus::ISOLN;
    pub const APPLY: CalStatus = CalStatus(1 << 8);
    pub const INTERPOLATED: CalStatus = CalStatus(1 << 9);

    const NAMES: [&'static str; 10] = [
        "load", "open", "short", "thru", "isoln", "Es", "Er", "Et", "cal'ed", "interp",
    ];

    #[inline]
    pub const fn empty() -> Self {
        CalStatus(0)
    }

    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        CalStatus(bits)
    }

    #[inline]
    pub const fn contains(self, other: CalStatus) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: CalStatus) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: CalStatus) {
        self.0 &= !other.0;
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Names of the set flags, in bit order
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .enumerate()
            .filter(|(i, _)| self.0 & (1 << i) != 0)
            .map(|(_, &name)| name)
            .collect()
    }
}

impl std::ops::BitOr for CalStatus {
    type Output = CalStatus;

    fn bitor(self, rhs: CalStatus) -> CalStatus {
        CalStatus(self.0 | rhs.0)
    }
}

impl std::fmt::Display for CalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.names().join(" "))
    }
}

/// Calibration state: pending raw standards, derived error terms and status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStore {
    status: CalStatus,
    raw: RawStandards,
    terms: ErrorTerms,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from saved state
    pub fn from_parts(status: CalStatus, raw: RawStandards, terms: ErrorTerms) -> Self {
        Self { status, raw, terms }
    }

    #[inline]
    pub fn status(&self) -> CalStatus {
        self.status
    }

    #[inline]
    pub fn raw(&self) -> &RawStandards {
        &self.raw
    }

    #[inline]
    pub fn terms(&self) -> &ErrorTerms {
        &self.terms
    }

    /// Whether correction is applied during the sweep
    #[inline]
    pub fn is_applied(&self) -> bool {
        self.status.contains(CalStatus::APPLY)
    }

    /// Copy the current measurement of `standard` into raw storage.
    ///
    /// Collecting open or short invalidates the derived source match and
    /// reflection tracking and stops correction until `done` runs again.
    pub fn collect(&mut self, standard: CalStandard, measured: &Measurement) {
        self.raw
            .set(standard, measured.channel(standard.channel()));
        self.status.insert(standard.status_bit());
        match standard {
            CalStandard::Open => self.status.remove(CalStatus::ES | CalStatus::APPLY),
            CalStandard::Short => self.status.remove(CalStatus::ER | CalStatus::APPLY),
            _ => {}
        }
        debug!("Collected {:?} standard, status now [{}]", standard, self.status);
    }

    /// Derive error terms from the collected standards and enable correction
    pub fn done(&mut self, frequencies: &FrequencySet) {
        self.terms = ErrorTerms::derive_from(&self.raw, &mut self.status, frequencies);
        self.status.insert(CalStatus::APPLY);
        info!("Calibration done, status [{}]", self.status);
    }

    /// Correct sweep point `index` of `measured` in place
    #[inline]
    pub fn apply_at(
        &self,
        index: usize,
        measured: &mut Measurement,
    ) -> Result<(), MeasurementError> {
        self.terms.apply_at(index, measured)
    }

    /// Manual override of the apply flag
    pub fn set_correction(&mut self, on: bool) {
        if on {
            self.status.insert(CalStatus::APPLY);
        } else {
            self.status.remove(CalStatus::APPLY);
        }
    }

    /// Drop all calibration status; stored arrays are left as they are
    pub fn reset(&mut self) {
        self.status = CalStatus::empty();
    }

    /// Replace error terms and raw standards with values remapped from
    /// another frequency grid.
    ///
    /// `source_status` is merged into the current status, and the result is
    /// marked applied and interpolated.
    pub fn interpolate_from(
        &mut self,
        source_status: CalStatus,
        source_frequencies: &FrequencySet,
        source_raw: &RawStandards,
        source_terms: &ErrorTerms,
        frequencies: &FrequencySet,
        harmonic_threshold: u32,
    ) {
        let brackets = brackets(source_frequencies.f(), frequencies.f(), harmonic_threshold);
        let source_points = source_frequencies.points();
        self.terms.remap_from(source_terms, source_points, &brackets);
        self.raw.remap_from(source_raw, source_points, &brackets);
        self.status
            .insert(source_status | CalStatus::APPLY | CalStatus::INTERPOLATED);
        debug!(
            "Interpolated calibration from {} source points onto {} points",
            source_frequencies.points(),
            frequencies.points()
        );
    }

    /// Value of a raw standard at one point
    #[inline]
    pub fn raw_at(&self, standard: CalStandard, index: usize) -> Complex32 {
        self.raw.get(standard, index)
    }
}
