//! Frequency module - sweep range and frequency table
//!
//! A sweep is described either by its start/stop edges or by a center and a
//! span. The table of programmed frequencies is regenerated from that range
//! whenever the range or the point count changes.

use crate::constants::{POINT_COUNT, START_MIN, STOP_MAX};
use crate::error::ConfigError;

/// Sweep parameter addressed by the frequency setters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepParam {
    Start,
    Stop,
    Center,
    Span,
    /// Continuous wave: center with zero span
    Cw,
}

/// Sweep range representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepRange {
    StartStop { start: u32, stop: u32 },
    CenterSpan { center: u32, span: u32 },
}

impl Default for SweepRange {
    fn default() -> Self {
        SweepRange::StartStop {
            start: 50_000,
            stop: 900_000_000,
        }
    }
}

impl SweepRange {
    /// Get the (start, stop) edges in Hz
    pub fn bounds(&self) -> (u32, u32) {
        match *self {
            SweepRange::StartStop { start, stop } => (start, stop),
            SweepRange::CenterSpan { center, span } => (
                center.saturating_sub(span / 2),
                center.saturating_add(span / 2),
            ),
        }
    }

    #[inline]
    pub fn start(&self) -> u32 {
        self.bounds().0
    }

    #[inline]
    pub fn stop(&self) -> u32 {
        self.bounds().1
    }

    pub fn center(&self) -> u32 {
        match *self {
            SweepRange::StartStop { start, stop } => ((start as u64 + stop as u64) / 2) as u32,
            SweepRange::CenterSpan { center, .. } => center,
        }
    }

    pub fn span(&self) -> u32 {
        match *self {
            SweepRange::StartStop { start, stop } => stop.saturating_sub(start),
            SweepRange::CenterSpan { span, .. } => span,
        }
    }

    /// Convert to the start/stop representation
    pub fn to_start_stop(self) -> Self {
        let (start, stop) = self.bounds();
        SweepRange::StartStop { start, stop }
    }

    /// Convert to the center/span representation
    pub fn to_center_span(self) -> Self {
        SweepRange::CenterSpan {
            center: self.center(),
            span: self.span(),
        }
    }

    /// Encode as the persisted signed pair.
    ///
    /// `frequency1 > 0` holds the stop frequency; otherwise it holds the
    /// negated span and `frequency0` is the center.
    pub fn to_raw(&self) -> (i32, i32) {
        match *self {
            SweepRange::StartStop { start, stop } => (start as i32, stop as i32),
            SweepRange::CenterSpan { center, span } => (center as i32, -(span as i32)),
        }
    }

    /// Decode the persisted signed pair
    pub fn from_raw(frequency0: i32, frequency1: i32) -> Self {
        let f0 = frequency0.max(0) as u32;
        if frequency1 > 0 {
            SweepRange::StartStop {
                start: f0,
                stop: frequency1 as u32,
            }
        } else {
            SweepRange::CenterSpan {
                center: f0,
                span: frequency1.unsigned_abs(),
            }
        }
    }

    /// Apply a setter with the instrument clamping rules.
    ///
    /// Start/stop/center/CW are clamped to `[START_MIN, STOP_MAX]`, the span
    /// to `[0, STOP_MAX - START_MIN]`. Near an edge a center change shrinks
    /// the span, while a span change moves the center.
    pub fn with_param(self, param: SweepParam, hz: u32) -> Self {
        let clamp = |f: u32| f.clamp(START_MIN, STOP_MAX);
        let min = START_MIN as i64;
        let max = STOP_MAX as i64;

        match param {
            SweepParam::Start => {
                let (_, stop) = self.bounds();
                let start = clamp(hz);
                SweepRange::StartStop {
                    start,
                    stop: stop.max(start),
                }
            }
            SweepParam::Stop => {
                let (start, _) = self.bounds();
                let stop = clamp(hz);
                SweepRange::StartStop {
                    start: start.min(stop),
                    stop,
                }
            }
            SweepParam::Center => {
                let center = clamp(hz) as i64;
                let mut span = self.span() as i64;
                if center - span / 2 < min {
                    span = (center - min) * 2;
                }
                if center + span / 2 > max {
                    span = (max - center) * 2;
                }
                SweepRange::CenterSpan {
                    center: center as u32,
                    span: span as u32,
                }
            }
            SweepParam::Span => {
                let span = hz.min(STOP_MAX - START_MIN) as i64;
                let mut center = self.center() as i64;
                if center - span / 2 < min {
                    center = min + span / 2;
                }
                if center + span / 2 > max {
                    center = max - span / 2;
                }
                SweepRange::CenterSpan {
                    center: center as u32,
                    span: span as u32,
                }
            }
            SweepParam::Cw => SweepRange::CenterSpan {
                center: clamp(hz),
                span: 0,
            },
        }
    }

    /// Read any sweep parameter regardless of representation
    pub fn get(&self, param: SweepParam) -> u32 {
        match param {
            SweepParam::Start => self.start(),
            SweepParam::Stop => self.stop(),
            SweepParam::Center | SweepParam::Cw => self.center(),
            SweepParam::Span => self.span(),
        }
    }
}

/// Table of sweep frequencies in Hz.
///
/// Always `POINT_COUNT` entries; entries past the active point count are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySet {
    f: [u32; POINT_COUNT],
    points: usize,
}

impl Default for FrequencySet {
    fn default() -> Self {
        let (start, stop) = SweepRange::default().bounds();
        Self::fill(start, stop, POINT_COUNT)
    }
}

impl FrequencySet {
    /// Generate a linear sweep table
    ///
    /// `f[i] = start + floor(i * (stop - start) / (points - 1))`. A single point
    /// sweep is one entry at `start`.
    ///
    /// # Example
    /// ```
    /// use vna_core::frequency::FrequencySet;
    /// let set = FrequencySet::generate(1_000_000, 2_000_000, 11).unwrap();
    /// assert_eq!(set.f()[10], 2_000_000);
    /// ```
    pub fn generate(start: u32, stop: u32, points: usize) -> Result<Self, ConfigError> {
        if points == 0 || points > POINT_COUNT {
            return Err(ConfigError::InvalidPointCount(points));
        }
        if start > stop || start < START_MIN || stop > STOP_MAX {
            return Err(ConfigError::InvalidRange { start, stop });
        }
        Ok(Self::fill(start, stop, points))
    }

    pub(crate) fn fill(start: u32, stop: u32, points: usize) -> Self {
        let points = points.clamp(1, POINT_COUNT);
        let span = stop.saturating_sub(start) as u64;
        let mut f = [0u32; POINT_COUNT];
        if points == 1 {
            f[0] = start;
        } else {
            let div = (points - 1) as u64;
            for (i, slot) in f.iter_mut().take(points).enumerate() {
                *slot = start + ((i as u64 * span) / div) as u32;
            }
        }
        Self { f, points }
    }

    /// Rebuild a table read back from a saved record
    pub fn from_table(f: [u32; POINT_COUNT], points: usize) -> Self {
        Self {
            f,
            points: points.clamp(1, POINT_COUNT),
        }
    }

    /// Get the active frequencies in Hz
    #[inline]
    pub fn f(&self) -> &[u32] {
        &self.f[..self.points]
    }

    /// Get the whole table including the zeroed tail
    #[inline]
    pub fn table(&self) -> &[u32; POINT_COUNT] {
        &self.f
    }

    #[inline]
    pub fn points(&self) -> usize {
        self.points
    }

    #[inline]
    pub fn start(&self) -> u32 {
        self.f[0]
    }

    #[inline]
    pub fn stop(&self) -> u32 {
        self.f[self.points - 1]
    }
}

/// Whether `f` lies above the harmonic-mode threshold
#[inline]
pub fn is_harmonic_mode(f: u32, threshold: u32) -> bool {
    f > threshold
}

/// Sweep range, point count and the generated frequency table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyPlan {
    range: SweepRange,
    points: usize,
    frequencies: FrequencySet,
}

impl Default for FrequencyPlan {
    fn default() -> Self {
        Self {
            range: SweepRange::default(),
            points: POINT_COUNT,
            frequencies: FrequencySet::default(),
        }
    }
}

impl FrequencyPlan {
    pub fn new(range: SweepRange, points: usize) -> Result<Self, ConfigError> {
        let (start, stop) = range.bounds();
        let frequencies = FrequencySet::generate(start, stop, points)?;
        Ok(Self {
            range,
            points,
            frequencies,
        })
    }

    #[inline]
    pub fn range(&self) -> SweepRange {
        self.range
    }

    #[inline]
    pub fn points(&self) -> usize {
        self.points
    }

    #[inline]
    pub fn frequencies(&self) -> &FrequencySet {
        &self.frequencies
    }

    /// Apply a sweep setter and regenerate the table
    pub fn set(&mut self, param: SweepParam, hz: u32) {
        self.range = self.range.with_param(param, hz);
        self.regenerate();
    }

    #[inline]
    pub fn get(&self, param: SweepParam) -> u32 {
        self.range.get(param)
    }

    pub fn set_points(&mut self, points: usize) -> Result<(), ConfigError> {
        if points == 0 || points > POINT_COUNT {
            return Err(ConfigError::InvalidPointCount(points));
        }
        self.points = points;
        self.regenerate();
        Ok(())
    }

    /// Restore a range without validation (saved records are clamped on use)
    pub fn set_range(&mut self, range: SweepRange, points: usize) {
        self.range = range;
        self.points = points.clamp(1, POINT_COUNT);
        self.regenerate();
    }

    /// Restore a saved range together with the exact table it was swept with
    pub fn restore(&mut self, range: SweepRange, frequencies: FrequencySet) {
        self.range = range;
        self.points = frequencies.points();
        self.frequencies = frequencies;
    }

    /// Regenerate the table from the committed range
    pub fn regenerate(&mut self) {
        let (start, stop) = self.range.bounds();
        self.frequencies = FrequencySet::fill(start, stop.max(start), self.points);
    }

    /// Program an explicit table without touching the committed range.
    ///
    /// Used for one-shot scans; the next `regenerate` restores the range.
    pub fn set_table(&mut self, start: u32, stop: u32, points: usize) -> Result<(), ConfigError> {
        self.frequencies = FrequencySet::generate(start, stop, points)?;
        Ok(())
    }
}
