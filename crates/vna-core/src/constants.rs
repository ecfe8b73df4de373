//! Instrument constants
//!
//! Sweep table dimensions, frequency limits and calibration model parameters
//! shared by every module of the measurement core.

/// Capacity of the sweep table. Every per-point array is sized to this.
pub const POINT_COUNT: usize = 101;

/// Inverse FFT length used by the time-domain transform.
pub const FFT_SIZE: usize = 256;

/// Lowest frequency the RF source can be programmed to (Hz).
pub const START_MIN: u32 = 10_000;

/// Highest frequency the RF source can be programmed to (Hz).
pub const STOP_MAX: u32 = 1_500_000_000;

/// Number of calibration save slots.
pub const SAVEAREA_MAX: usize = 5;

/// Number of calibration standards / error terms per frequency point.
pub const CAL_TERMS: usize = 5;

/// Number of display traces.
pub const TRACE_COUNT: usize = 4;

/// Number of markers.
pub const MARKER_COUNT: usize = 4;

/// Magic number of a saved properties record ('CONF').
pub const PROPERTIES_MAGIC: u32 = 0x434f_4e45;

/// Default threshold above which the source runs on a harmonic (Hz).
pub const DEFAULT_HARMONIC_THRESHOLD: u32 = 300_000_000;

/// Fringing capacitance of the open standard (F).
pub const OPEN_FRINGE_CAPACITANCE: f32 = 50e-15;

/// Reference impedance (ohm).
pub const Z0: f32 = 50.0;

/// Shortest settling delay applied to a sweep point (ms).
pub const SETTLE_MIN_MS: u32 = 3;

/// Longest settling delay applied to a sweep point (ms).
pub const SETTLE_MAX_MS: u32 = 8;

/// Extra settling added when the front-end gain bank changes (ms).
pub const GAIN_SWITCH_DELAY_MS: u32 = 10;

/// Kaiser beta of the minimum window (rectangular).
pub const KAISER_BETA_MINIMUM: f32 = 0.0;

/// Kaiser beta of the normal window.
pub const KAISER_BETA_NORMAL: f32 = 6.0;

/// Kaiser beta of the maximum window.
pub const KAISER_BETA_MAXIMUM: f32 = 13.0;

/// Most frequencies a single raw scan may visit.
pub const RAW_SCAN_MAX_COUNT: usize = u16::MAX as usize;

/// Relative convergence limit for the I0 power series.
pub const BESSEL_EPS: f32 = 1e-4;
