//! vna-core: Measurement core of a two-port vector network analyzer
//!
//! Drives a swept-frequency measurement over a reflection and a transmission
//! receiver, corrects it with error terms derived from calibration standards
//! and optionally converts it to a time-domain response.
//!
//! ## Modules
//!
//! - `frequency` - Sweep range and frequency table
//! - `measurement` - Per-point complex measurement buffer
//! - `calibration` - Standards, error terms, correction and interpolation
//! - `delay` - Electrical delay compensation
//! - `time_domain` - Kaiser-windowed inverse FFT transform
//! - `trace` - Trace and marker settings
//! - `persist` - Calibration save slots
//! - `sweep` - Hardware seam, source policy and the measurement engine
//! - `config` - TOML engine configuration

pub mod calibration;
pub mod config;
pub mod constants;
pub mod delay;
pub mod error;
pub mod frequency;
pub mod measurement;
pub mod persist;
pub mod sweep;
pub mod time_domain;
pub mod trace;

pub use calibration::{CalStandard, CalStatus, CalibrationStore};
pub use config::EngineConfig;
pub use frequency::{FrequencyPlan, FrequencySet, SweepParam, SweepRange};
pub use measurement::{Channel, Measurement};
pub use sweep::{Hardware, MeasurementEngine, SampleMode, SweepOutcome};
