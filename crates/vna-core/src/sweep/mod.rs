//! Sweep module - hardware seam and measurement engine
//!
//! The engine never talks to peripherals directly. A [`Hardware`] backend
//! programs the source, switches the receive path and performs one
//! synchronous detection per call; everything else (correction, delay,
//! time-domain transform, calibration bookkeeping) happens in the engine.

mod engine;
mod source;

use std::time::Duration;

use num_complex::Complex32;

use crate::error::HardwareError;
use crate::measurement::Channel;

pub use engine::{spawn_worker, EngineSnapshot, MeasurementEngine, ScanResult};
pub use source::{DriveStrength, GainControl, SourceController, Synthesizer, GAIN_TABLE};

/// What one detection returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SampleMode {
    /// Complex reflection/transmission coefficient
    #[default]
    Gamma,
    /// Signal amplitude
    Amplitude,
    /// Reference amplitude
    AmplitudeRef,
}

/// How a sweep ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Every point was measured and the domain transform ran
    Complete,
    /// Stopped at a point boundary; points before it are valid
    Interrupted { completed: usize },
}

impl SweepOutcome {
    #[inline]
    pub fn is_complete(self) -> bool {
        matches!(self, SweepOutcome::Complete)
    }
}

/// Instrument backend driven by the sweep
pub trait Hardware: Send {
    /// Program the RF source. Returns the settling delay needed in ms.
    fn set_source_frequency(&mut self, frequency: u32) -> u32;

    /// Switch the receive path
    fn select_channel(&mut self, channel: Channel);

    /// Let the front-end settle and a detection window elapse
    fn wait(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }

    /// One synchronous detection on the selected path.
    ///
    /// May block until detection completes, but no longer than `timeout`.
    fn sample(
        &mut self,
        channel: Channel,
        mode: SampleMode,
        timeout: Duration,
    ) -> Result<Complex32, HardwareError>;
}
