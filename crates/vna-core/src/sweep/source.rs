//! RF source and front-end gain policy
//!
//! Hardware backends that drive a synthesizer and a codec gain stage can
//! delegate `set_source_frequency` to [`SourceController`], which decides
//! when the gain bank and drive strength must change and how long the
//! front-end then needs to settle.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::constants::{DEFAULT_HARMONIC_THRESHOLD, GAIN_SWITCH_DELAY_MS};
use crate::frequency::is_harmonic_mode;

/// Synthesizer output drive strength
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveStrength {
    /// 8 mA in harmonic mode, 2 mA otherwise
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "2mA")]
    Ma2,
    #[serde(rename = "4mA")]
    Ma4,
    #[serde(rename = "6mA")]
    Ma6,
    #[serde(rename = "8mA")]
    Ma8,
}

impl DriveStrength {
    /// Resolve `Auto` for a target frequency
    pub fn resolve(self, frequency: u32, harmonic_threshold: u32) -> DriveStrength {
        match self {
            DriveStrength::Auto if is_harmonic_mode(frequency, harmonic_threshold) => {
                DriveStrength::Ma8
            }
            DriveStrength::Auto => DriveStrength::Ma2,
            fixed => fixed,
        }
    }

    /// Output current, `None` for `Auto`
    pub fn milliamps(self) -> Option<u8> {
        match self {
            DriveStrength::Auto => None,
            DriveStrength::Ma2 => Some(2),
            DriveStrength::Ma4 => Some(4),
            DriveStrength::Ma6 => Some(6),
            DriveStrength::Ma8 => Some(8),
        }
    }
}

/// Front-end gain per harmonic order, (left, right) codec gain
pub const GAIN_TABLE: [(u8, u8); 5] = [(0, 0), (50, 50), (55, 55), (75, 75), (80, 80)];

/// Programs the RF and LO outputs
pub trait Synthesizer {
    /// Program `frequency` with the LO `offset` above it.
    ///
    /// Returns the settling delay the synthesizer needs in ms.
    fn set_frequency(&mut self, frequency: u32, offset: i32, drive: DriveStrength) -> u32;
}

/// Analog front-end gain
pub trait GainControl {
    fn set_gain(&mut self, left: u8, right: u8);
}

/// Frequency programming with harmonic-order gain switching
#[derive(Debug)]
pub struct SourceController<S, G> {
    synth: S,
    gain: G,
    frequency: u32,
    harmonic_threshold: u32,
    offset: i32,
    drive: DriveStrength,
}

impl<S: Synthesizer, G: GainControl> SourceController<S, G> {
    pub fn new(synth: S, gain: G) -> Self {
        Self {
            synth,
            gain,
            frequency: 0,
            harmonic_threshold: DEFAULT_HARMONIC_THRESHOLD,
            offset: 5000,
            drive: DriveStrength::Auto,
        }
    }

    pub fn with_settings(
        mut self,
        harmonic_threshold: u32,
        offset: i32,
        drive: DriveStrength,
    ) -> Self {
        self.harmonic_threshold = harmonic_threshold.max(1);
        self.offset = offset;
        self.drive = drive;
        self
    }

    /// Controller using the threshold, IF offset and drive of `config`
    pub fn from_config(synth: S, gain: G, config: &EngineConfig) -> Self {
        Self::new(synth, gain).with_settings(
            config.harmonic_freq_threshold,
            config.frequency_offset,
            config.drive_strength,
        )
    }

    /// Last programmed frequency (0 before the first call)
    #[inline]
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn synth(&self) -> &S {
        &self.synth
    }

    pub fn gain(&self) -> &G {
        &self.gain
    }

    fn harmonic_order(&self, frequency: u32) -> usize {
        (frequency.saturating_sub(1) / self.harmonic_threshold) as usize
    }

    /// Program `frequency`, returning the total settling delay in ms.
    ///
    /// Reprogramming the current frequency is a no-op.
    pub fn set_frequency(&mut self, frequency: u32) -> u32 {
        if frequency == self.frequency {
            return 0;
        }

        let mut delay = 0;
        let order = self.harmonic_order(frequency);
        if order != self.harmonic_order(self.frequency) {
            let (left, right) = GAIN_TABLE[order.min(GAIN_TABLE.len() - 1)];
            self.gain.set_gain(left, right);
            delay += GAIN_SWITCH_DELAY_MS;
            trace!("Harmonic order {} -> gain ({}, {})", order, left, right);
        }

        let drive = self.drive.resolve(frequency, self.harmonic_threshold);
        delay += self.synth.set_frequency(frequency, self.offset, drive);
        self.frequency = frequency;
        delay
    }

    /// Change the IF offset and reprogram the current frequency
    pub fn set_offset(&mut self, offset: i32) -> u32 {
        self.offset = offset;
        self.reprogram()
    }

    /// Change the drive strength and reprogram the current frequency
    pub fn set_drive(&mut self, drive: DriveStrength) -> u32 {
        self.drive = drive;
        self.reprogram()
    }

    fn reprogram(&mut self) -> u32 {
        let drive = self.drive.resolve(self.frequency, self.harmonic_threshold);
        self.synth.set_frequency(self.frequency, self.offset, drive)
    }
}
