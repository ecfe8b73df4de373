//! Measurement buffer
//!
//! Holds one complex sample per channel per sweep point. The sweep writes raw
//! samples, then error correction and electrical-delay rotation rewrite them
//! in place; the time-domain transform finally replaces the whole buffer.

use ndarray::{Array2, ArrayView1, ArrayViewMut1};
use num_complex::Complex32;

use crate::constants::POINT_COUNT;
use crate::error::MeasurementError;

/// Receive channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Reflection (S11)
    Reflection = 0,
    /// Transmission (S21)
    Transmission = 1,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Reflection, Channel::Transmission];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Measured values `[channel, point]`
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    data: Array2<Complex32>,
    /// Sweep points whose values have already been error-corrected
    corrected: [bool; POINT_COUNT],
}

impl Default for Measurement {
    fn default() -> Self {
        Self {
            data: Array2::zeros((2, POINT_COUNT)),
            corrected: [false; POINT_COUNT],
        }
    }
}

impl Measurement {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, channel: Channel, index: usize) -> Complex32 {
        self.data[[channel.index(), index]]
    }

    /// Store a raw sample. Clears the corrected mark for this point.
    pub fn set_raw(
        &mut self,
        channel: Channel,
        index: usize,
        value: Complex32,
    ) -> Result<(), MeasurementError> {
        if index >= POINT_COUNT {
            return Err(MeasurementError::IndexOutOfRange { index });
        }
        self.data[[channel.index(), index]] = value;
        self.corrected[index] = false;
        Ok(())
    }

    /// Store a sample for an in-range sweep point
    #[inline]
    pub(crate) fn record(&mut self, channel: Channel, index: usize, value: Complex32) {
        self.data[[channel.index(), index]] = value;
        self.corrected[index] = false;
    }

    /// Overwrite a value without touching the corrected mark
    #[inline]
    pub(crate) fn set(&mut self, channel: Channel, index: usize, value: Complex32) {
        self.data[[channel.index(), index]] = value;
    }

    /// Both channel values at one sweep point
    #[inline]
    pub fn pair(&self, index: usize) -> (Complex32, Complex32) {
        (
            self.data[[0, index]],
            self.data[[1, index]],
        )
    }

    /// Mark a point as corrected, rejecting a second correction
    pub(crate) fn mark_corrected(&mut self, index: usize) -> Result<(), MeasurementError> {
        if index >= POINT_COUNT {
            return Err(MeasurementError::IndexOutOfRange { index });
        }
        if self.corrected[index] {
            return Err(MeasurementError::AlreadyCorrected(index));
        }
        self.corrected[index] = true;
        Ok(())
    }

    #[inline]
    pub fn is_corrected(&self, index: usize) -> bool {
        self.corrected.get(index).copied().unwrap_or(false)
    }

    #[inline]
    pub fn channel(&self, channel: Channel) -> ArrayView1<'_, Complex32> {
        self.data.row(channel.index())
    }

    #[inline]
    pub fn channel_mut(&mut self, channel: Channel) -> ArrayViewMut1<'_, Complex32> {
        self.data.row_mut(channel.index())
    }

    /// Get the underlying `[2, POINT_COUNT]` array
    #[inline]
    pub fn data(&self) -> &Array2<Complex32> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_raw_resets_corrected() {
        let mut m = Measurement::new();
        m.set_raw(Channel::Reflection, 3, Complex32::new(0.5, -0.5))
            .unwrap();
        m.mark_corrected(3).unwrap();
        assert!(m.is_corrected(3));
        assert_eq!(
            m.mark_corrected(3),
            Err(MeasurementError::AlreadyCorrected(3))
        );

        m.set_raw(Channel::Transmission, 3, Complex32::new(1.0, 0.0))
            .unwrap();
        assert!(!m.is_corrected(3));
        assert_eq!(m.pair(3), (Complex32::new(0.5, -0.5), Complex32::new(1.0, 0.0)));
    }

    #[test]
    fn test_out_of_range() {
        let mut m = Measurement::new();
        assert_eq!(
            m.set_raw(Channel::Reflection, POINT_COUNT, Complex32::new(0.0, 0.0)),
            Err(MeasurementError::IndexOutOfRange { index: POINT_COUNT })
        );
    }
}
