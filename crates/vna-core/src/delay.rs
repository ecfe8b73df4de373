//! Electrical delay compensation
//!
//! Rotates measured values by the phase a fixed propagation delay adds at
//! each frequency, so that cable or fixture length can be removed from the
//! displayed response.

use std::f32::consts::TAU;

use num_complex::Complex32;

use crate::measurement::{Channel, Measurement};

/// Electrical delay in picoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElectricalDelay(pub f32);

impl ElectricalDelay {
    #[inline]
    pub fn picoseconds(self) -> f32 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }

    /// Phase angle in radians at `frequency`: `w = 2*pi * delay * f`
    #[inline]
    pub fn angle(self, frequency: u32) -> f32 {
        TAU * self.0 * frequency as f32 * 1e-12
    }

    /// Rotate one value by `e^(jw)`
    #[inline]
    pub fn rotate(self, value: Complex32, frequency: u32) -> Complex32 {
        let (s, c) = self.angle(frequency).sin_cos();
        Complex32::new(value.re * c - value.im * s, value.im * c + value.re * s)
    }

    /// Rotate both channels of sweep point `index` in place
    pub fn apply_at(self, index: usize, frequency: u32, measured: &mut Measurement) {
        for ch in Channel::ALL {
            let v = measured.get(ch, index);
            measured.set(ch, index, self.rotate(v, frequency));
        }
    }
}
