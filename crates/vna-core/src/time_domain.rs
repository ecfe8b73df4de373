//! Time-domain transform
//!
//! Converts a completed frequency sweep into a time-domain response with a
//! Kaiser-windowed inverse FFT of fixed size.
//!
//! Note: the transform assumes a uniformly spaced sweep. Lowpass modes also
//! assume the sweep starts near DC, since the spectrum is mirrored about the
//! first point to force a real-valued response.

use std::fmt;
use std::sync::Arc;

use log::trace;
use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::constants::{
    BESSEL_EPS, FFT_SIZE, KAISER_BETA_MAXIMUM, KAISER_BETA_MINIMUM, KAISER_BETA_NORMAL,
    POINT_COUNT,
};
use crate::measurement::{Channel, Measurement};

/// Whether the measurement buffer holds frequency or time samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Domain {
    #[default]
    Frequency,
    Time,
}

/// Time-domain function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TdFunction {
    #[default]
    Bandpass,
    LowpassImpulse,
    LowpassStep,
}

impl TdFunction {
    #[inline]
    pub fn is_lowpass(self) -> bool {
        !matches!(self, TdFunction::Bandpass)
    }
}

/// Kaiser window setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TdWindow {
    /// Rectangular
    Minimum,
    #[default]
    Normal,
    Maximum,
}

impl TdWindow {
    /// Kaiser shape parameter
    pub fn beta(self) -> f32 {
        match self {
            TdWindow::Minimum => KAISER_BETA_MINIMUM,
            TdWindow::Normal => KAISER_BETA_NORMAL,
            TdWindow::Maximum => KAISER_BETA_MAXIMUM,
        }
    }
}

/// Domain selection with its time-domain function and window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainMode {
    pub domain: Domain,
    pub function: TdFunction,
    pub window: TdWindow,
}

impl DomainMode {
    const DOMAIN_TIME: u8 = 1 << 0;
    const FUNC_MASK: u8 = 3 << 1;
    const FUNC_LOWPASS_IMPULSE: u8 = 1 << 1;
    const FUNC_LOWPASS_STEP: u8 = 2 << 1;
    const WINDOW_MASK: u8 = 3 << 3;
    const WINDOW_MINIMUM: u8 = 1 << 3;
    const WINDOW_MAXIMUM: u8 = 2 << 3;

    /// Pack into the persisted bitfield: bit 0 domain, bits 1-2 function,
    /// bits 3-4 window
    pub fn to_bits(self) -> u8 {
        let domain = match self.domain {
            Domain::Frequency => 0,
            Domain::Time => Self::DOMAIN_TIME,
        };
        let function = match self.function {
            TdFunction::Bandpass => 0,
            TdFunction::LowpassImpulse => Self::FUNC_LOWPASS_IMPULSE,
            TdFunction::LowpassStep => Self::FUNC_LOWPASS_STEP,
        };
        let window = match self.window {
            TdWindow::Normal => 0,
            TdWindow::Minimum => Self::WINDOW_MINIMUM,
            TdWindow::Maximum => Self::WINDOW_MAXIMUM,
        };
        domain | function | window
    }

    /// Unpack the persisted bitfield. Returns `None` for reserved encodings.
    pub fn from_bits(bits: u8) -> Option<Self> {
        let domain = if bits & Self::DOMAIN_TIME != 0 {
            Domain::Time
        } else {
            Domain::Frequency
        };
        let function = match bits & Self::FUNC_MASK {
            0 => TdFunction::Bandpass,
            Self::FUNC_LOWPASS_IMPULSE => TdFunction::LowpassImpulse,
            Self::FUNC_LOWPASS_STEP => TdFunction::LowpassStep,
            _ => return None,
        };
        let window = match bits & Self::WINDOW_MASK {
            0 => TdWindow::Normal,
            Self::WINDOW_MINIMUM => TdWindow::Minimum,
            Self::WINDOW_MAXIMUM => TdWindow::Maximum,
            _ => return None,
        };
        Some(Self {
            domain,
            function,
            window,
        })
    }
}

/// Zeroth-order modified Bessel function of the first kind, by power series.
///
/// Stops once a term falls below `BESSEL_EPS` relative to the running sum.
pub fn bessel0(x: f32) -> f32 {
    let mut ret = 0.0;
    let mut term = 1.0;
    let mut m = 0.0;
    while term > BESSEL_EPS * ret {
        ret += term;
        m += 1.0;
        term *= (x * x) / (4.0 * m * m);
    }
    ret
}

/// Kaiser window weight of tap `k` in an `n`-tap window.
///
/// `r = 2k/(n-1) - 1`, `w = I0(beta * sqrt(1 - r^2)) / I0(beta)`. A zero
/// beta is the rectangular window.
pub fn kaiser_window(k: f32, n: f32, beta: f32) -> f32 {
    if beta == 0.0 {
        return 1.0;
    }
    let r = (2.0 * k) / (n - 1.0) - 1.0;
    bessel0(beta * (1.0 - r * r).max(0.0).sqrt()) / bessel0(beta)
}

/// Inverse FFT based time-domain transformer.
///
/// The FFT plan and the working buffers are created once and reused for
/// both channels of every sweep.
pub struct TimeDomainTransformer {
    ifft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl fmt::Debug for TimeDomainTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeDomainTransformer")
            .field("fft_size", &self.buffer.len())
            .finish()
    }
}

impl Default for TimeDomainTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeDomainTransformer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let ifft = planner.plan_fft_inverse(FFT_SIZE);
        let scratch = vec![Complex32::new(0.0, 0.0); ifft.get_inplace_scratch_len()];
        Self {
            ifft,
            buffer: vec![Complex32::new(0.0, 0.0); FFT_SIZE],
            scratch,
        }
    }

    /// Transform `measured` in place. Does nothing in the frequency domain.
    ///
    /// # Arguments
    /// * `mode` - Domain, function and window selection
    /// * `measured` - Full `POINT_COUNT` sweep buffer, both channels
    pub fn transform(&mut self, mode: DomainMode, measured: &mut Measurement) {
        if mode.domain != Domain::Time {
            return;
        }

        let lowpass = mode.function.is_lowpass();
        let (offset, window_size) = if lowpass {
            (POINT_COUNT, POINT_COUNT * 2)
        } else {
            (0, POINT_COUNT)
        };
        let beta = mode.window.beta();
        let scale = 1.0 / FFT_SIZE as f32;

        for ch in Channel::ALL {
            let input = measured.channel(ch);
            for (i, slot) in self.buffer.iter_mut().enumerate() {
                *slot = if i < POINT_COUNT {
                    input[i] * kaiser_window((i + offset) as f32, window_size as f32, beta)
                } else {
                    Complex32::new(0.0, 0.0)
                };
            }
            if lowpass {
                for i in 1..POINT_COUNT {
                    self.buffer[FFT_SIZE - i] = self.buffer[i].conj();
                }
            }

            self.ifft
                .process_with_scratch(&mut self.buffer, &mut self.scratch);

            let mut output = measured.channel_mut(ch);
            for (out, v) in output.iter_mut().zip(&self.buffer) {
                *out = if lowpass {
                    Complex32::new(v.re * scale, 0.0)
                } else {
                    *v * scale
                };
            }
            if mode.function == TdFunction::LowpassStep {
                for i in 1..POINT_COUNT {
                    let prev = output[i - 1].re;
                    output[i].re += prev;
                }
            }
        }
        trace!("Transformed sweep to time domain ({:?})", mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bessel0_values() {
        assert_eq!(bessel0(0.0), 1.0);
        // I0(1) = 1.2660659
        assert_relative_eq!(bessel0(1.0), 1.266_065_9, max_relative = 1e-4);
        // I0(6) = 67.234407
        assert_relative_eq!(bessel0(6.0), 67.234_41, max_relative = 1e-4);
    }

    #[test]
    fn test_kaiser_shape() {
        let n = POINT_COUNT as f32;
        assert_eq!(kaiser_window(17.0, n, 0.0), 1.0);

        let center = kaiser_window(50.0, n, 6.0);
        let edge = kaiser_window(0.0, n, 6.0);
        assert_relative_eq!(center, 1.0, max_relative = 1e-5);
        assert_relative_eq!(edge, 1.0 / bessel0(6.0), max_relative = 1e-5);
        assert_relative_eq!(
            kaiser_window(10.0, n, 13.0),
            kaiser_window(90.0, n, 13.0),
            max_relative = 1e-5
        );
    }

    #[test]
    fn test_domain_bits() {
        let mode = DomainMode {
            domain: Domain::Time,
            function: TdFunction::LowpassStep,
            window: TdWindow::Maximum,
        };
        assert_eq!(mode.to_bits(), 0b1_0101);
        assert_eq!(DomainMode::from_bits(mode.to_bits()), Some(mode));
        assert_eq!(DomainMode::default().to_bits(), 0);
        assert_eq!(DomainMode::from_bits(3 << 1), None);
        assert_eq!(DomainMode::from_bits(3 << 3), None);
    }

    #[test]
    fn test_frequency_domain_untouched() {
        let mut m = Measurement::new();
        m.set_raw(Channel::Reflection, 4, Complex32::new(0.2, 0.1))
            .unwrap();
        let before = m.clone();
        TimeDomainTransformer::new().transform(DomainMode::default(), &mut m);
        assert_eq!(m, before);
    }
}
