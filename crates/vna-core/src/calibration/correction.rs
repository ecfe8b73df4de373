//! Point-wise error correction

use num_complex::Complex32;

use super::{ErrorTerm, ErrorTerms};
use crate::error::MeasurementError;
use crate::measurement::{Channel, Measurement};

/// Correct one measured pair with the terms at `index`.
///
/// ```text
/// s11a = (s11m - ed) / (er + es * (s11m - ed))
/// s21a = (s21m - ex) * (1 - es * s11a) * et
/// ```
///
/// `et` is the stored reciprocal of transmission tracking. A zero
/// denominator yields non-finite values, which are passed through.
pub fn correct_point(
    terms: &ErrorTerms,
    index: usize,
    s11m: Complex32,
    s21m: Complex32,
) -> (Complex32, Complex32) {
    let ed = terms.get(ErrorTerm::Ed, index);
    let es = terms.get(ErrorTerm::Es, index);
    let er = terms.get(ErrorTerm::Er, index);
    let et = terms.get(ErrorTerm::Et, index);
    let ex = terms.get(ErrorTerm::Ex, index);

    let s11mr = s11m - ed;
    let s11a = s11mr / (er + es * s11mr);
    let s21a = (s21m - ex) * (Complex32::new(1.0, 0.0) - es * s11a) * et;
    (s11a, s21a)
}

impl ErrorTerms {
    /// Correct sweep point `index` of `measured` in place.
    ///
    /// Each raw point may be corrected once; a second call without a fresh
    /// sample returns [`MeasurementError::AlreadyCorrected`].
    pub fn apply_at(
        &self,
        index: usize,
        measured: &mut Measurement,
    ) -> Result<(), MeasurementError> {
        measured.mark_corrected(index)?;
        let (s11m, s21m) = measured.pair(index);
        let (s11a, s21a) = correct_point(self, index, s11m, s21m);
        measured.set(Channel::Reflection, index, s11a);
        measured.set(Channel::Transmission, index, s21a);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_terms_pass_through() {
        let terms = ErrorTerms::default();
        let s11 = Complex32::new(0.3, -0.4);
        let s21 = Complex32::new(-0.1, 0.9);
        assert_eq!(correct_point(&terms, 7, s11, s21), (s11, s21));
    }

    #[test]
    fn test_apply_twice_is_rejected() {
        let terms = ErrorTerms::default();
        let mut m = Measurement::new();
        m.set_raw(Channel::Reflection, 0, Complex32::new(0.5, 0.0))
            .unwrap();
        terms.apply_at(0, &mut m).unwrap();
        assert_eq!(
            terms.apply_at(0, &mut m),
            Err(MeasurementError::AlreadyCorrected(0))
        );
        assert_abs_diff_eq!(m.get(Channel::Reflection, 0).re, 0.5, epsilon = 1e-7);
    }

    #[test]
    fn test_zero_denominator_propagates() {
        let mut terms = ErrorTerms::default();
        terms
            .data_mut()
            .row_mut(ErrorTerm::Er.index())
            .fill(Complex32::new(0.0, 0.0));
        let (s11a, _) = correct_point(
            &terms,
            0,
            Complex32::new(0.0, 0.0),
            Complex32::new(0.0, 0.0),
        );
        assert!(!s11a.is_finite());
    }
}
