//! Raw standard storage and error term derivation

use std::f32::consts::TAU;

use log::debug;
use ndarray::{Array2, ArrayView1};
use num_complex::Complex32;

use super::{CalStandard, CalStatus, ErrorTerm};
use crate::constants::{CAL_TERMS, OPEN_FRINGE_CAPACITANCE, POINT_COUNT, Z0};
use crate::frequency::FrequencySet;

const ZERO: Complex32 = Complex32::new(0.0, 0.0);
const ONE: Complex32 = Complex32::new(1.0, 0.0);

/// Raw standard measurements `[standard, point]`
#[derive(Debug, Clone, PartialEq)]
pub struct RawStandards {
    data: Array2<Complex32>,
}

impl Default for RawStandards {
    fn default() -> Self {
        Self {
            data: Array2::zeros((CAL_TERMS, POINT_COUNT)),
        }
    }
}

impl RawStandards {
    /// Wrap a `[5, POINT_COUNT]` array
    pub fn from_array(data: Array2<Complex32>) -> Option<Self> {
        (data.dim() == (CAL_TERMS, POINT_COUNT)).then_some(Self { data })
    }

    #[inline]
    pub fn get(&self, standard: CalStandard, index: usize) -> Complex32 {
        self.data[[standard.index(), index]]
    }

    pub fn set(&mut self, standard: CalStandard, values: ArrayView1<'_, Complex32>) {
        self.data.row_mut(standard.index()).assign(&values);
    }

    #[inline]
    pub fn data(&self) -> &Array2<Complex32> {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut Array2<Complex32> {
        &mut self.data
    }
}

/// Error terms `[term, point]`.
///
/// The transmission tracking term is stored as its reciprocal so that
/// correction multiplies instead of dividing.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorTerms {
    data: Array2<Complex32>,
}

impl Default for ErrorTerms {
    /// Identity terms: no directivity, source match or isolation, unit tracking
    fn default() -> Self {
        let mut data = Array2::zeros((CAL_TERMS, POINT_COUNT));
        data.row_mut(ErrorTerm::Er.index()).fill(ONE);
        data.row_mut(ErrorTerm::Et.index()).fill(ONE);
        Self { data }
    }
}

impl ErrorTerms {
    /// Wrap a `[5, POINT_COUNT]` array
    pub fn from_array(data: Array2<Complex32>) -> Option<Self> {
        (data.dim() == (CAL_TERMS, POINT_COUNT)).then_some(Self { data })
    }

    #[inline]
    pub fn get(&self, term: ErrorTerm, index: usize) -> Complex32 {
        self.data[[term.index(), index]]
    }

    #[inline]
    pub fn row(&self, term: ErrorTerm) -> ArrayView1<'_, Complex32> {
        self.data.row(term.index())
    }

    #[inline]
    pub fn data(&self) -> &Array2<Complex32> {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut Array2<Complex32> {
        &mut self.data
    }

    fn fill(&mut self, term: ErrorTerm, value: Complex32) {
        self.data.row_mut(term.index()).fill(value);
    }

    /// Derive error terms from the collected standards.
    ///
    /// Precedence per term:
    /// - ED: load if collected, else 0
    /// - ES, ER: open and short solved together against the open fringe
    ///   model; open only gives ES = 0, ER = S11mo'; short only gives
    ///   ES = 0, ER = -S11ms'; neither gives ES = 0, ER = 1
    /// - EX: isolation if collected, else 0
    /// - ET: 1 / (thru - EX) if thru collected, else 1
    ///
    /// Consumed open/short/thru bits are cleared from `status` and the
    /// corresponding ES/ER/ET bits are set.
    pub fn derive_from(
        raw: &RawStandards,
        status: &mut CalStatus,
        frequencies: &FrequencySet,
    ) -> ErrorTerms {
        let mut terms = ErrorTerms::default();
        let table = frequencies.table();

        if status.contains(CalStatus::LOAD) {
            terms
                .data
                .row_mut(ErrorTerm::Ed.index())
                .assign(&raw.data.row(CalStandard::Load.index()));
        } else {
            terms.fill(ErrorTerm::Ed, ZERO);
        }

        let has_open = status.contains(CalStatus::OPEN);
        let has_short = status.contains(CalStatus::SHORT);
        for i in 0..POINT_COUNT {
            let ed = terms.data[[ErrorTerm::Ed.index(), i]];
            let open = raw.get(CalStandard::Open, i) - ed;
            let short = raw.get(CalStandard::Short, i) - ed;
            let (es, er) = match (has_open, has_short) {
                (true, true) => {
                    let es = (short + open * open_model_inverse(table[i])) / (open - short);
                    (es, -(ONE + es) * short)
                }
                (true, false) => (ZERO, open),
                (false, true) => (ZERO, -short),
                (false, false) => (ZERO, ONE),
            };
            terms.data[[ErrorTerm::Es.index(), i]] = es;
            terms.data[[ErrorTerm::Er.index(), i]] = er;
        }
        // An open used alone stays collected, so deriving again reproduces ER
        match (has_open, has_short) {
            (true, true) => {
                status.remove(CalStatus::OPEN | CalStatus::SHORT);
                status.insert(CalStatus::ES | CalStatus::ER);
            }
            (true, false) => status.insert(CalStatus::ER),
            (false, true) => {
                status.remove(CalStatus::SHORT);
                status.insert(CalStatus::ER);
            }
            (false, false) => {}
        }

        if status.contains(CalStatus::ISOLN) {
            terms
                .data
                .row_mut(ErrorTerm::Ex.index())
                .assign(&raw.data.row(CalStandard::Isoln.index()));
        } else {
            terms.fill(ErrorTerm::Ex, ZERO);
        }

        if status.contains(CalStatus::THRU) {
            for i in 0..POINT_COUNT {
                let thru = raw.get(CalStandard::Thru, i) - terms.data[[ErrorTerm::Ex.index(), i]];
                terms.data[[ErrorTerm::Et.index(), i]] = thru.inv();
            }
            status.remove(CalStatus::THRU);
            status.insert(CalStatus::ET);
        } else {
            terms.fill(ErrorTerm::Et, ONE);
        }

        debug!(
            "Derived error terms over {} points (open: {}, short: {})",
            frequencies.points(),
            has_open,
            has_short
        );
        terms
    }
}

/// Reciprocal of the ideal open reflection at `frequency`.
///
/// The open is modelled as a fringing capacitance `c`; with
/// `z = 2*pi*f*c*z0`, `s11ao = (1 - jz) / (1 + jz)` and the reciprocal is
/// `(1 - z^2 + 2jz) / (1 + z^2)`.
pub fn open_model_inverse(frequency: u32) -> Complex32 {
    let z = TAU * frequency as f32 * OPEN_FRINGE_CAPACITANCE * Z0;
    let sq = 1.0 + z * z;
    Complex32::new((1.0 - z * z) / sq, 2.0 * z / sq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn raw_with(values: &[(CalStandard, Complex32)]) -> RawStandards {
        let mut raw = RawStandards::default();
        for &(std, v) in values {
            raw.data.row_mut(std.index()).fill(v);
        }
        raw
    }

    #[test]
    fn test_open_model_low_frequency() {
        let inv = open_model_inverse(0);
        assert_eq!(inv, ONE);

        // 1 GHz: z = 2*pi*1e9*50e-15*50 ~ 0.0157
        let inv = open_model_inverse(1_000_000_000);
        assert_abs_diff_eq!(inv.norm(), 1.0, epsilon = 1e-6);
        assert!(inv.im > 0.0);
    }

    #[test]
    fn test_no_standards_gives_identity() {
        let mut status = CalStatus::empty();
        let terms =
            ErrorTerms::derive_from(&RawStandards::default(), &mut status, &FrequencySet::default());
        assert_eq!(terms, ErrorTerms::default());
        assert!(status.is_empty());
    }

    #[test]
    fn test_short_only() {
        let raw = raw_with(&[
            (CalStandard::Load, Complex32::new(0.1, 0.0)),
            (CalStandard::Short, Complex32::new(-0.8, 0.1)),
        ]);
        let mut status = CalStatus::LOAD | CalStatus::SHORT;
        let terms = ErrorTerms::derive_from(&raw, &mut status, &FrequencySet::default());

        assert_eq!(terms.get(ErrorTerm::Ed, 0), Complex32::new(0.1, 0.0));
        assert_eq!(terms.get(ErrorTerm::Es, 0), ZERO);
        let er = terms.get(ErrorTerm::Er, 0);
        assert_abs_diff_eq!(er.re, 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(er.im, -0.1, epsilon = 1e-6);
        assert_eq!(status, CalStatus::LOAD | CalStatus::ER);
    }

    #[test]
    fn test_open_only() {
        let raw = raw_with(&[(CalStandard::Open, Complex32::new(0.7, -0.2))]);
        let mut status = CalStatus::OPEN;
        let terms = ErrorTerms::derive_from(&raw, &mut status, &FrequencySet::default());

        assert_eq!(terms.get(ErrorTerm::Ed, 5), ZERO);
        assert_eq!(terms.get(ErrorTerm::Es, 5), ZERO);
        assert_eq!(terms.get(ErrorTerm::Er, 5), Complex32::new(0.7, -0.2));
        assert_eq!(status, CalStatus::OPEN | CalStatus::ER);

        // Deriving again keeps the open-based reflection tracking
        let again = ErrorTerms::derive_from(&raw, &mut status, &FrequencySet::default());
        assert_eq!(again.get(ErrorTerm::Er, 5), Complex32::new(0.7, -0.2));
        assert_eq!(status, CalStatus::OPEN | CalStatus::ER);
    }

    #[test]
    fn test_thru_is_inverted() {
        let raw = raw_with(&[
            (CalStandard::Thru, Complex32::new(0.5, 0.0)),
            (CalStandard::Isoln, Complex32::new(0.0, 0.5)),
        ]);
        let mut status = CalStatus::THRU | CalStatus::ISOLN;
        let terms = ErrorTerms::derive_from(&raw, &mut status, &FrequencySet::default());

        // 1 / (0.5 - 0.5j) = 1 + 1j
        let et = terms.get(ErrorTerm::Et, 0);
        assert_abs_diff_eq!(et.re, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(et.im, 1.0, epsilon = 1e-6);
        assert_eq!(terms.get(ErrorTerm::Ex, 0), Complex32::new(0.0, 0.5));
        assert_eq!(status, CalStatus::ISOLN | CalStatus::ET);
    }
}
