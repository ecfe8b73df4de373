//! Calibration remapping onto a new frequency grid
//!
//! Each destination frequency is located in the source grid once, producing
//! a [`Bracket`]. The same brackets are then applied to every row of the
//! error terms and raw standards.
//!
//! Points below the first source frequency take the first source value and
//! points at or above the last take the last one. Between those, values are
//! linear in frequency, except across the harmonic-mode boundary where the
//! value snaps to whichever side matches the destination's mode.

use ndarray::Array2;
use num_complex::Complex32;

use super::{ErrorTerms, RawStandards};
use crate::frequency::is_harmonic_mode;

/// Position of one destination frequency within the source grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bracket {
    /// Below the first source frequency
    Head,
    /// `src[j] <= f < src[j + 1]`, weight `k1` on `src[j + 1]`
    Between { j: usize, k1: f32 },
    /// At or above the last source frequency
    Tail,
}

/// Locate every frequency of `dst` in `src`.
///
/// Both grids are assumed to be ascending. The scan walks both lists once,
/// so the source index never moves backwards.
pub fn brackets(src: &[u32], dst: &[u32], harmonic_threshold: u32) -> Vec<Bracket> {
    let mut out = Vec::with_capacity(dst.len());
    let Some(&first) = src.first() else {
        return out;
    };

    let mut i = 0;
    while i < dst.len() && dst[i] < first {
        out.push(Bracket::Head);
        i += 1;
    }

    let mut j = 0;
    while i < dst.len() {
        let f = dst[i];
        while j + 1 < src.len() && !(src[j] <= f && f < src[j + 1]) {
            j += 1;
        }
        if j + 1 >= src.len() {
            break;
        }

        let (lo, hi) = (src[j], src[j + 1]);
        let k1 = if is_harmonic_mode(lo, harmonic_threshold)
            != is_harmonic_mode(hi, harmonic_threshold)
        {
            if is_harmonic_mode(f, harmonic_threshold) {
                1.0
            } else {
                0.0
            }
        } else {
            (f - lo) as f32 / (hi - lo) as f32
        };
        out.push(Bracket::Between { j, k1 });
        i += 1;
    }

    out.resize(dst.len(), Bracket::Tail);
    out
}

/// Rewrite the leading columns of `dst` from `src` through `brackets`.
///
/// `source_points` is the number of valid source columns; the tail bracket
/// reads the last of them.
fn remap_rows(
    dst: &mut Array2<Complex32>,
    src: &Array2<Complex32>,
    source_points: usize,
    brackets: &[Bracket],
) {
    let last = source_points.saturating_sub(1);
    for (mut dst_row, src_row) in dst.rows_mut().into_iter().zip(src.rows()) {
        for (i, bracket) in brackets.iter().enumerate() {
            dst_row[i] = match *bracket {
                Bracket::Head => src_row[0],
                Bracket::Between { j, k1 } => src_row[j] * (1.0 - k1) + src_row[j + 1] * k1,
                Bracket::Tail => src_row[last],
            };
        }
    }
}

impl ErrorTerms {
    /// Overwrite the first `brackets.len()` points with terms interpolated
    /// from `source`, which holds `source_points` valid points
    pub fn remap_from(&mut self, source: &ErrorTerms, source_points: usize, brackets: &[Bracket]) {
        remap_rows(self.data_mut(), source.data(), source_points, brackets);
    }
}

impl RawStandards {
    pub fn remap_from(
        &mut self,
        source: &RawStandards,
        source_points: usize,
        brackets: &[Bracket],
    ) {
        remap_rows(self.data_mut(), source.data(), source_points, brackets);
    }
}
