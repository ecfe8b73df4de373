//! Calibration Interpolation Tests
//!
//! Remapping saved calibrations onto a changed frequency table, directly and
//! through the engine's automatic re-interpolation.

mod common;

use approx::assert_abs_diff_eq;
use common::{fast_config, Connection, SimulatedVna};
use ndarray::Array2;
use num_complex::Complex32;
use vna_core::calibration::{ErrorTerm, ErrorTerms, RawStandards};
use vna_core::constants::{CAL_TERMS, POINT_COUNT};
use vna_core::error::{CalibrationError, ConfigError};
use vna_core::persist::MemorySlots;
use vna_core::{
    CalStandard, CalStatus, CalibrationStore, EngineConfig, FrequencySet, MeasurementEngine,
    SweepParam,
};

const THR: u32 = 300_000_000;

fn ramp_terms() -> ErrorTerms {
    let data = Array2::from_shape_fn((CAL_TERMS, POINT_COUNT), |(t, i)| {
        Complex32::new(i as f32 * 0.01 + t as f32, 1.0 - i as f32 * 0.005)
    });
    ErrorTerms::from_array(data).unwrap()
}

fn engine_with(config: EngineConfig) -> MeasurementEngine<SimulatedVna> {
    MeasurementEngine::new(SimulatedVna::default(), Box::new(MemorySlots::new()), config)
}

fn calibrate(engine: &MeasurementEngine<SimulatedVna>) {
    for (connection, standard) in [
        (Connection::Load, CalStandard::Load),
        (Connection::Open, CalStandard::Open),
        (Connection::Short, CalStandard::Short),
        (Connection::Thru, CalStandard::Thru),
        (Connection::Isolation, CalStandard::Isoln),
    ] {
        engine.with_hardware_mut(|hw| hw.connection = connection);
        engine.sweep_now(false).unwrap();
        engine.collect(standard);
    }
    engine.done();
}

// ============================================================================
// Store level
// ============================================================================

#[test]
fn test_identical_grid_reproduces_terms() {
    let freqs = FrequencySet::default();
    let source = ramp_terms();
    let mut cal = CalibrationStore::new();
    cal.interpolate_from(
        CalStatus::LOAD | CalStatus::ES,
        &freqs,
        &RawStandards::default(),
        &source,
        &freqs,
        THR,
    );

    assert_eq!(cal.terms(), &source);
    let status = cal.status();
    assert!(status.contains(CalStatus::APPLY | CalStatus::INTERPOLATED));
    assert!(status.contains(CalStatus::LOAD | CalStatus::ES));
}

#[test]
fn test_no_blending_across_harmonic_boundary() {
    let source_freqs = FrequencySet::generate(250_000_000, 350_000_000, 2).unwrap();
    let dest = FrequencySet::generate(280_000_000, 320_000_000, 5).unwrap();
    let source = ramp_terms();

    let mut cal = CalibrationStore::new();
    cal.interpolate_from(
        CalStatus::empty(),
        &source_freqs,
        &RawStandards::default(),
        &source,
        &dest,
        THR,
    );

    let lo = source.get(ErrorTerm::Ed, 0);
    let hi = source.get(ErrorTerm::Ed, 1);
    // 280, 290 and 300 MHz are fundamental; 310 and 320 MHz are harmonic
    for i in 0..3 {
        assert_eq!(cal.terms().get(ErrorTerm::Ed, i), lo);
    }
    for i in 3..5 {
        assert_eq!(cal.terms().get(ErrorTerm::Ed, i), hi);
    }
}

#[test]
fn test_edges_extend_and_tail_uses_last_saved_point() {
    // Saved with 11 points; columns past the 11th are stale and must not leak
    let source_freqs = FrequencySet::generate(100_000_000, 200_000_000, 11).unwrap();
    let dest = FrequencySet::generate(50_000_000, 250_000_000, 21).unwrap();
    let source = ramp_terms();

    let mut raw = RawStandards::default();
    raw.set(CalStandard::Load, source.row(ErrorTerm::Ed));

    let mut cal = CalibrationStore::new();
    cal.interpolate_from(CalStatus::LOAD, &source_freqs, &raw, &source, &dest, THR);

    let first = source.get(ErrorTerm::Ed, 0);
    let last = source.get(ErrorTerm::Ed, 10);
    // 50..90 MHz below the source grid
    for i in 0..5 {
        assert_eq!(cal.terms().get(ErrorTerm::Ed, i), first);
    }
    // 200 MHz and above
    for i in 15..21 {
        assert_eq!(cal.terms().get(ErrorTerm::Ed, i), last);
        assert_eq!(cal.raw_at(CalStandard::Load, i), last);
    }
    // 105 MHz lies half way between source points 0 and 1
    let dest_mid = FrequencySet::generate(105_000_000, 105_000_000, 1).unwrap();
    let mut mid = CalibrationStore::new();
    mid.interpolate_from(CalStatus::empty(), &source_freqs, &raw, &source, &dest_mid, THR);
    let expected = (source.get(ErrorTerm::Er, 0) + source.get(ErrorTerm::Er, 1)) * 0.5;
    let got = mid.terms().get(ErrorTerm::Er, 0);
    assert_abs_diff_eq!(got.re, expected.re, epsilon = 1e-6);
    assert_abs_diff_eq!(got.im, expected.im, epsilon = 1e-6);
}

// ============================================================================
// Engine level
// ============================================================================

#[test]
fn test_span_change_reinterpolates_saved_calibration() {
    let engine = engine_with(fast_config());
    calibrate(&engine);
    engine.save(0).unwrap();
    let saved_status = engine.calibration_status();

    engine.set_sweep_frequency(SweepParam::Stop, 450_000_000);
    let status = engine.calibration_status();
    assert_eq!(status, saved_status | CalStatus::INTERPOLATED);

    let s11 = Complex32::new(0.3, 0.3);
    let s21 = Complex32::new(0.7, -0.1);
    engine.with_hardware_mut(|hw| hw.connection = Connection::Dut { s11, s21 });
    engine.sweep_now(false).unwrap();

    let m = engine.measured();
    for i in 0..engine.frequencies().points() {
        let (got11, got21) = m.pair(i);
        // Even points coincide with the saved grid
        let eps = if i % 2 == 0 { 1e-4 } else { 5e-2 };
        assert_abs_diff_eq!(got11.re, s11.re, epsilon = eps);
        assert_abs_diff_eq!(got11.im, s11.im, epsilon = eps);
        assert_abs_diff_eq!(got21.re, s21.re, epsilon = eps);
        assert_abs_diff_eq!(got21.im, s21.im, epsilon = eps);
    }
}

#[test]
fn test_auto_interpolation_can_be_disabled() {
    let engine = engine_with(EngineConfig {
        cal_auto_interpolate: false,
        ..fast_config()
    });
    calibrate(&engine);
    engine.save(0).unwrap();

    engine.set_sweep_frequency(SweepParam::Stop, 450_000_000);
    // Editing the committed settings dropped the calibration
    assert!(engine.calibration_status().is_empty());

    engine.interpolate_from(0).unwrap();
    assert!(engine
        .calibration_status()
        .contains(CalStatus::APPLY | CalStatus::INTERPOLATED));
}

#[test]
fn test_uncalibrated_edit_does_not_interpolate() {
    let engine = engine_with(fast_config());
    calibrate(&engine);
    engine.save(0).unwrap();
    engine.set_correction(false);

    engine.set_sweep_points(51).unwrap();
    assert!(!engine.calibration_status().contains(CalStatus::INTERPOLATED));
}

#[test]
fn test_interpolate_from_empty_slot() {
    let engine = engine_with(fast_config());
    let before = engine.calibration();
    assert!(matches!(
        engine.interpolate_from(2),
        Err(CalibrationError::SlotNotFound(2))
    ));
    assert_eq!(engine.calibration(), before);

    assert!(matches!(
        engine.interpolate_from(9),
        Err(CalibrationError::Config(ConfigError::InvalidSlot(9)))
    ));
}
