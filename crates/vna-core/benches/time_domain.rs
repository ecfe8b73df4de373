//! Benchmarks for the time-domain transform
//!
//! Covers the three transform functions and the window settings on a full
//! sweep buffer.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use num_complex::Complex32;
use std::f32::consts::TAU;
use vna_core::constants::POINT_COUNT;
use vna_core::time_domain::{
    bessel0, Domain, DomainMode, TdFunction, TdWindow, TimeDomainTransformer,
};
use vna_core::{Channel, Measurement};

/// Sweep of a lossy delay line
fn create_delay_sweep() -> Measurement {
    let mut m = Measurement::new();
    for i in 0..POINT_COUNT {
        let phase = -TAU * i as f32 * 0.05;
        m.set_raw(Channel::Reflection, i, Complex32::from_polar(0.2, phase * 2.0))
            .unwrap();
        m.set_raw(Channel::Transmission, i, Complex32::from_polar(0.9, phase))
            .unwrap();
    }
    m
}

fn bench_functions(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_function");
    let sweep = create_delay_sweep();
    let mut td = TimeDomainTransformer::new();

    for function in [
        TdFunction::Bandpass,
        TdFunction::LowpassImpulse,
        TdFunction::LowpassStep,
    ] {
        let mode = DomainMode {
            domain: Domain::Time,
            function,
            window: TdWindow::Normal,
        };
        let id = BenchmarkId::from_parameter(format!("{:?}", function));
        group.bench_with_input(id, &mode, |b, mode| {
            b.iter(|| {
                let mut m = sweep.clone();
                td.transform(*mode, &mut m);
                black_box(m)
            })
        });
    }

    group.finish();
}

fn bench_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_comparison");
    let sweep = create_delay_sweep();
    let mut td = TimeDomainTransformer::new();

    for window in [TdWindow::Minimum, TdWindow::Normal, TdWindow::Maximum] {
        let mode = DomainMode {
            domain: Domain::Time,
            function: TdFunction::LowpassImpulse,
            window,
        };
        let id = BenchmarkId::from_parameter(format!("{:?}", window));
        group.bench_with_input(id, &mode, |b, mode| {
            b.iter(|| {
                let mut m = sweep.clone();
                td.transform(*mode, &mut m);
                black_box(m)
            })
        });
    }

    group.finish();
}

fn bench_bessel(c: &mut Criterion) {
    c.bench_function("bessel0", |b| {
        b.iter(|| {
            (0..POINT_COUNT)
                .map(|i| bessel0(black_box(i as f32 * 0.13)))
                .sum::<f32>()
        })
    });
}

criterion_group!(benches, bench_functions, bench_windows, bench_bessel);
criterion_main!(benches);
