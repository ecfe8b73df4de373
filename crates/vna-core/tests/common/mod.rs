//! Simulated instrument for integration tests
//!
//! Models a two-port front-end with known, frequency dependent error terms
//! so that calibration and correction can be checked end to end.

#![allow(dead_code)]

use std::f32::consts::TAU;
use std::time::Duration;

use num_complex::Complex32;
use vna_core::calibration::open_model_inverse;
use vna_core::error::HardwareError;
use vna_core::{Channel, Hardware, SampleMode};

/// What is connected to the ports
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Connection {
    Open,
    Short,
    Load,
    Thru,
    /// Both ports terminated, for isolation
    Isolation,
    /// Fixed reflection and transmission at every frequency
    Dut { s11: Complex32, s21: Complex32 },
}

/// Error terms of the simulated front-end at `f`
pub struct TrueTerms {
    pub ed: Complex32,
    pub es: Complex32,
    pub er: Complex32,
    /// Forward transmission tracking (not inverted)
    pub et: Complex32,
    pub ex: Complex32,
}

pub fn true_terms(f: u32) -> TrueTerms {
    let x = f as f32 / 1e9;
    TrueTerms {
        ed: Complex32::new(0.05, 0.02) * (1.0 + 0.1 * x),
        es: Complex32::from_polar(0.1, TAU * 0.3 * x),
        er: Complex32::from_polar(0.9 - 0.1 * x, -TAU * 0.5 * x),
        et: Complex32::from_polar(0.8, -TAU * 0.7 * x),
        ex: Complex32::new(0.001, -0.0005),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Frequency(u32),
    Select(Channel),
    Wait(u32),
    Sample(Channel),
}

pub struct SimulatedVna {
    pub connection: Connection,
    pub frequency: u32,
    pub selected: Channel,
    /// Settling delay reported for every frequency change
    pub settle_ms: u32,
    /// Fail with a timeout on this sample call (counted from zero)
    pub fail_at: Option<usize>,
    pub samples: usize,
    pub calls: Vec<Call>,
}

impl Default for SimulatedVna {
    fn default() -> Self {
        Self {
            connection: Connection::Load,
            frequency: 0,
            selected: Channel::Reflection,
            settle_ms: 0,
            fail_at: None,
            samples: 0,
            calls: Vec::new(),
        }
    }
}

impl SimulatedVna {
    pub fn connected(connection: Connection) -> Self {
        Self {
            connection,
            ..Self::default()
        }
    }

    /// Actual (s11, s21) of the connection at `f`
    pub fn actual(&self, f: u32) -> (Complex32, Complex32) {
        let zero = Complex32::new(0.0, 0.0);
        match self.connection {
            Connection::Open => (open_model_inverse(f).inv(), zero),
            Connection::Short => (Complex32::new(-1.0, 0.0), zero),
            Connection::Load | Connection::Isolation => (zero, zero),
            Connection::Thru => (zero, Complex32::new(1.0, 0.0)),
            Connection::Dut { s11, s21 } => (s11, s21),
        }
    }

    /// Raw (s11m, s21m) the receivers see at `f`
    pub fn measured(&self, f: u32) -> (Complex32, Complex32) {
        let t = true_terms(f);
        let (s11, s21) = self.actual(f);
        let one = Complex32::new(1.0, 0.0);
        let s11m = t.ed + t.er * s11 / (one - t.es * s11);
        let s21m = t.ex + t.et * s21 / (one - t.es * s11);
        (s11m, s21m)
    }
}

impl Hardware for SimulatedVna {
    fn set_source_frequency(&mut self, frequency: u32) -> u32 {
        self.calls.push(Call::Frequency(frequency));
        self.frequency = frequency;
        self.settle_ms
    }

    fn select_channel(&mut self, channel: Channel) {
        self.calls.push(Call::Select(channel));
        self.selected = channel;
    }

    fn wait(&mut self, ms: u32) {
        self.calls.push(Call::Wait(ms));
    }

    fn sample(
        &mut self,
        channel: Channel,
        _mode: SampleMode,
        timeout: Duration,
    ) -> Result<Complex32, HardwareError> {
        self.calls.push(Call::Sample(channel));
        let n = self.samples;
        self.samples += 1;
        if self.fail_at == Some(n) {
            return Err(HardwareError::Timeout(timeout));
        }
        let (s11m, s21m) = self.measured(self.frequency);
        Ok(match channel {
            Channel::Reflection => s11m,
            Channel::Transmission => s21m,
        })
    }
}

/// Engine config that never sleeps
pub fn fast_config() -> vna_core::EngineConfig {
    vna_core::EngineConfig {
        pre_sweep_settle_ms: 0,
        idle_poll_ms: 1,
        ..Default::default()
    }
}
