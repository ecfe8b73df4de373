//! Trace and marker configuration
//!
//! Traces and markers are not drawn here; the engine only keeps their
//! configuration so it can be saved with a calibration slot, and keeps
//! marker positions consistent with the active frequency table.

use crate::constants::{MARKER_COUNT, TRACE_COUNT};
use crate::error::PersistError;
use crate::frequency::FrequencySet;
use crate::measurement::Channel;

/// Display format of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    LogMag = 0,
    Phase = 1,
    Delay = 2,
    Smith = 3,
    Polar = 4,
    Linear = 5,
    Swr = 6,
    Real = 7,
    Imag = 8,
    Resistance = 9,
    Reactance = 10,
    Off = 11,
}

impl TraceKind {
    const ALL: [TraceKind; 12] = [
        TraceKind::LogMag,
        TraceKind::Phase,
        TraceKind::Delay,
        TraceKind::Smith,
        TraceKind::Polar,
        TraceKind::Linear,
        TraceKind::Swr,
        TraceKind::Real,
        TraceKind::Imag,
        TraceKind::Resistance,
        TraceKind::Reactance,
        TraceKind::Off,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TraceKind::LogMag => "LOGMAG",
            TraceKind::Phase => "PHASE",
            TraceKind::Delay => "DELAY",
            TraceKind::Smith => "SMITH",
            TraceKind::Polar => "POLAR",
            TraceKind::Linear => "LINEAR",
            TraceKind::Swr => "SWR",
            TraceKind::Real => "REAL",
            TraceKind::Imag => "IMAG",
            TraceKind::Resistance => "R",
            TraceKind::Reactance => "X",
            TraceKind::Off => "OFF",
        }
    }
}

impl TryFrom<u8> for TraceKind {
    type Error = PersistError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(PersistError::InvalidField {
                field: "trace.kind",
                value: value as i64,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceConfig {
    pub enabled: bool,
    pub kind: TraceKind,
    pub channel: Channel,
    pub polar: bool,
    pub scale: f32,
    pub refpos: f32,
}

impl TraceConfig {
    const fn new(kind: TraceKind, channel: Channel, polar: bool, scale: f32, refpos: f32) -> Self {
        Self {
            enabled: true,
            kind,
            channel,
            polar,
            scale,
            refpos,
        }
    }
}

/// Power-on trace layout: S11 and S21 log magnitude, S11 Smith, S21 phase
pub const DEFAULT_TRACES: [TraceConfig; TRACE_COUNT] = [
    TraceConfig::new(TraceKind::LogMag, Channel::Reflection, false, 1.0, 7.0),
    TraceConfig::new(TraceKind::LogMag, Channel::Transmission, false, 1.0, 7.0),
    TraceConfig::new(TraceKind::Smith, Channel::Reflection, true, 1.0, 0.0),
    TraceConfig::new(TraceKind::Phase, Channel::Transmission, false, 1.0, 4.0),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Marker {
    pub enabled: bool,
    pub index: u16,
    pub frequency: u32,
}

/// Default markers, with frequencies taken from `frequencies`
pub fn default_markers(frequencies: &FrequencySet) -> [Marker; MARKER_COUNT] {
    let table = frequencies.table();
    let mk = |enabled, index: u16| Marker {
        enabled,
        index,
        frequency: table[index as usize],
    };
    [mk(true, 30), mk(false, 40), mk(false, 60), mk(false, 80)]
}

/// Re-snap enabled markers to the sweep point nearest their frequency.
///
/// Markers below the first point or at/after the last are pinned to that
/// end. Between two points, the lower index wins strictly below the midpoint.
pub fn update_marker_index(markers: &mut [Marker], frequencies: &FrequencySet) {
    let f = frequencies.f();
    let last = f.len() - 1;
    for marker in markers.iter_mut().filter(|m| m.enabled) {
        let target = marker.frequency;
        if target < f[0] {
            marker.index = 0;
            marker.frequency = f[0];
        } else if target >= f[last] {
            marker.index = last as u16;
            marker.frequency = f[last];
        } else if let Some(i) = f.windows(2).position(|w| w[0] <= target && target < w[1]) {
            let mid = ((f[i] as u64 + f[i + 1] as u64) / 2) as u32;
            let index = if target < mid { i } else { i + 1 };
            marker.index = index as u16;
        }
    }
}
