//! Measurement engine
//!
//! One owning context holds the frequency plan, measurement buffer,
//! calibration and display settings behind a single mutex. The sweep holds
//! that mutex for its whole duration; every other operation takes it briefly
//! between sweeps, so no reader ever sees a half-updated table or buffer.
//!
//! Three flags live outside the lock so they can be flipped while a sweep is
//! running: continuous sweep enable, the one-shot request, and the
//! interruption request that stops a sweep at the next point boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use log::{debug, info, trace, warn};
use num_complex::Complex32;

use super::{Hardware, SampleMode, SweepOutcome};
use crate::calibration::{CalStandard, CalStatus, CalibrationStore};
use crate::config::EngineConfig;
use crate::constants::{
    MARKER_COUNT, POINT_COUNT, RAW_SCAN_MAX_COUNT, SAVEAREA_MAX, SETTLE_MAX_MS, SETTLE_MIN_MS,
    START_MIN, STOP_MAX, TRACE_COUNT,
};
use crate::delay::ElectricalDelay;
use crate::error::{CalibrationError, ConfigError, HardwareError};
use crate::frequency::{FrequencyPlan, FrequencySet, SweepParam, SweepRange};
use crate::measurement::{Channel, Measurement};
use crate::persist::{MemorySlots, SavedProperties, SlotStore};
use crate::time_domain::{Domain, DomainMode, TdFunction, TdWindow, TimeDomainTransformer};
use crate::trace::{default_markers, update_marker_index, Marker, TraceConfig, DEFAULT_TRACES};

const SCAN_POLL: Duration = Duration::from_millis(10);
const MAX_AVERAGE: u16 = 1000;

/// Consistent copy of the state a renderer needs
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub range: SweepRange,
    pub frequencies: FrequencySet,
    pub measured: Measurement,
    pub status: CalStatus,
    pub domain: DomainMode,
    pub electrical_delay: ElectricalDelay,
    pub traces: [TraceConfig; TRACE_COUNT],
    pub markers: [Marker; MARKER_COUNT],
    pub active_marker: usize,
}

/// Result of a bounded-range scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub frequencies: FrequencySet,
    pub measured: Measurement,
    pub outcome: SweepOutcome,
}

struct EngineState<H> {
    hardware: H,
    plan: FrequencyPlan,
    measured: Measurement,
    cal: CalibrationStore,
    electrical_delay: ElectricalDelay,
    domain: DomainMode,
    sample_mode: SampleMode,
    traces: [TraceConfig; TRACE_COUNT],
    markers: [Marker; MARKER_COUNT],
    active_marker: usize,
    velocity_factor: u8,
    transformer: TimeDomainTransformer,
    slots: Box<dyn SlotStore>,
    /// Slot the current settings were last saved to or recalled from,
    /// until the next edit
    committed_slot: Option<usize>,
    last_save_id: Option<usize>,
    last_outcome: Option<SweepOutcome>,
}

impl<H: Hardware> EngineState<H> {
    fn new(hardware: H, slots: Box<dyn SlotStore>) -> Self {
        let plan = FrequencyPlan::default();
        let markers = default_markers(plan.frequencies());
        Self {
            hardware,
            plan,
            measured: Measurement::new(),
            cal: CalibrationStore::new(),
            electrical_delay: ElectricalDelay::default(),
            domain: DomainMode::default(),
            sample_mode: SampleMode::default(),
            traces: DEFAULT_TRACES,
            markers,
            active_marker: 0,
            velocity_factor: 70,
            transformer: TimeDomainTransformer::new(),
            slots,
            committed_slot: None,
            last_save_id: None,
            last_outcome: None,
        }
    }

    /// Measure every point of the active table.
    ///
    /// With `break_on_interrupt`, the interruption flag is checked after each
    /// point and the sweep stops there, leaving later points untouched.
    fn sweep(
        &mut self,
        break_on_interrupt: bool,
        interrupt: &AtomicBool,
        timeout: Duration,
    ) -> Result<SweepOutcome, HardwareError> {
        let points = self.plan.frequencies().points();
        let apply = self.cal.is_applied();
        let mut degenerate = false;
        debug!(
            "Sweep started over {} points (correction {})",
            points,
            if apply { "on" } else { "off" }
        );

        for i in 0..points {
            let frequency = self.plan.frequencies().f()[i];
            let settle = self
                .hardware
                .set_source_frequency(frequency)
                .clamp(SETTLE_MIN_MS, SETTLE_MAX_MS);

            for channel in Channel::ALL {
                self.hardware.select_channel(channel);
                self.hardware.wait(settle);
                let value = self.hardware.sample(channel, self.sample_mode, timeout)?;
                self.measured.record(channel, i, value);
            }

            if apply {
                if let Err(e) = self.cal.apply_at(i, &mut self.measured) {
                    warn!("Skipping correction: {}", e);
                }
                let (s11, s21) = self.measured.pair(i);
                degenerate |= !(s11.is_finite() && s21.is_finite());
            }
            if !self.electrical_delay.is_zero() {
                self.electrical_delay
                    .apply_at(i, frequency, &mut self.measured);
            }
            trace!("Point {} at {} Hz done", i, frequency);

            if break_on_interrupt && interrupt.load(Ordering::Acquire) {
                warn!("Sweep interrupted after {} of {} points", i + 1, points);
                return Ok(SweepOutcome::Interrupted { completed: i + 1 });
            }
        }

        if degenerate {
            warn!("Error correction produced non-finite values in this sweep");
        }
        self.transformer.transform(self.domain, &mut self.measured);
        debug!("Sweep complete");
        Ok(SweepOutcome::Complete)
    }

    /// Leave the committed slot. Editing a recalled configuration drops it
    /// to the uncalibrated state.
    fn ensure_edit(&mut self) {
        if let Some(slot) = self.committed_slot.take() {
            self.cal.reset();
            debug!("Editing settings recalled from slot {}, calibration dropped", slot);
        }
    }

    fn update_markers(&mut self) {
        update_marker_index(&mut self.markers, self.plan.frequencies());
    }

    fn interpolate_from_slot(
        &mut self,
        slot: usize,
        harmonic_threshold: u32,
    ) -> Result<(), CalibrationError> {
        let props = match self.slots.load(slot) {
            Ok(Some(props)) => props,
            Ok(None) => {
                warn!("No calibration saved in slot {}", slot);
                return Err(CalibrationError::SlotNotFound(slot));
            }
            Err(e) => {
                warn!("Calibration in slot {} is unreadable: {}", slot, e);
                return Err(e.into());
            }
        };

        self.ensure_edit();
        self.cal.interpolate_from(
            props.status,
            &props.frequencies,
            &props.raw,
            &props.terms,
            self.plan.frequencies(),
            harmonic_threshold,
        );
        info!("Interpolated calibration from slot {}", slot);
        Ok(())
    }

    /// Follow a frequency table change with the last saved calibration
    fn auto_interpolate(&mut self, was_applied: bool, config: &EngineConfig) {
        if !(config.cal_auto_interpolate && was_applied) {
            return;
        }
        if let Some(slot) = self.last_save_id {
            // Failure is logged; the edit itself stands
            let _ = self.interpolate_from_slot(slot, config.harmonic_freq_threshold);
        }
    }

    fn properties(&self) -> SavedProperties {
        SavedProperties {
            range: self.plan.range(),
            points: self.plan.frequencies().points(),
            status: self.cal.status(),
            frequencies: self.plan.frequencies().clone(),
            terms: self.cal.terms().clone(),
            raw: self.cal.raw().clone(),
            electrical_delay: self.electrical_delay,
            traces: self.traces,
            markers: self.markers,
            active_marker: self.active_marker,
            domain: self.domain,
            velocity_factor: self.velocity_factor,
        }
    }

    fn restore(&mut self, props: SavedProperties) {
        self.plan.restore(props.range, props.frequencies);
        self.cal = CalibrationStore::from_parts(props.status, props.raw, props.terms);
        self.electrical_delay = props.electrical_delay;
        self.traces = props.traces;
        self.markers = props.markers;
        self.active_marker = props.active_marker;
        self.domain = props.domain;
        self.velocity_factor = props.velocity_factor;
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            range: self.plan.range(),
            frequencies: self.plan.frequencies().clone(),
            measured: self.measured.clone(),
            status: self.cal.status(),
            domain: self.domain,
            electrical_delay: self.electrical_delay,
            traces: self.traces,
            markers: self.markers,
            active_marker: self.active_marker,
        }
    }
}

/// Sweep and calibration context shared between the worker and its callers
pub struct MeasurementEngine<H> {
    state: Mutex<EngineState<H>>,
    sweep_enabled: AtomicBool,
    sweep_once: AtomicBool,
    interrupt: AtomicBool,
    config: EngineConfig,
}

impl<H: Hardware> MeasurementEngine<H> {
    pub fn new(hardware: H, slots: Box<dyn SlotStore>, config: EngineConfig) -> Self {
        Self {
            state: Mutex::new(EngineState::new(hardware, slots)),
            sweep_enabled: AtomicBool::new(true),
            sweep_once: AtomicBool::new(false),
            interrupt: AtomicBool::new(false),
            config,
        }
    }

    /// Engine with in-memory slots and the default configuration
    pub fn with_defaults(hardware: H) -> Self {
        Self::new(hardware, Box::new(MemorySlots::new()), EngineConfig::default())
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, EngineState<H>> {
        // State is only replaced wholesale under the lock, so a panic in a
        // holder cannot leave it torn
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` on the hardware backend under the engine lock
    pub fn with_hardware_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.lock().hardware)
    }

    // ---- sweep control ----

    /// One iteration of the worker loop.
    ///
    /// Sweeps if continuous sweep is enabled or a one-shot sweep is pending,
    /// otherwise idles for `idle_poll_ms`. The service phase that follows
    /// clears any pending interruption. Returns `Ok(None)` when idle.
    pub fn service_once(&self) -> Result<Option<SweepOutcome>, HardwareError> {
        let result = if self.sweep_enabled.load(Ordering::Acquire)
            || self.sweep_once.load(Ordering::Acquire)
        {
            let mut st = self.lock();
            thread::sleep(self.config.pre_sweep_settle());
            let result = st.sweep(true, &self.interrupt, self.config.sample_timeout());
            st.last_outcome = result.as_ref().ok().copied();
            self.sweep_once.store(false, Ordering::Release);
            result.map(Some)
        } else {
            thread::sleep(self.config.idle_poll());
            Ok(None)
        };

        let _st = self.lock();
        self.interrupt.store(false, Ordering::Release);
        result
    }

    /// Sweep immediately on the calling thread
    pub fn sweep_now(&self, break_on_interrupt: bool) -> Result<SweepOutcome, HardwareError> {
        let mut st = self.lock();
        let result = st.sweep(
            break_on_interrupt,
            &self.interrupt,
            self.config.sample_timeout(),
        );
        st.last_outcome = result.as_ref().ok().copied();
        result
    }

    pub fn pause(&self) {
        self.sweep_enabled.store(false, Ordering::Release);
    }

    /// Restore the committed frequency table and resume continuous sweep
    pub fn resume(&self) {
        {
            let mut st = self.lock();
            let applied = st.cal.is_applied();
            st.plan.regenerate();
            st.update_markers();
            st.auto_interpolate(applied, &self.config);
        }
        self.sweep_enabled.store(true, Ordering::Release);
    }

    pub fn toggle_sweep(&self) {
        self.sweep_enabled.fetch_xor(true, Ordering::AcqRel);
    }

    #[inline]
    pub fn is_sweeping(&self) -> bool {
        self.sweep_enabled.load(Ordering::Acquire)
    }

    /// Ask a running sweep to stop at the next point boundary
    pub fn request_interrupt(&self) {
        self.interrupt.store(true, Ordering::Release);
    }

    /// Pause continuous sweep and program a single source frequency
    pub fn tune(&self, frequency: u32) -> u32 {
        self.pause();
        self.lock().hardware.set_source_frequency(frequency)
    }

    /// Sweep `start..=stop` once and wait for the result.
    ///
    /// Continuous sweep is paused and stays paused; `resume` restores the
    /// committed table. The sweep itself runs on the worker, so a worker must
    /// be servicing this engine.
    pub fn scan_and_wait(
        &self,
        start: u32,
        stop: u32,
        points: usize,
        timeout: Duration,
    ) -> anyhow::Result<ScanResult> {
        FrequencySet::generate(start, stop, points).context("Invalid scan parameters")?;

        self.pause();
        {
            let mut st = self.lock();
            let applied = st.cal.is_applied();
            st.plan.set_table(start, stop, points)?;
            st.update_markers();
            st.auto_interpolate(applied, &self.config);
            st.last_outcome = None;
            self.sweep_once.store(true, Ordering::Release);
        }

        let deadline = Instant::now() + timeout;
        while self.sweep_once.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                self.sweep_once.store(false, Ordering::Release);
                bail!("Scan did not complete within {:?}", timeout);
            }
            thread::sleep(SCAN_POLL);
        }

        let st = self.lock();
        let outcome = st
            .last_outcome
            .context("Scan sweep was aborted by a hardware error")?;
        Ok(ScanResult {
            frequencies: st.plan.frequencies().clone(),
            measured: st.measured.clone(),
            outcome,
        })
    }

    /// Raw samples on one channel from `start` in `step` increments,
    /// averaged over `average` detections per frequency
    pub fn scan_raw(
        &self,
        channel: Channel,
        start: u32,
        step: u32,
        count: usize,
        average: u16,
    ) -> anyhow::Result<Vec<Complex32>> {
        if count == 0 || count > RAW_SCAN_MAX_COUNT {
            return Err(ConfigError::InvalidScanCount(count).into());
        }
        let end = start as u64 + step as u64 * count as u64;
        if start < START_MIN || end > STOP_MAX as u64 {
            return Err(ConfigError::InvalidRange {
                start,
                stop: end.min(u32::MAX as u64) as u32,
            }
            .into());
        }
        if average == 0 || average > MAX_AVERAGE {
            return Err(ConfigError::InvalidAverage(average).into());
        }

        let mut st = self.lock();
        thread::sleep(self.config.pre_sweep_settle());
        let timeout = self.config.sample_timeout();
        let mut out = Vec::with_capacity(count.min(POINT_COUNT));
        for k in 0..count {
            let frequency = start + step * k as u32;
            let settle = st
                .hardware
                .set_source_frequency(frequency)
                .clamp(SETTLE_MIN_MS, SETTLE_MAX_MS);
            st.hardware.select_channel(channel);
            st.hardware.wait(settle);

            let mode = st.sample_mode;
            let mut acc = Complex32::new(0.0, 0.0);
            for _ in 0..average {
                st.hardware.wait(1);
                acc += st
                    .hardware
                    .sample(channel, mode, timeout)
                    .with_context(|| format!("Raw sample at {} Hz failed", frequency))?;
            }
            out.push(acc / average as f32);
        }
        Ok(out)
    }

    // ---- frequency plan ----

    /// Apply a sweep setter with clamping, then re-snap markers and, if
    /// correction was on, re-interpolate the last saved calibration
    pub fn set_sweep_frequency(&self, param: SweepParam, hz: u32) {
        let mut st = self.lock();
        let applied = st.cal.is_applied();
        st.ensure_edit();
        st.plan.set(param, hz);
        st.update_markers();
        st.auto_interpolate(applied, &self.config);
    }

    pub fn get_sweep_frequency(&self, param: SweepParam) -> u32 {
        self.lock().plan.get(param)
    }

    pub fn set_sweep_points(&self, points: usize) -> Result<(), ConfigError> {
        let mut st = self.lock();
        let applied = st.cal.is_applied();
        st.plan.set_points(points)?;
        st.ensure_edit();
        st.update_markers();
        st.auto_interpolate(applied, &self.config);
        Ok(())
    }

    pub fn frequencies(&self) -> FrequencySet {
        self.lock().plan.frequencies().clone()
    }

    // ---- calibration ----

    /// Copy the current measurement of `standard` into calibration storage
    pub fn collect(&self, standard: CalStandard) {
        let mut st = self.lock();
        st.ensure_edit();
        let EngineState { cal, measured, .. } = &mut *st;
        cal.collect(standard, measured);
    }

    /// Derive error terms from the collected standards and enable correction
    pub fn done(&self) {
        let mut st = self.lock();
        st.ensure_edit();
        let EngineState { cal, plan, .. } = &mut *st;
        cal.done(plan.frequencies());
    }

    pub fn set_correction(&self, on: bool) {
        self.lock().cal.set_correction(on);
    }

    pub fn reset_calibration(&self) {
        self.lock().cal.reset();
        info!("Calibration reset");
    }

    pub fn calibration_status(&self) -> CalStatus {
        self.lock().cal.status()
    }

    pub fn calibration(&self) -> CalibrationStore {
        self.lock().cal.clone()
    }

    // ---- corrections and display settings ----

    pub fn set_electrical_delay(&self, picoseconds: f32) {
        self.lock().electrical_delay = ElectricalDelay(picoseconds);
    }

    pub fn electrical_delay(&self) -> ElectricalDelay {
        self.lock().electrical_delay
    }

    pub fn set_domain_mode(&self, mode: DomainMode) {
        self.lock().domain = mode;
    }

    pub fn domain_mode(&self) -> DomainMode {
        self.lock().domain
    }

    pub fn set_domain(&self, domain: Domain) {
        self.lock().domain.domain = domain;
    }

    pub fn set_td_function(&self, function: TdFunction) {
        self.lock().domain.function = function;
    }

    pub fn set_td_window(&self, window: TdWindow) {
        self.lock().domain.window = window;
    }

    pub fn set_sample_mode(&self, mode: SampleMode) {
        self.lock().sample_mode = mode;
    }

    pub fn set_velocity_factor(&self, percent: u8) {
        self.lock().velocity_factor = percent;
    }

    pub fn set_trace(&self, index: usize, trace: TraceConfig) -> Result<(), ConfigError> {
        let mut st = self.lock();
        let slot = st.traces.get_mut(index).ok_or(ConfigError::InvalidIndex {
            what: "Trace",
            index,
        })?;
        *slot = trace;
        Ok(())
    }

    /// Place a marker at its frequency, snapped to the nearest sweep point
    pub fn set_marker(&self, index: usize, marker: Marker) -> Result<(), ConfigError> {
        let mut st = self.lock();
        let slot = st.markers.get_mut(index).ok_or(ConfigError::InvalidIndex {
            what: "Marker",
            index,
        })?;
        *slot = marker;
        st.active_marker = index;
        st.update_markers();
        Ok(())
    }

    // ---- persistence ----

    fn check_slot(slot: usize) -> Result<(), ConfigError> {
        if slot >= SAVEAREA_MAX {
            return Err(ConfigError::InvalidSlot(slot));
        }
        Ok(())
    }

    /// Save the current settings and calibration into `slot`
    pub fn save(&self, slot: usize) -> Result<(), CalibrationError> {
        Self::check_slot(slot)?;
        let mut st = self.lock();
        let props = st.properties();
        st.slots.save(slot, &props)?;
        st.committed_slot = Some(slot);
        st.last_save_id = Some(slot);
        info!("Saved calibration to slot {} [{}]", slot, props.status);
        Ok(())
    }

    /// Replace the current settings and calibration with `slot`.
    ///
    /// On failure nothing is changed.
    pub fn recall(&self, slot: usize) -> Result<(), CalibrationError> {
        Self::check_slot(slot)?;
        let mut st = self.lock();
        let props = st
            .slots
            .load(slot)?
            .ok_or(CalibrationError::SlotNotFound(slot))?;
        st.restore(props);
        st.committed_slot = Some(slot);
        st.last_save_id = Some(slot);
        info!("Recalled slot {} [{}]", slot, st.cal.status());
        Ok(())
    }

    /// Remap the calibration saved in `slot` onto the active frequency table
    pub fn interpolate_from(&self, slot: usize) -> Result<(), CalibrationError> {
        Self::check_slot(slot)?;
        self.lock()
            .interpolate_from_slot(slot, self.config.harmonic_freq_threshold)
    }

    // ---- readers ----

    pub fn snapshot(&self) -> EngineSnapshot {
        self.lock().snapshot()
    }

    pub fn measured(&self) -> Measurement {
        self.lock().measured.clone()
    }
}

/// Run the worker loop on a thread named "sweep" until `shutdown` is set
pub fn spawn_worker<H: Hardware + 'static>(
    engine: Arc<MeasurementEngine<H>>,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sweep".to_string())
        .spawn(move || {
            info!("Sweep worker started");
            while !shutdown.load(Ordering::Acquire) {
                if let Err(e) = engine.service_once() {
                    warn!("Sweep aborted: {}", e);
                }
            }
            info!("Sweep worker stopped");
        })
}
