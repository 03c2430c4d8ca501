//! Wave intensity analysis of one beat of simultaneous pressure and flow.
//!
//! [`WiaData`] runs the whole pipeline when it is built and again, in full, whenever its raw
//! data is replaced or reverted. There is no partially analysed state: a failed run leaves
//! the previous analysis in place.

pub mod analysis;
pub mod cmd;
pub mod wave;

pub use analysis::{Separated, BLOOD_DENSITY};
pub use cmd::{CmdInputs, CmdStatus};
pub use wave::{Wave, WaveDirection, WaveType};

use crate::error::{invalid, Result, WiaError};
use crate::signal::units::PA_PER_MMHG;
use crate::signal::{mean, Flag, HemoData, SignalKind, Unit, MIN_CYCLE_MS};
use serde::{Deserialize, Serialize};

pub const NET_INTENSITY: &str = "Net wave intensity";
pub const FORWARD_INTENSITY: &str = "Forward wave intensity";
pub const BACKWARD_INTENSITY: &str = "Backward wave intensity";
pub const FORWARD_FLOW: &str = "Forward flow derivative";
pub const BACKWARD_FLOW: &str = "Backward flow derivative";

/// Suggested waves extend while intensity stays above this fraction of their extreme.
const SUGGESTION_FRACTION: f64 = 0.1;

/// Everything derived from one raw store.
#[derive(Debug, Clone)]
struct Analysis {
    /// Raw data in seconds, Pa and m/s, with derivative and differential caches.
    data: HemoData,
    pressure: String,
    flow: String,
    net: Vec<f64>,
    intensity: Separated,
    flow_split: Separated,
    net_store: HemoData,
    intensity_store: HemoData,
    flow_store: HemoData,
    rho_c: f64,
    wave_speed: f64,
    pressure_mmhg: Vec<f64>,
    flow_cm_s: Vec<f64>,
    dt: f64,
}

impl Analysis {
    fn run(raw: &HemoData, density: f64) -> Result<Self> {
        let mut data = raw.clone();
        let pressure = channel_of_kind(&data, SignalKind::Pressure)?;
        let flow = channel_of_kind(&data, SignalKind::Flow)?;
        if data.len() < 2 {
            return Err(invalid(format!(
                "'{}' needs at least two samples for wave intensity",
                data.name()
            )));
        }
        normalize_x(&mut data)?;
        normalize_y(&mut data, &pressure, Unit::Pascals)?;
        normalize_y(&mut data, &flow, Unit::MetersPerSecond)?;

        let dp = data.calculate_derivative(&pressure, None)?.to_vec();
        data.calculate_differential(&pressure)?;
        let du = data.calculate_derivative(&flow, None)?.to_vec();
        data.calculate_differential(&flow)?;

        let rho_c = analysis::rho_c(&dp, &du);
        if !rho_c.is_finite() {
            log::warn!(
                "flow derivative of '{}' carries no energy; rho*c is {rho_c}",
                data.name()
            );
        }
        let net = analysis::net_intensity(&dp, &du);
        let intensity = analysis::separated_intensity(&dp, &du, rho_c);
        let flow_split = analysis::separated_flow_derivative(&dp, &du, rho_c);

        let net_store = derived_store(&data, "Net intensity", &[(NET_INTENSITY, &net)])?;
        let intensity_store = derived_store(
            &data,
            "Separated intensity",
            &[
                (FORWARD_INTENSITY, &intensity.forward),
                (BACKWARD_INTENSITY, &intensity.backward),
            ],
        )?;
        let flow_store = derived_store(
            &data,
            "Separated flow derivative",
            &[
                (FORWARD_FLOW, &flow_split.forward),
                (BACKWARD_FLOW, &flow_split.backward),
            ],
        )?;

        let pressure_mmhg = data.y(&pressure)?.iter().map(|p| p / PA_PER_MMHG).collect();
        let flow_cm_s = data.y(&flow)?.iter().map(|u| u * 100.0).collect();
        let dt = data.average_sample_interval()?;
        Ok(Self {
            pressure,
            flow,
            net,
            intensity,
            flow_split,
            net_store,
            intensity_store,
            flow_store,
            rho_c,
            wave_speed: analysis::wave_speed(rho_c, density),
            pressure_mmhg,
            flow_cm_s,
            dt,
            data,
        })
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    /// Fill in a wave's statistics; false when the wave does not fit this data.
    fn measure(&self, wave: &mut Wave) -> bool {
        if wave.end_index() >= self.len() {
            return false;
        }
        let series = if wave.is_proximal() {
            &self.intensity.forward
        } else {
            &self.intensity.backward
        };
        let Some((idx, peak)) = analysis::signed_peak(series, wave.start_index(), wave.end_index())
        else {
            return false;
        };
        let cumulative =
            analysis::cumulative_intensity(series, wave.start_index(), wave.end_index(), self.dt);
        wave.set_statistics(peak, self.data.x()[idx], cumulative);
        true
    }
}

fn channel_of_kind(data: &HemoData, kind: SignalKind) -> Result<String> {
    data.first_of_kind(kind)
        .map(|h| h.name().to_string())
        .ok_or_else(|| {
            invalid(format!(
                "'{}' has no channel flagged as {}",
                data.name(),
                kind.label()
            ))
        })
}

fn normalize_x(data: &mut HemoData) -> Result<()> {
    let header = data
        .x_header()
        .map(|h| h.name().to_string())
        .ok_or_else(|| invalid(format!("'{}' has no time domain", data.name())))?;
    if data.x_unit().is_none() {
        log::warn!("time domain '{header}' has no unit; assuming seconds");
        data.add_flags(&header, [Flag::Unit(Unit::Seconds)])?;
    }
    data.convert_x_units(Unit::Seconds)
}

fn normalize_y(data: &mut HemoData, header: &str, si: Unit) -> Result<()> {
    match data.unit_of(header) {
        Some(_) => data.convert_y_units(header, si),
        None => {
            log::warn!("channel '{header}' has no unit; assuming {si}");
            data.add_flags(header, [Flag::Unit(si)])
        }
    }
}

fn derived_store(source: &HemoData, name: &str, channels: &[(&str, &Vec<f64>)]) -> Result<HemoData> {
    let mut store = source.blank_copy(name);
    if let Some(header) = source.x_header() {
        store.set_x(
            header.clone(),
            source.x().to_vec(),
            source.x_flags().cloned().unwrap_or_default(),
        )?;
    }
    for (header, values) in channels {
        store.add_y(*header, values.to_vec(), [])?;
    }
    Ok(store)
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Analysed beat: raw data, derived series, scalar haemodynamics and identified waves.
#[derive(Debug, Clone)]
pub struct WiaData {
    name: String,
    density: f64,
    raw: HemoData,
    original: Option<HemoData>,
    analysis: Analysis,
    systole: Option<usize>,
    diastole: Option<usize>,
    cmd: CmdInputs,
    waves: Vec<Wave>,
}

impl WiaData {
    /// Analyse `raw`, which must carry one channel flagged as pressure and one as flow.
    pub fn new(name: impl Into<String>, raw: HemoData) -> Result<Self> {
        Self::with_density(name, raw, BLOOD_DENSITY)
    }

    pub fn with_density(name: impl Into<String>, raw: HemoData, density: f64) -> Result<Self> {
        if !(density.is_finite() && density > 0.0) {
            return Err(invalid(format!("density must be positive, got {density}")));
        }
        let analysis = Analysis::run(&raw, density)?;
        Ok(Self {
            name: name.into(),
            density,
            raw,
            original: None,
            analysis,
            systole: None,
            diastole: None,
            cmd: CmdInputs::default(),
            waves: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    /// The data as supplied.
    pub fn raw_data(&self) -> &HemoData {
        &self.raw
    }

    /// Data kept for [`revert_to_original_hemo_data`](Self::revert_to_original_hemo_data).
    pub fn original_data(&self) -> Option<&HemoData> {
        self.original.as_ref()
    }

    /// Raw data converted to seconds, Pa and m/s, with derivatives and differentials cached.
    pub fn analyzed_data(&self) -> &HemoData {
        &self.analysis.data
    }

    pub fn pressure_header(&self) -> &str {
        &self.analysis.pressure
    }

    pub fn flow_header(&self) -> &str {
        &self.analysis.flow
    }

    /// Sample times in seconds.
    pub fn time(&self) -> &[f64] {
        self.analysis.data.x()
    }

    pub fn len(&self) -> usize {
        self.analysis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn net_intensity(&self) -> &[f64] {
        &self.analysis.net
    }

    pub fn forward_intensity(&self) -> &[f64] {
        &self.analysis.intensity.forward
    }

    pub fn backward_intensity(&self) -> &[f64] {
        &self.analysis.intensity.backward
    }

    pub fn forward_flow_derivative(&self) -> &[f64] {
        &self.analysis.flow_split.forward
    }

    pub fn backward_flow_derivative(&self) -> &[f64] {
        &self.analysis.flow_split.backward
    }

    pub fn net_intensity_data(&self) -> &HemoData {
        &self.analysis.net_store
    }

    pub fn separated_intensity_data(&self) -> &HemoData {
        &self.analysis.intensity_store
    }

    pub fn separated_flow_derivative_data(&self) -> &HemoData {
        &self.analysis.flow_store
    }

    /// Characteristic impedance ρc (kg·m⁻²·s⁻¹).
    pub fn rho_c(&self) -> f64 {
        self.analysis.rho_c
    }

    /// Single-point wave speed (m/s).
    pub fn wave_speed(&self) -> f64 {
        self.analysis.wave_speed
    }

    /// Pressure in mmHg.
    pub fn pressure_mmhg(&self) -> &[f64] {
        &self.analysis.pressure_mmhg
    }

    /// Flow velocity in cm/s.
    pub fn flow_cm_s(&self) -> &[f64] {
        &self.analysis.flow_cm_s
    }

    pub fn avg_pressure(&self) -> f64 {
        mean(&self.analysis.pressure_mmhg)
    }

    pub fn min_pressure(&self) -> f64 {
        min_max(&self.analysis.pressure_mmhg).0
    }

    pub fn max_pressure(&self) -> f64 {
        min_max(&self.analysis.pressure_mmhg).1
    }

    pub fn avg_flow(&self) -> f64 {
        mean(&self.analysis.flow_cm_s)
    }

    pub fn min_flow(&self) -> f64 {
        min_max(&self.analysis.flow_cm_s).0
    }

    pub fn max_flow(&self) -> f64 {
        min_max(&self.analysis.flow_cm_s).1
    }

    pub fn systole(&self) -> Option<usize> {
        self.systole
    }

    pub fn diastole(&self) -> Option<usize> {
        self.diastole
    }

    pub fn systole_time(&self) -> Option<f64> {
        self.systole.map(|i| self.time()[i])
    }

    pub fn diastole_time(&self) -> Option<f64> {
        self.diastole.map(|i| self.time()[i])
    }

    /// Mark the samples picked as systole and diastole.
    pub fn set_systole_diastole(
        &mut self,
        systole: Option<usize>,
        diastole: Option<usize>,
    ) -> Result<()> {
        let len = self.len();
        for idx in [systole, diastole].into_iter().flatten() {
            if idx >= len {
                return Err(invalid(format!("marker index {idx} outside 0..{len}")));
            }
        }
        self.systole = systole;
        self.diastole = diastole;
        Ok(())
    }

    /// Mean pressure (mmHg) over mean flow (cm/s).
    pub fn resistance(&self) -> f64 {
        analysis::resistance(self.avg_pressure(), self.avg_flow())
    }

    /// Resistance at the systole marker; NaN when it is unset.
    pub fn systolic_resistance(&self) -> f64 {
        self.point_resistance(self.systole)
    }

    /// Resistance at the diastole marker; NaN when it is unset.
    pub fn diastolic_resistance(&self) -> f64 {
        self.point_resistance(self.diastole)
    }

    fn point_resistance(&self, idx: Option<usize>) -> f64 {
        match idx {
            Some(i) => analysis::resistance(
                self.analysis.pressure_mmhg[i],
                self.analysis.flow_cm_s[i],
            ),
            None => f64::NAN,
        }
    }

    /// Area under the whole forward intensity series.
    pub fn forward_cumulative_intensity(&self) -> f64 {
        let series = &self.analysis.intensity.forward;
        analysis::cumulative_intensity(series, 0, series.len() - 1, self.analysis.dt)
    }

    /// Area under the whole backward intensity series.
    pub fn backward_cumulative_intensity(&self) -> f64 {
        let series = &self.analysis.intensity.backward;
        analysis::cumulative_intensity(series, 0, series.len() - 1, self.analysis.dt)
    }

    /// Sum of the cumulative intensities of all proximal waves.
    pub fn proximal_cumulative_intensity(&self) -> f64 {
        self.wave_sum(WaveDirection::Proximal)
    }

    /// Sum of the cumulative intensities of all distal waves.
    pub fn distal_cumulative_intensity(&self) -> f64 {
        self.wave_sum(WaveDirection::Distal)
    }

    fn wave_sum(&self, direction: WaveDirection) -> f64 {
        self.waves
            .iter()
            .filter(|w| w.direction() == direction)
            .filter_map(Wave::cumulative_intensity)
            .sum()
    }

    pub fn cmd_inputs(&self) -> CmdInputs {
        self.cmd
    }

    pub fn set_cmd_inputs(&mut self, inputs: CmdInputs) {
        self.cmd = inputs;
    }

    pub fn set_cfr(&mut self, cfr: Option<f64>) {
        self.cmd.cfr = cfr;
    }

    pub fn set_hmr(&mut self, hmr: Option<f64>) {
        self.cmd.hmr = hmr;
    }

    pub fn set_ach_percent(&mut self, ach: Option<f64>) {
        self.cmd.ach_percent = ach;
    }

    pub fn cmd_status(&self) -> CmdStatus {
        self.cmd.classify()
    }

    /// Span of the beat in ms, or `None` when shorter than a plausible cycle.
    pub fn cycle_duration_ms(&self) -> Option<f64> {
        let t = self.time();
        let span = (t.last()? - t.first()?) * 1000.0;
        (span >= MIN_CYCLE_MS).then_some(span)
    }

    pub fn waves(&self) -> &[Wave] {
        &self.waves
    }

    pub fn wave(&self, name: &str) -> Option<&Wave> {
        self.waves.iter().find(|w| w.name() == name)
    }

    /// Add a wave and measure it. Names are unique; bounds must lie within the beat.
    pub fn add_wave(&mut self, mut wave: Wave) -> Result<()> {
        if self.waves.contains(&wave) {
            return Err(invalid(format!("a wave named '{}' already exists", wave.name())));
        }
        if !self.analysis.measure(&mut wave) {
            return Err(invalid(format!(
                "wave '{}' ends at {} beyond the {} samples of '{}'",
                wave.name(),
                wave.end_index(),
                self.len(),
                self.name
            )));
        }
        self.waves.push(wave);
        Ok(())
    }

    pub fn remove_wave(&mut self, name: &str) -> Option<Wave> {
        let idx = self.waves.iter().position(|w| w.name() == name)?;
        Some(self.waves.remove(idx))
    }

    pub fn clear_waves(&mut self) {
        self.waves.clear();
    }

    /// Replace the raw data and rerun the pipeline. The data this object was built with is
    /// kept as the rollback point. Waves or markers that no longer fit are dropped.
    pub fn set_new_hemo_data(&mut self, data: HemoData) -> Result<()> {
        let analysis = Analysis::run(&data, self.density)?;
        let previous = std::mem::replace(&mut self.raw, data);
        if self.original.is_none() {
            self.original = Some(previous);
        }
        self.install(analysis);
        Ok(())
    }

    /// Go back to the data this object was built with.
    pub fn revert_to_original_hemo_data(&mut self) -> Result<()> {
        let original = self.original.as_ref().ok_or_else(|| {
            WiaError::IllegalState(format!("'{}' has no original data to revert to", self.name))
        })?;
        let analysis = Analysis::run(original, self.density)?;
        if let Some(original) = self.original.take() {
            self.raw = original;
        }
        self.install(analysis);
        Ok(())
    }

    pub(crate) fn set_original(&mut self, original: Option<HemoData>) {
        self.original = original;
    }

    fn install(&mut self, analysis: Analysis) {
        self.analysis = analysis;
        let len = self.len();
        if self.systole.is_some_and(|i| i >= len) {
            self.systole = None;
        }
        if self.diastole.is_some_and(|i| i >= len) {
            self.diastole = None;
        }
        let analysis = &self.analysis;
        self.waves.retain_mut(|wave| {
            let fits = analysis.measure(wave);
            if !fits {
                log::warn!(
                    "dropping wave '{}' ({}..={}) which no longer fits {} samples",
                    wave.name(),
                    wave.start_index(),
                    wave.end_index(),
                    len
                );
            }
            fits
        });
    }

    /// Propose the dominant forward and backward waves. Nothing is added.
    ///
    /// Each suggestion spans the samples around the extreme of its intensity series that stay
    /// above a tenth of that extreme. A backward wave peaking after the pressure maximum is
    /// classed as a late expansion wave, otherwise as an early compression wave.
    pub fn suggest_waves(&self) -> Vec<Wave> {
        let t = self.time();
        let mut out = Vec::new();
        if let Some((start, _, end)) = excursion(&self.analysis.intensity.forward) {
            out.extend(
                Wave::classified(
                    WaveType::EarlyForwardCompression.abbreviation(),
                    WaveType::EarlyForwardCompression,
                    (start, end),
                    (t[start], t[end]),
                )
                .ok(),
            );
        }
        if let Some((start, peak, end)) = excursion(&self.analysis.intensity.backward) {
            let pressure_peak = self
                .analysis
                .pressure_mmhg
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let wave_type = if peak > pressure_peak {
                WaveType::LateBackwardExpansion
            } else {
                WaveType::EarlyBackwardCompression
            };
            out.extend(
                Wave::classified(wave_type.abbreviation(), wave_type, (start, end), (t[start], t[end]))
                    .ok(),
            );
        }
        out
    }

    /// Scalars and waves in serialisable form; undefined values become `None`.
    pub fn summary(&self) -> WiaSummary {
        WiaSummary {
            name: self.name.clone(),
            samples: self.len(),
            wave_speed: finite(self.wave_speed()),
            rho_c: finite(self.rho_c()),
            avg_pressure_mmhg: finite(self.avg_pressure()),
            min_pressure_mmhg: finite(self.min_pressure()),
            max_pressure_mmhg: finite(self.max_pressure()),
            avg_flow_cm_s: finite(self.avg_flow()),
            min_flow_cm_s: finite(self.min_flow()),
            max_flow_cm_s: finite(self.max_flow()),
            systole_time: self.systole_time(),
            diastole_time: self.diastole_time(),
            resistance: finite(self.resistance()),
            systolic_resistance: finite(self.systolic_resistance()),
            diastolic_resistance: finite(self.diastolic_resistance()),
            forward_cumulative_intensity: finite(self.forward_cumulative_intensity()),
            backward_cumulative_intensity: finite(self.backward_cumulative_intensity()),
            proximal_cumulative_intensity: finite(self.proximal_cumulative_intensity()),
            distal_cumulative_intensity: finite(self.distal_cumulative_intensity()),
            cycle_duration_ms: self.cycle_duration_ms(),
            cmd_inputs: self.cmd,
            cmd: self.cmd_status(),
            waves: self.waves.clone(),
        }
    }
}

/// `(start, extreme, end)` of the excursion around the largest magnitude sample.
fn excursion(series: &[f64]) -> Option<(usize, usize, usize)> {
    let (peak, value) = analysis::signed_peak(series, 0, series.len().checked_sub(1)?)?;
    if value == 0.0 || !value.is_finite() {
        return None;
    }
    let limit = SUGGESTION_FRACTION * value.abs();
    let mut start = peak;
    while start > 0 && series[start - 1].abs() > limit {
        start -= 1;
    }
    let mut end = peak;
    while end + 1 < series.len() && series[end + 1].abs() > limit {
        end += 1;
    }
    Some((start, peak, end))
}

/// Scalar results of one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WiaSummary {
    pub name: String,
    pub samples: usize,
    pub wave_speed: Option<f64>,
    pub rho_c: Option<f64>,
    pub avg_pressure_mmhg: Option<f64>,
    pub min_pressure_mmhg: Option<f64>,
    pub max_pressure_mmhg: Option<f64>,
    pub avg_flow_cm_s: Option<f64>,
    pub min_flow_cm_s: Option<f64>,
    pub max_flow_cm_s: Option<f64>,
    pub systole_time: Option<f64>,
    pub diastole_time: Option<f64>,
    pub resistance: Option<f64>,
    pub systolic_resistance: Option<f64>,
    pub diastolic_resistance: Option<f64>,
    pub forward_cumulative_intensity: Option<f64>,
    pub backward_cumulative_intensity: Option<f64>,
    pub proximal_cumulative_intensity: Option<f64>,
    pub distal_cumulative_intensity: Option<f64>,
    pub cycle_duration_ms: Option<f64>,
    pub cmd_inputs: CmdInputs,
    pub cmd: CmdStatus,
    pub waves: Vec<Wave>,
}
