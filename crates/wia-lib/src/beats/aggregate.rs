use super::{Beat, BeatId};
use crate::error::{invalid, Result};
use crate::signal::ensemble::{fit_length, pointwise_mean};
use crate::signal::{EnsembleMode, Fiducials, Flag, HemoData, SignalKind, Unit};

/// Windows this short or shorter are not beats.
pub const MIN_BEAT_SAMPLES: usize = 3;
/// Largest difference in average sample interval tolerated between ensembled beats.
pub const INTERVAL_TOLERANCE: f64 = 1e-4;

/// Crops recordings into beats and combines beats; owns the id sequence of every beat it makes.
#[derive(Debug, Default)]
pub struct BeatAggregator {
    next_id: u64,
}

impl BeatAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&mut self) -> BeatId {
        let id = BeatId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Beat over `[from, to)` of `data`.
    pub fn crop(&mut self, data: &HemoData, from: usize, to: usize) -> Result<Beat> {
        if to <= from || to - from <= MIN_BEAT_SAMPLES {
            return Err(invalid(format!(
                "beat window [{from}, {to}) needs more than {MIN_BEAT_SAMPLES} samples"
            )));
        }
        let name = format!("{} [{from}, {to})", data.name());
        let cropped = data.subset(name, from, to)?;
        Ok(Beat::new(self.fresh_id(), cropped))
    }

    /// One beat per interval between consecutive fiducials. Windows that are too short or fall
    /// outside the data are skipped.
    pub fn crop_all(&mut self, data: &HemoData, fiducials: &Fiducials) -> Vec<Beat> {
        let mut beats = Vec::new();
        for w in fiducials.points.windows(2) {
            let (from, to) = (w[0].index, w[1].index);
            match self.crop(data, from, to) {
                Ok(beat) => beats.push(beat),
                Err(err) => log::debug!("skipping beat window [{from}, {to}): {err}"),
            }
        }
        beats
    }

    /// Duplicate of `beat` sharing its identity.
    pub fn copy(&self, beat: &Beat) -> Beat {
        beat.clone()
    }

    /// Ensemble every channel of `beats` onto the shortest one.
    ///
    /// `zero_based_time` shifts the result's domain to start at 0; `to_millis` converts it to
    /// milliseconds (an untagged domain is taken to be in seconds). The result has a fresh id.
    pub fn ensemble_average(
        &mut self,
        beats: &[Beat],
        zero_based_time: bool,
        to_millis: bool,
        mode: EnsembleMode,
    ) -> Result<Beat> {
        let (base_idx, base) = beats
            .iter()
            .enumerate()
            .min_by_key(|(_, b)| b.len())
            .ok_or_else(|| invalid("no beats to ensemble"))?;
        let others: Vec<&HemoData> = beats
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != base_idx)
            .map(|(_, b)| &b.data)
            .collect();
        let mut data = base.data.ensemble_average(&others, mode)?;
        data.rename(format!("Ensemble of {} beats", beats.len()));
        if zero_based_time {
            data.zero_x();
        }
        if to_millis {
            if data.x_unit().is_none() {
                if let Some(header) = data.x_header().map(|h| h.name().to_string()) {
                    data.add_flags(&header, [Flag::Unit(Unit::Seconds)])?;
                }
            }
            data.convert_x_units(Unit::Milliseconds)?;
        }
        Ok(Beat::new(self.fresh_id(), data))
    }

    /// Ensemble only the pressure and flow channels of `beats`.
    ///
    /// Beats must agree on average sample interval (within [`INTERVAL_TOLERANCE`]) and on the
    /// units of domain, pressure and flow. Channels are trimmed to the shortest beat or scaled to
    /// the longest, and the domain is rebuilt as `i·interval` from zero.
    pub fn ensemble_flow_pressure(
        &mut self,
        beats: &[Beat],
        mode: EnsembleMode,
        name: &str,
    ) -> Result<Beat> {
        let first = beats
            .first()
            .ok_or_else(|| invalid("no beats to ensemble"))?;
        let reference = Layout::of(&first.data)?;
        let mut pressures = Vec::with_capacity(beats.len());
        let mut flows = Vec::with_capacity(beats.len());
        for beat in beats {
            let layout = Layout::of(&beat.data)?;
            reference.check_compatible(&layout, &beat.data)?;
            pressures.push(beat.data.y(&layout.pressure)?);
            flows.push(beat.data.y(&layout.flow)?);
        }

        let lengths = beats.iter().map(Beat::len);
        let target = match mode {
            EnsembleMode::Trim => lengths.min(),
            EnsembleMode::Scale => lengths.max(),
        }
        .unwrap_or(0);
        let fit = |arrays: &[&[f64]]| -> Result<Vec<f64>> {
            let fitted = arrays
                .iter()
                .map(|a| fit_length(a, target, mode))
                .collect::<Result<Vec<_>>>()?;
            Ok(pointwise_mean(&fitted))
        };
        let pressure = fit(&pressures)?;
        let flow = fit(&flows)?;

        let mut data = first.data.blank_copy(name);
        let x_header = first
            .data
            .x_header()
            .cloned()
            .unwrap_or_else(|| "Time".into());
        let x_flags = first.data.x_flags().cloned().unwrap_or_default();
        data.set_x(
            x_header,
            (0..target).map(|i| i as f64 * reference.interval).collect(),
            x_flags,
        )?;
        data.add_y(
            reference.pressure.as_str(),
            pressure,
            first.data.flags(&reference.pressure)?.clone(),
        )?;
        data.add_y(
            reference.flow.as_str(),
            flow,
            first.data.flags(&reference.flow)?.clone(),
        )?;
        Ok(Beat::new(self.fresh_id(), data))
    }
}

/// Where pressure and flow live in a beat and what they are measured in.
struct Layout {
    pressure: String,
    flow: String,
    interval: f64,
    units: [Option<Unit>; 3],
}

impl Layout {
    fn of(data: &HemoData) -> Result<Self> {
        let header_of = |kind: SignalKind| {
            data.first_of_kind(kind)
                .map(|h| h.name().to_string())
                .ok_or_else(|| {
                    invalid(format!("'{}' has no {} channel", data.name(), kind.label()))
                })
        };
        let pressure = header_of(SignalKind::Pressure)?;
        let flow = header_of(SignalKind::Flow)?;
        let units = [
            data.x_unit(),
            data.unit_of(&pressure),
            data.unit_of(&flow),
        ];
        Ok(Self {
            interval: data.average_sample_interval()?,
            pressure,
            flow,
            units,
        })
    }

    fn check_compatible(&self, other: &Layout, data: &HemoData) -> Result<()> {
        if (self.interval - other.interval).abs() > INTERVAL_TOLERANCE {
            return Err(invalid(format!(
                "'{}' is sampled every {} but the first beat every {}",
                data.name(),
                other.interval,
                self.interval
            )));
        }
        if self.units != other.units {
            return Err(invalid(format!(
                "'{}' uses different units than the first beat",
                data.name()
            )));
        }
        Ok(())
    }
}
