//! Resampling a store's arrays onto a new sampling grid.
//!
//! Continuous channels are interpolated (natural cubic spline by default, piecewise-linear in
//! [`linear`]). Channels holding at most two distinct values are treated as event markers:
//! each non-zero sample is moved to the single nearest grid point and every other grid point
//! is zero, so detected beats and similar markers are never smeared.

pub mod linear;
pub mod spline;

pub use linear::LinearInterpolator;
pub use spline::CubicSpline;

use crate::error::{Result, WiaError};
use crate::signal::{check_ascending, Channel, HemoData};
use serde::{Deserialize, Serialize};

/// Inward nudge applied to the final count-resampled position.
const END_NUDGE: f64 = 1e-10;
/// Relative slack when deciding whether a sample already lies on the grid.
const GRID_SLACK: f64 = 1e-9;
const MAX_DECIMAL_PLACES: usize = 15;

pub trait Interpolant {
    /// Interpolated value at `t`, or `None` outside the knot range.
    fn value(&self, t: f64) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Spline,
    Linear,
}

impl Interpolation {
    fn build(self, x: &[f64], y: &[f64]) -> Result<Box<dyn Interpolant>> {
        Ok(match self {
            Interpolation::Spline => Box::new(CubicSpline::natural(x, y)?),
            Interpolation::Linear => Box::new(LinearInterpolator::new(x, y)?),
        })
    }
}

/// Receives progress while a rate resample walks through its channels.
pub trait ProgressSink {
    fn set_enabled(&mut self, enabled: bool, min: u32, max: u32);
    fn set_progress(&mut self, percent: u32);
}

/// Progress sink that reports through the `log` facade.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn set_enabled(&mut self, enabled: bool, min: u32, max: u32) {
        log::debug!("resample progress enabled={enabled} range={min}..{max}");
    }

    fn set_progress(&mut self, percent: u32) {
        log::debug!("resample progress {percent}%");
    }
}

/// New domain plus one resampled array per input channel, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    pub x: Vec<f64>,
    pub ys: Vec<Vec<f64>>,
}

/// Spline-resample `data` (implicit abscissae `0..len`) to `count` evenly spaced points.
pub fn resample_to_count(data: &[f64], count: usize) -> Result<Vec<f64>> {
    resample_to_count_with(Interpolation::Spline, data, count)
}

pub(crate) fn resample_to_count_with(
    interpolation: Interpolation,
    data: &[f64],
    count: usize,
) -> Result<Vec<f64>> {
    if data.is_empty() {
        return Err(WiaError::Resample("cannot resample an empty array".into()));
    }
    if count == 0 {
        return Ok(Vec::new());
    }
    if data.len() == 1 {
        return Ok(vec![data[0]; count]);
    }
    if count == 1 {
        return Ok(vec![data[0]]);
    }
    let abscissae: Vec<f64> = (0..data.len()).map(|i| i as f64).collect();
    let interp = interpolation.build(&abscissae, data)?;
    let last = (data.len() - 1) as f64;
    let step = last / (count - 1) as f64;
    (0..count)
        .map(|i| {
            let t = if i == count - 1 {
                last - END_NUDGE
            } else {
                (i as f64 * step).min(last)
            };
            interp
                .value(t)
                .ok_or_else(|| WiaError::Resample(format!("position {t} outside spline domain")))
        })
        .collect()
}

/// Resample every channel onto a grid spaced `rate` apart (domain units).
///
/// With `shift_to_zero` the domain is first translated to start at zero. The grid starts at
/// the first multiple of `rate` at or after the first sample and runs through the last sample.
/// Grid points are computed as integer multiples rounded to the decimal precision of `rate`,
/// so long recordings do not accumulate drift.
pub fn resample_to_rate(
    x: &[f64],
    rate: f64,
    shift_to_zero: bool,
    ys: &[&[f64]],
    progress: Option<&mut dyn ProgressSink>,
) -> Result<Resampled> {
    resample_to_rate_with(Interpolation::Spline, x, rate, shift_to_zero, ys, progress)
}

pub(crate) fn resample_to_rate_with(
    interpolation: Interpolation,
    x: &[f64],
    rate: f64,
    shift_to_zero: bool,
    ys: &[&[f64]],
    mut progress: Option<&mut dyn ProgressSink>,
) -> Result<Resampled> {
    if x.len() < 2 {
        return Err(WiaError::Resample(
            "domain needs at least two samples".into(),
        ));
    }
    check_ascending(x).map_err(|e| WiaError::Resample(e.to_string()))?;
    if let Some((i, y)) = ys.iter().enumerate().find(|(_, y)| y.len() != x.len()) {
        return Err(WiaError::Resample(format!(
            "channel {} has {} samples but the domain has {}",
            i,
            y.len(),
            x.len()
        )));
    }
    let span = x[x.len() - 1] - x[0];
    if !(rate > 0.0) || !rate.is_finite() {
        return Err(WiaError::Resample(format!("rate {rate} must be positive")));
    }
    if rate >= span {
        return Err(WiaError::Resample(format!(
            "rate {rate} is not smaller than the domain span {span}"
        )));
    }

    let domain: Vec<f64> = if shift_to_zero {
        x.iter().map(|v| v - x[0]).collect()
    } else {
        x.to_vec()
    };
    let first = domain[0];
    let last = domain[domain.len() - 1];
    let grid = build_grid(first, last, rate);

    if let Some(sink) = progress.as_deref_mut() {
        sink.set_enabled(true, 0, 100);
        sink.set_progress(0);
    }
    let mut out = Vec::with_capacity(ys.len());
    for (i, y) in ys.iter().enumerate() {
        let resampled = if is_binary_like(y) {
            snap_markers(&domain, y, &grid, rate)
        } else {
            let interp = interpolation.build(&domain, y)?;
            grid.iter()
                .map(|&t| {
                    interp.value(t.clamp(first, last)).ok_or_else(|| {
                        WiaError::Resample(format!("grid point {t} outside interpolation domain"))
                    })
                })
                .collect::<Result<Vec<f64>>>()?
        };
        out.push(resampled);
        if let Some(sink) = progress.as_deref_mut() {
            sink.set_progress(((i + 1) * 100 / ys.len()) as u32);
        }
    }
    if let Some(sink) = progress.as_deref_mut() {
        sink.set_enabled(false, 0, 100);
    }

    Ok(Resampled { x: grid, ys: out })
}

/// True when the array holds at most two distinct values.
pub fn is_binary_like(values: &[f64]) -> bool {
    let mut seen: Vec<u64> = Vec::with_capacity(2);
    for v in values {
        let bits = if *v == 0.0 { 0 } else { v.to_bits() };
        if !seen.contains(&bits) {
            if seen.len() == 2 {
                return false;
            }
            seen.push(bits);
        }
    }
    true
}

fn snap_markers(x: &[f64], y: &[f64], grid: &[f64], rate: f64) -> Vec<f64> {
    let mut out = vec![0.0; grid.len()];
    if grid.is_empty() {
        return out;
    }
    let origin = grid[0];
    for (&xi, &yi) in x.iter().zip(y) {
        if yi == 0.0 {
            continue;
        }
        let slot = ((xi - origin) / rate).round().max(0.0) as usize;
        out[slot.min(grid.len() - 1)] = yi;
    }
    out
}

fn build_grid(first: f64, last: f64, rate: f64) -> Vec<f64> {
    let places = decimal_places(rate);
    let start = snap_quotient(first / rate, f64::ceil);
    let end = snap_quotient(last / rate, f64::floor);
    if end < start {
        return Vec::new();
    }
    (start..=end)
        .map(|k| round_to(k as f64 * rate, places))
        .collect()
}

fn snap_quotient(q: f64, direction: fn(f64) -> f64) -> i64 {
    let nearest = q.round();
    if (q - nearest).abs() <= GRID_SLACK * nearest.abs().max(1.0) {
        nearest as i64
    } else {
        direction(q) as i64
    }
}

fn decimal_places(rate: f64) -> usize {
    let text = format!("{rate}");
    text.split_once('.')
        .map(|(_, frac)| frac.len())
        .unwrap_or(0)
        .min(MAX_DECIMAL_PLACES)
}

fn round_to(value: f64, places: usize) -> f64 {
    let scale = 10f64.powi(places as i32);
    (value * scale).round() / scale
}

impl HemoData {
    /// Copy of this store resampled onto a `rate`-spaced grid. Flags are kept; derived caches
    /// start empty.
    pub fn resampled(
        &self,
        rate: f64,
        shift_to_zero: bool,
        interpolation: Interpolation,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<HemoData> {
        let Some(x) = self.x.as_ref() else {
            return Err(WiaError::Resample("store has no domain".into()));
        };
        let ys: Vec<&[f64]> = self.ys.iter().map(|c| c.values.as_slice()).collect();
        let result = resample_to_rate_with(
            interpolation,
            &x.values,
            rate,
            shift_to_zero,
            &ys,
            progress,
        )?;
        let mut out = self.blank_copy(self.name.clone());
        out.x = Some(Channel::new(x.header.clone(), result.x, x.flags.clone()));
        out.ys = self
            .ys
            .iter()
            .zip(result.ys)
            .map(|(c, values)| Channel::new(c.header.clone(), values, c.flags.clone()))
            .collect();
        Ok(out)
    }

    /// Resample in place; the store is only replaced when every channel succeeded.
    pub fn resample(
        &mut self,
        rate: f64,
        shift_to_zero: bool,
        interpolation: Interpolation,
        progress: Option<&mut dyn ProgressSink>,
    ) -> Result<()> {
        *self = self.resampled(rate, shift_to_zero, interpolation, progress)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Flag, SignalKind, Unit};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual} (diff {diff})");
    }

    #[derive(Default)]
    struct RecordingSink {
        enabled: Vec<bool>,
        progress: Vec<u32>,
    }

    impl ProgressSink for RecordingSink {
        fn set_enabled(&mut self, enabled: bool, _min: u32, _max: u32) {
            self.enabled.push(enabled);
        }
        fn set_progress(&mut self, percent: u32) {
            self.progress.push(percent);
        }
    }

    #[test]
    fn count_resample_keeps_endpoints() {
        let data: Vec<f64> = (0..37).map(|i| (i as f64 * 0.3).sin() * 5.0 + 2.0).collect();
        for count in [2, 3, 10, 37, 100, 512] {
            let out = resample_to_count(&data, count).unwrap();
            assert_eq!(out.len(), count);
            assert_close(out[0], data[0], 1e-9);
            assert_close(out[count - 1], data[data.len() - 1], 1e-6);
        }
    }

    #[test]
    fn count_resample_identity_length() {
        let data = [1.0, 4.0, 2.0, 8.0, 5.0];
        let out = resample_to_count(&data, 5).unwrap();
        for (a, b) in out.iter().zip(data.iter()) {
            assert_close(*a, *b, 1e-6);
        }
        assert!(resample_to_count(&[], 4).is_err());
        assert_eq!(resample_to_count(&[3.0], 3).unwrap(), vec![3.0; 3]);
    }

    #[test]
    fn rate_grid_has_no_drift() {
        let x: Vec<f64> = (0..=1000).map(|i| 0.0003 + i as f64 * 0.00097).collect();
        let y: Vec<f64> = x.iter().map(|t| (t * 7.0).sin()).collect();
        let out = resample_to_rate(&x, 0.001, false, &[&y], None).unwrap();
        assert_eq!(out.x[0], 0.001);
        assert_eq!(out.x[1], 0.002);
        assert_eq!(out.x[500], 0.501);
        assert!(*out.x.last().unwrap() <= x[x.len() - 1]);
        for (t, v) in out.x.iter().zip(out.ys[0].iter()) {
            assert_close(*v, (t * 7.0).sin(), 1e-4);
        }
    }

    #[test]
    fn shift_to_zero_starts_grid_at_origin() {
        let x = [5.0, 5.5, 6.0, 6.5, 7.0];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = resample_to_rate(&x, 0.25, true, &[&y], None).unwrap();
        assert_eq!(out.x.first(), Some(&0.0));
        assert_eq!(out.x.last(), Some(&2.0));
        assert_eq!(out.x.len(), 9);
        assert_close(out.ys[0][1], 1.5, 1e-9);
    }

    #[test]
    fn markers_snap_to_nearest_grid_point() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.3).collect();
        let mut marker = vec![0.0; 20];
        marker[4] = 1.0; // t = 1.2
        marker[13] = 1.0; // t = 3.9
        let out = resample_to_rate(&x, 0.5, false, &[&marker], None).unwrap();
        let hits: Vec<usize> = out.ys[0]
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(hits, vec![2, 8]);
        assert!(out.ys[0].iter().all(|v| *v == 0.0 || *v == 1.0));
    }

    #[test]
    fn binary_detection() {
        assert!(is_binary_like(&[0.0, 1.0, 0.0, 1.0]));
        assert!(is_binary_like(&[2.0, 2.0]));
        assert!(is_binary_like(&[0.0, -0.0, 3.0]));
        assert!(!is_binary_like(&[0.0, 1.0, 2.0]));
    }

    #[test]
    fn rate_preconditions() {
        let y = [1.0, 2.0, 3.0];
        assert!(matches!(
            resample_to_rate(&[0.0, 1.0, 2.0], 2.0, false, &[&y], None),
            Err(WiaError::Resample(_))
        ));
        assert!(matches!(
            resample_to_rate(&[0.0, 2.0, 1.0], 0.1, false, &[&y], None),
            Err(WiaError::Resample(_))
        ));
        assert!(matches!(
            resample_to_rate(&[0.0, 1.0, 2.0], 0.1, false, &[&y[..2]], None),
            Err(WiaError::Resample(_))
        ));
    }

    #[test]
    fn progress_reported_per_channel() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let a = [0.0, 1.0, 4.0, 9.0];
        let b = [1.0, 0.0, 1.0, 2.5];
        let mut sink = RecordingSink::default();
        resample_to_rate(&x, 0.5, false, &[&a, &b], Some(&mut sink)).unwrap();
        assert_eq!(sink.progress, vec![0, 50, 100]);
        assert_eq!(sink.enabled, vec![true, false]);
    }

    #[test]
    fn store_resample_keeps_flags_and_markers() {
        let mut data = HemoData::new("rec", None);
        let x: Vec<f64> = (0..50).map(|i| i as f64 * 2.0).collect();
        data.set_x("Time", x.clone(), [Flag::Unit(Unit::Milliseconds)])
            .unwrap();
        data.add_y(
            "Pressure",
            x.iter().map(|t| 80.0 + (t / 10.0).sin()).collect(),
            [Flag::Unit(Unit::MmHg), Flag::Kind(SignalKind::Pressure)],
        )
        .unwrap();
        let mut beats = vec![0.0; 50];
        beats[10] = 1.0;
        data.add_y("Beats", beats, [Flag::Kind(SignalKind::Marker)])
            .unwrap();
        data.calculate_derivative("pressure", None).unwrap();

        let before = data.clone();
        assert!(data.resample(500.0, false, Interpolation::Spline, None).is_err());
        assert_eq!(data, before);

        data.resample(1.0, false, Interpolation::Spline, None).unwrap();
        assert_eq!(data.len(), 99);
        assert_eq!(data.unit_of("pressure"), Some(Unit::MmHg));
        assert!(!data.has_derivative("pressure"));
        let beats = data.y("beats").unwrap();
        assert_eq!(beats.iter().filter(|v| **v == 1.0).count(), 1);
        assert_eq!(beats[20], 1.0);
    }
}
