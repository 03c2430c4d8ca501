//! Piecewise-linear resampling, for windows too short or too sharp for spline curvature.

use super::{Interpolant, Interpolation, ProgressSink, Resampled};
use crate::error::{Result, WiaError};

#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl LinearInterpolator {
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() || x.len() < 2 {
            return Err(WiaError::Resample(format!(
                "linear interpolation needs matching arrays of at least two points ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(WiaError::Resample(
                "interpolation abscissae are not strictly ascending".into(),
            ));
        }
        Ok(Self {
            x: x.to_vec(),
            y: y.to_vec(),
        })
    }
}

impl Interpolant for LinearInterpolator {
    fn value(&self, t: f64) -> Option<f64> {
        let last = self.x.len() - 1;
        if !(t >= self.x[0] && t <= self.x[last]) {
            return None;
        }
        let seg = self
            .x
            .partition_point(|&k| k <= t)
            .saturating_sub(1)
            .min(last - 1);
        let (x0, x1) = (self.x[seg], self.x[seg + 1]);
        let frac = (t - x0) / (x1 - x0);
        Some(self.y[seg] + frac * (self.y[seg + 1] - self.y[seg]))
    }
}

/// Linear counterpart of [`super::resample_to_count`].
pub fn resample_to_count(data: &[f64], count: usize) -> Result<Vec<f64>> {
    super::resample_to_count_with(Interpolation::Linear, data, count)
}

/// Linear counterpart of [`super::resample_to_rate`]; marker channels are snapped the same way.
pub fn resample_to_rate(
    x: &[f64],
    rate: f64,
    shift_to_zero: bool,
    ys: &[&[f64]],
    progress: Option<&mut dyn ProgressSink>,
) -> Result<Resampled> {
    super::resample_to_rate_with(Interpolation::Linear, x, rate, shift_to_zero, ys, progress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_points() {
        let lin = LinearInterpolator::new(&[0.0, 1.0, 3.0], &[0.0, 10.0, 0.0]).unwrap();
        assert_eq!(lin.value(0.5), Some(5.0));
        assert_eq!(lin.value(2.0), Some(5.0));
        assert_eq!(lin.value(3.0), Some(0.0));
        assert_eq!(lin.value(3.5), None);
    }

    #[test]
    fn linear_rate_resample_keeps_corners_sharp() {
        let x = [0.0, 0.01, 0.02, 0.03, 0.04];
        let y = [0.0, 0.0, 4.0, 0.0, 0.5];
        let out = resample_to_rate(&x, 0.005, false, &[&y], None).unwrap();
        assert_eq!(out.x.len(), 9);
        let v = &out.ys[0];
        assert!((v[3] - 2.0).abs() < 1e-9);
        assert!((v[4] - 4.0).abs() < 1e-9);
        assert!(v.iter().all(|&s| s >= -1e-12 && s <= 4.0 + 1e-12));
    }

    #[test]
    fn linear_count_resample() {
        let out = resample_to_count(&[0.0, 2.0, 4.0], 5).unwrap();
        assert_eq!(out.len(), 5);
        assert!((out[1] - 1.0).abs() < 1e-9);
        assert!((out[4] - 4.0).abs() < 1e-6);
    }
}
