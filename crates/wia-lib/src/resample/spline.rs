use super::Interpolant;
use crate::error::{Result, WiaError};

/// Natural cubic spline (zero second derivative at both ends).
#[derive(Debug, Clone)]
pub struct CubicSpline {
    knots: Vec<f64>,
    /// Per-interval polynomial `a + b·t + c·t² + d·t³`, `t` measured from the left knot.
    coeffs: Vec<[f64; 4]>,
}

impl CubicSpline {
    pub fn natural(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(WiaError::Resample(format!(
                "spline abscissae ({}) and ordinates ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(WiaError::Resample(
                "spline needs at least two points".into(),
            ));
        }
        if x.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(WiaError::Resample(
                "spline abscissae are not strictly ascending".into(),
            ));
        }

        let n = x.len() - 1;
        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let mut mu = vec![0.0; n];
        let mut z = vec![0.0; n + 1];
        for i in 1..n {
            let g = 2.0 * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / g;
            z[i] = (3.0 * (y[i + 1] * h[i - 1] - y[i] * (x[i + 1] - x[i - 1]) + y[i - 1] * h[i])
                / (h[i - 1] * h[i])
                - h[i - 1] * z[i - 1])
                / g;
        }

        let mut c = vec![0.0; n + 1];
        let mut coeffs = vec![[0.0; 4]; n];
        for j in (0..n).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            let b = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            let d = (c[j + 1] - c[j]) / (3.0 * h[j]);
            coeffs[j] = [y[j], b, c[j], d];
        }

        Ok(Self {
            knots: x.to_vec(),
            coeffs,
        })
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }
}

impl Interpolant for CubicSpline {
    fn value(&self, t: f64) -> Option<f64> {
        let (lo, hi) = self.domain();
        if !(t >= lo && t <= hi) {
            return None;
        }
        let seg = self
            .knots
            .partition_point(|&k| k <= t)
            .saturating_sub(1)
            .min(self.coeffs.len() - 1);
        let [a, b, c, d] = self.coeffs[seg];
        let dt = t - self.knots[seg];
        Some(a + dt * (b + dt * (c + dt * d)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual} (diff {diff})");
    }

    #[test]
    fn passes_through_knots() {
        let x = [0.0, 1.0, 2.5, 3.0, 4.0];
        let y = [1.0, -2.0, 0.5, 4.0, 3.0];
        let spline = CubicSpline::natural(&x, &y).unwrap();
        for (xi, yi) in x.iter().zip(y.iter()) {
            assert_close(spline.value(*xi).unwrap(), *yi, 1e-12);
        }
    }

    #[test]
    fn reproduces_straight_lines() {
        let x: Vec<f64> = (0..6).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 1.0).collect();
        let spline = CubicSpline::natural(&x, &y).unwrap();
        assert_close(spline.value(2.25).unwrap(), 5.75, 1e-12);
        assert_close(spline.value(4.9).unwrap(), 13.7, 1e-12);
    }

    #[test]
    fn two_points_interpolate_linearly() {
        let spline = CubicSpline::natural(&[0.0, 2.0], &[0.0, 4.0]).unwrap();
        assert_close(spline.value(0.5).unwrap(), 1.0, 1e-12);
    }

    #[test]
    fn outside_domain_has_no_value() {
        let spline = CubicSpline::natural(&[0.0, 1.0, 2.0], &[0.0, 1.0, 0.0]).unwrap();
        assert!(spline.value(-0.001).is_none());
        assert!(spline.value(2.001).is_none());
        assert!(spline.value(2.0).is_some());
    }

    #[test]
    fn rejects_unsorted_knots() {
        assert!(CubicSpline::natural(&[0.0, 2.0, 1.0], &[0.0; 3]).is_err());
        assert!(CubicSpline::natural(&[0.0], &[0.0]).is_err());
    }
}
