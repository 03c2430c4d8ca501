//! Savitzky–Golay smoothing.

use crate::error::{invalid, Result};
use crate::signal::{Flag, HemoData};
use serde::{Deserialize, Serialize};

/// Least-squares polynomial smoother over a sliding odd-length window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavitzkyGolay {
    window: usize,
    poly_order: usize,
}

impl SavitzkyGolay {
    pub fn new(window: usize, poly_order: usize) -> Result<Self> {
        if window % 2 == 0 || window < 3 {
            return Err(invalid(format!(
                "filter window must be odd and at least 3, got {window}"
            )));
        }
        if poly_order >= window {
            return Err(invalid(format!(
                "polynomial order {poly_order} must be below the window {window}"
            )));
        }
        Ok(Self { window, poly_order })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn poly_order(&self) -> usize {
        self.poly_order
    }

    /// Weights producing the fitted value at `position` (0-based) inside the window.
    pub fn coefficients(&self, position: usize) -> Result<Vec<f64>> {
        let half = (self.window / 2) as f64;
        let terms = self.poly_order + 1;
        let design: Vec<Vec<f64>> = (0..self.window)
            .map(|j| {
                let t = j as f64 - half;
                (0..terms).map(|k| t.powi(k as i32)).collect()
            })
            .collect();
        let mut normal = vec![vec![0.0; terms]; terms];
        for row in &design {
            for a in 0..terms {
                for b in 0..terms {
                    normal[a][b] += row[a] * row[b];
                }
            }
        }
        let t = position as f64 - half;
        let rhs: Vec<f64> = (0..terms).map(|k| t.powi(k as i32)).collect();
        let z = solve(normal, rhs)?;
        Ok(design
            .iter()
            .map(|row| row.iter().zip(&z).map(|(a, b)| a * b).sum())
            .collect())
    }

    /// Smoothed copy of `data`. Edge samples use the fit of the first or last full window.
    pub fn apply(&self, data: &[f64]) -> Result<Vec<f64>> {
        let n = data.len();
        if n < self.window {
            return Err(invalid(format!(
                "{n} samples is shorter than the filter window {}",
                self.window
            )));
        }
        let half = self.window / 2;
        let center = self.coefficients(half)?;
        let mut out = vec![0.0; n];
        for (i, slot) in out.iter_mut().enumerate().take(n - half).skip(half) {
            *slot = dot(&center, &data[i - half..=i + half]);
        }
        for pos in 0..half {
            let coeffs = self.coefficients(pos)?;
            out[pos] = dot(&coeffs, &data[..self.window]);
            let tail = self.coefficients(self.window - 1 - pos)?;
            out[n - 1 - pos] = dot(&tail, &data[n - self.window..]);
        }
        Ok(out)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(invalid("singular smoothing system"));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

impl HemoData {
    /// Replace a channel with its smoothed version; its derived caches are cleared.
    pub fn apply_filter(&mut self, header: &str, filter: &SavitzkyGolay) -> Result<()> {
        let idx = self.index_of(header)?;
        let smoothed = filter.apply(&self.ys[idx].values)?;
        let channel = &mut self.ys[idx];
        channel.replace_values(smoothed);
        channel.flags.insert(Flag::Filtered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual}");
    }

    #[test]
    fn classic_five_point_quadratic_weights() {
        let sg = SavitzkyGolay::new(5, 2).unwrap();
        let c = sg.coefficients(2).unwrap();
        let expected = [-3.0, 12.0, 17.0, 12.0, -3.0].map(|v| v / 35.0);
        for (a, b) in c.iter().zip(expected.iter()) {
            assert_close(*a, *b, 1e-12);
        }
    }

    #[test]
    fn preserves_polynomials_up_to_order() {
        let sg = SavitzkyGolay::new(7, 2).unwrap();
        let data: Vec<f64> = (0..30).map(|i| 0.5 * (i * i) as f64 - 3.0 * i as f64).collect();
        let out = sg.apply(&data).unwrap();
        for (a, b) in out.iter().zip(&data) {
            assert_close(*a, *b, 1e-8);
        }
    }

    #[test]
    fn smooths_alternating_noise() {
        let sg = SavitzkyGolay::new(5, 1).unwrap();
        let data: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let out = sg.apply(&data).unwrap();
        assert!(out[5..15].iter().all(|v| v.abs() <= 0.2 + 1e-12));
    }

    #[test]
    fn validates_parameters() {
        assert!(SavitzkyGolay::new(4, 2).is_err());
        assert!(SavitzkyGolay::new(5, 5).is_err());
        let sg = SavitzkyGolay::new(9, 3).unwrap();
        assert!(sg.apply(&[1.0; 4]).is_err());
    }

    #[test]
    fn filtering_a_store_channel_marks_it() {
        let mut data = HemoData::new("f", None);
        data.set_x("Time", (0..12).map(f64::from).collect(), [])
            .unwrap();
        data.add_y("Pressure", (0..12).map(|i| (i % 3) as f64).collect(), [])
            .unwrap();
        data.calculate_derivative("pressure", None).unwrap();
        data.apply_filter("pressure", &SavitzkyGolay::new(3, 1).unwrap())
            .unwrap();
        assert!(data.has_flag("pressure", &Flag::Filtered));
        assert!(!data.has_derivative("pressure"));
        assert_close(data.y("pressure").unwrap()[4], 1.0, 1e-12);
    }
}
