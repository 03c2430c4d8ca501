//! Wave intensity formulas over equally long derivative arrays.
//!
//! `a` is the pressure derivative (Pa/s) and `b = ρc·dU/dt` the flow derivative scaled by the
//! characteristic impedance. All outputs have the length of the inputs.

/// Blood density (kg/m³).
pub const BLOOD_DENSITY: f64 = 1050.0;
/// Stand-in for a zero flow when dividing by it.
pub const ZERO_FLOW_SUBSTITUTE: f64 = 1e-5;

/// Forward and backward components of a separated series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Separated {
    pub forward: Vec<f64>,
    pub backward: Vec<f64>,
}

/// Single-point estimate `ρc = sqrt(Σ(dP/dt)² / Σ(dU/dt)²)`.
///
/// Infinite when the flow derivative carries no energy; NaN when neither does.
pub fn rho_c(dp_dt: &[f64], du_dt: &[f64]) -> f64 {
    let sum_p: f64 = dp_dt.iter().map(|v| v * v).sum();
    let sum_u: f64 = du_dt.iter().map(|v| v * v).sum();
    (sum_p / sum_u).sqrt()
}

/// Wave speed `c = ρc / density` (m/s).
pub fn wave_speed(rho_c: f64, density: f64) -> f64 {
    rho_c / density
}

/// `dI = dP/dt · dU/dt`.
pub fn net_intensity(dp_dt: &[f64], du_dt: &[f64]) -> Vec<f64> {
    dp_dt.iter().zip(du_dt).map(|(a, b)| a * b).collect()
}

/// `dI+ = (a+b)²/4ρc` and `dI- = -(a-b)²/4ρc`; they sum to the net intensity.
pub fn separated_intensity(dp_dt: &[f64], du_dt: &[f64], rho_c: f64) -> Separated {
    let scale = inverse(4.0 * rho_c);
    let mut out = Separated::default();
    for (&a, &du) in dp_dt.iter().zip(du_dt) {
        let b = impedance_scaled(du, rho_c);
        out.forward.push(scale * (a + b).powi(2));
        out.backward.push(-scale * (a - b).powi(2));
    }
    out
}

/// `dU+ = (a+b)/2ρc` and `dU- = -1/(2ρc·(a-b))`.
///
/// The backward branch is the reciprocal form, not the mirror of the forward one.
pub fn separated_flow_derivative(dp_dt: &[f64], du_dt: &[f64], rho_c: f64) -> Separated {
    let mut out = Separated::default();
    for (&a, &du) in dp_dt.iter().zip(du_dt) {
        let b = impedance_scaled(du, rho_c);
        out.forward.push((a + b) * inverse(2.0 * rho_c));
        out.backward.push(-1.0 / (2.0 * rho_c * (a - b)));
    }
    out
}

/// Trapezoidal area of `series[start..=end]` with spacing `dt` (s). Zero for a single sample.
pub fn cumulative_intensity(series: &[f64], start: usize, end: usize, dt: f64) -> f64 {
    if end <= start || end >= series.len() {
        return 0.0;
    }
    series[start..=end]
        .windows(2)
        .map(|w| 0.5 * (w[0] + w[1]) * dt)
        .sum()
}

/// Index and value of the largest magnitude sample in `series[start..=end]`, sign kept.
pub fn signed_peak(series: &[f64], start: usize, end: usize) -> Option<(usize, f64)> {
    let end = end.min(series.len().checked_sub(1)?);
    if start > end {
        return None;
    }
    let mut best = start;
    for i in start..=end {
        if series[i].abs() > series[best].abs() {
            best = i;
        }
    }
    Some((best, series[best]))
}

/// Pressure (mmHg) over flow (cm/s), a zero flow replaced by [`ZERO_FLOW_SUBSTITUTE`].
pub fn resistance(pressure_mmhg: f64, flow_cm_s: f64) -> f64 {
    let flow = if flow_cm_s == 0.0 {
        ZERO_FLOW_SUBSTITUTE
    } else {
        flow_cm_s
    };
    pressure_mmhg / flow
}

/// `ρc·dU/dt`, exactly zero where the flow derivative is, whatever `ρc` is.
fn impedance_scaled(du: f64, rho_c: f64) -> f64 {
    if du == 0.0 {
        0.0
    } else {
        rho_c * du
    }
}

fn inverse(v: f64) -> f64 {
    if v > 0.0 {
        1.0 / v
    } else {
        0.0
    }
}
