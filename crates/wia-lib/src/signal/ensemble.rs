use super::{Channel, Derived, HemoData};
use crate::error::{invalid, Result};
use crate::resample::resample_to_count;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How arrays of different lengths are brought to a common length before averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnsembleMode {
    /// Truncate to the shorter length, index-aligned.
    #[default]
    Trim,
    /// Spline-resample to the target length.
    Scale,
}

impl fmt::Display for EnsembleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnsembleMode::Trim => f.write_str("trim"),
            EnsembleMode::Scale => f.write_str("scale"),
        }
    }
}

impl FromStr for EnsembleMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trim" => Ok(EnsembleMode::Trim),
            "scale" => Ok(EnsembleMode::Scale),
            other => Err(format!("unknown ensemble mode '{other}'")),
        }
    }
}

/// Bring `values` to `len` samples.
pub fn fit_length(values: &[f64], len: usize, mode: EnsembleMode) -> crate::Result<Vec<f64>> {
    match mode {
        EnsembleMode::Trim => {
            if values.len() < len {
                return Err(invalid(format!(
                    "cannot trim {} samples to {len}",
                    values.len()
                )));
            }
            Ok(values[..len].to_vec())
        }
        EnsembleMode::Scale if values.len() == len => Ok(values.to_vec()),
        EnsembleMode::Scale => resample_to_count(values, len),
    }
}

/// Point-wise mean of equally long arrays.
pub fn pointwise_mean(arrays: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = arrays.first() else {
        return Vec::new();
    };
    let mut out = vec![0.0; first.len()];
    for array in arrays {
        for (acc, v) in out.iter_mut().zip(array) {
            *acc += v;
        }
    }
    let n = arrays.len() as f64;
    out.iter_mut().for_each(|v| *v /= n);
    out
}

impl HemoData {
    /// Average this store with `others`, channel by channel, keeping this store's domain
    /// and length. Cached derived arrays are averaged the same way when every input has them.
    pub fn ensemble_average(&self, others: &[&HemoData], mode: EnsembleMode) -> Result<HemoData> {
        let len = self.len();
        if len == 0 {
            return Err(invalid("cannot ensemble an empty store"));
        }
        for other in others {
            if mode == EnsembleMode::Trim && other.len() < len {
                return Err(invalid(format!(
                    "'{}' has {} samples, fewer than the {len} being trimmed to",
                    other.name,
                    other.len()
                )));
            }
            for ch in &self.ys {
                if !other.has_header(ch.header.name()) {
                    return Err(invalid(format!(
                        "'{}' has no channel '{}'",
                        other.name, ch.header
                    )));
                }
            }
        }

        let mut out = self.clone();
        for (ci, ch) in self.ys.iter().enumerate() {
            let matched: Vec<&Channel> = others
                .iter()
                .map(|o| o.channel(ch.header.name()))
                .collect::<Result<_>>()?;

            let mut values = vec![ch.values.clone()];
            for other in &matched {
                values.push(fit_length(&other.values, len, mode)?);
            }
            let mut averaged =
                Channel::new(ch.header.clone(), pointwise_mean(&values), ch.flags.clone());

            averaged.differential = average_derived(
                ch.differential.as_ref(),
                matched.iter().map(|o| o.differential.as_ref()),
                len,
                mode,
            )?;
            averaged.derivative = average_derived(
                ch.derivative.as_ref(),
                matched.iter().map(|o| o.derivative.as_ref()),
                len,
                mode,
            )?;
            out.ys[ci] = averaged;
        }
        Ok(out)
    }
}

fn average_derived<'a>(
    base: Option<&Derived>,
    others: impl Iterator<Item = Option<&'a Derived>>,
    len: usize,
    mode: EnsembleMode,
) -> Result<Option<Derived>> {
    let Some(base) = base else {
        return Ok(None);
    };
    let mut arrays = vec![base.values.clone()];
    for other in others {
        match other {
            Some(d) => arrays.push(fit_length(&d.values, len, mode)?),
            None => return Ok(None),
        }
    }
    Ok(Some(Derived {
        values: pointwise_mean(&arrays),
        fixed_interval: base.fixed_interval,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Flag, SignalKind, Unit};
    use crate::WiaError;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(diff <= tol, "expected {expected}, got {actual}");
    }

    fn beat(n: usize, offset: f64) -> HemoData {
        let mut data = HemoData::new(format!("beat-{n}"), None);
        data.set_x(
            "Time",
            (0..n).map(|i| i as f64 * 0.01).collect(),
            [Flag::Unit(Unit::Seconds)],
        )
        .unwrap();
        data.add_y(
            "Pressure",
            (0..n).map(|i| offset + (i as f64 * 0.2).sin()).collect(),
            [Flag::Kind(SignalKind::Pressure)],
        )
        .unwrap();
        data.add_y(
            "Flow",
            (0..n).map(|i| offset * 0.5 + i as f64).collect(),
            [Flag::Kind(SignalKind::Flow)],
        )
        .unwrap();
        data
    }

    #[test]
    fn averaging_identical_copies_is_idempotent() {
        let mut base = beat(40, 2.0);
        base.calculate_derivative("pressure", None).unwrap();
        let copies: Vec<HemoData> = (0..4).map(|_| base.clone()).collect();
        let refs: Vec<&HemoData> = copies.iter().collect();
        let avg = base.ensemble_average(&refs, EnsembleMode::Trim).unwrap();
        for (a, b) in avg
            .y("pressure")
            .unwrap()
            .iter()
            .zip(base.y("pressure").unwrap())
        {
            assert_close(*a, *b, 1e-12);
        }
        for (a, b) in avg
            .derivative("pressure")
            .unwrap()
            .iter()
            .zip(base.derivative("pressure").unwrap())
        {
            assert_close(*a, *b, 1e-12);
        }
        assert!(!avg.has_derivative("flow"));
    }

    #[test]
    fn trim_uses_shortest_length() {
        let base = beat(30, 0.0);
        let longer = beat(45, 2.0);
        let avg = base.ensemble_average(&[&longer], EnsembleMode::Trim).unwrap();
        assert_eq!(avg.len(), 30);
        assert_close(avg.y("flow").unwrap()[10], 10.5, 1e-12);
        assert!(matches!(
            longer.ensemble_average(&[&base], EnsembleMode::Trim),
            Err(WiaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn scale_resamples_to_base_length() {
        let base = beat(21, 0.0);
        let mut other = HemoData::new("other", None);
        other
            .set_x("Time", (0..41).map(|i| i as f64 * 0.005).collect(), [])
            .unwrap();
        other.add_y("Pressure", vec![4.0; 41], []).unwrap();
        other
            .add_y("Flow", (0..41).map(|i| i as f64 * 0.5).collect(), [])
            .unwrap();
        let avg = base.ensemble_average(&[&other], EnsembleMode::Scale).unwrap();
        assert_eq!(avg.len(), 21);
        assert_close(avg.y("flow").unwrap()[20], 20.0, 1e-6);
        assert_close(avg.y("flow").unwrap()[10], 10.0, 1e-6);
    }

    #[test]
    fn missing_channel_is_rejected() {
        let base = beat(10, 0.0);
        let mut other = HemoData::new("other", None);
        other
            .set_x("Time", (0..10).map(|i| i as f64).collect(), [])
            .unwrap();
        other.add_y("Pressure", vec![0.0; 10], []).unwrap();
        assert!(base.ensemble_average(&[&other], EnsembleMode::Trim).is_err());
    }

    #[test]
    fn modes_parse() {
        assert_eq!("Scale".parse::<EnsembleMode>(), Ok(EnsembleMode::Scale));
        assert!("median".parse::<EnsembleMode>().is_err());
    }
}
