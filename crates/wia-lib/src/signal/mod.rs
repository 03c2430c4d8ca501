//! Multi-channel time-series container.
//!
//! [`HemoData`] holds one strictly ascending domain array (`x`) and any number of named
//! value arrays sharing its length. Every mutating call replaces whole arrays, and every
//! replacement resets the channel's derived caches, so a cached derivative or differential
//! always corresponds to the current values and units.

pub mod align;
pub mod ensemble;
pub mod events;
pub mod header;
pub mod units;

pub use ensemble::EnsembleMode;
pub use events::{CycleLengths, Fiducial, Fiducials, MIN_CYCLE_MS};
pub use header::{Flag, Header, SignalKind, Unit};

use crate::error::{invalid, Result, WiaError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A cached derived array and the fixed denominator it was computed with, if any.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Derived {
    pub(crate) values: Vec<f64>,
    pub(crate) fixed_interval: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Channel {
    pub(crate) header: Header,
    pub(crate) values: Vec<f64>,
    pub(crate) flags: BTreeSet<Flag>,
    pub(crate) differential: Option<Derived>,
    pub(crate) derivative: Option<Derived>,
}

impl Channel {
    pub(crate) fn new(header: Header, values: Vec<f64>, flags: BTreeSet<Flag>) -> Self {
        Self {
            header,
            values,
            flags,
            differential: None,
            derivative: None,
        }
    }

    /// Swap in a new array; derived caches no longer describe it and are dropped.
    pub(crate) fn replace_values(&mut self, values: Vec<f64>) {
        self.values = values;
        self.differential = None;
        self.derivative = None;
    }

    /// Copy of `[from, to)` including cropped caches.
    pub(crate) fn cropped(&self, from: usize, to: usize) -> Channel {
        let crop = |d: &Derived| Derived {
            values: d.values[from..to].to_vec(),
            fixed_interval: d.fixed_interval,
        };
        Channel {
            header: self.header.clone(),
            values: self.values[from..to].to_vec(),
            flags: self.flags.clone(),
            differential: self.differential.as_ref().map(crop),
            derivative: self.derivative.as_ref().map(crop),
        }
    }

    /// Recompute whichever caches are present from the current values.
    pub(crate) fn refresh_caches(&mut self, x: &[f64]) {
        if self.differential.is_some() {
            self.differential = Some(Derived {
                values: differential(&self.values),
                fixed_interval: None,
            });
        }
        if let Some(cached) = self.derivative.take() {
            let fixed = cached.fixed_interval;
            self.derivative = Some(Derived {
                values: derivative(x, &self.values, fixed),
                fixed_interval: fixed,
            });
        }
    }

    /// Compute both caches regardless of what was cached before.
    pub(crate) fn compute_all_caches(&mut self, x: &[f64]) {
        let fixed = self.derivative.as_ref().and_then(|d| d.fixed_interval);
        self.differential = Some(Derived {
            values: differential(&self.values),
            fixed_interval: None,
        });
        self.derivative = Some(Derived {
            values: derivative(x, &self.values, fixed),
            fixed_interval: fixed,
        });
    }

    pub(crate) fn unit(&self) -> Option<Unit> {
        self.flags.iter().find_map(|f| match f {
            Flag::Unit(unit) => Some(*unit),
            _ => None,
        })
    }

    pub(crate) fn kind(&self) -> Option<SignalKind> {
        self.flags.iter().find_map(|f| match f {
            Flag::Kind(kind) => Some(*kind),
            _ => None,
        })
    }
}

/// Forward-difference derivative `dy/dx`.
///
/// `fixed_interval` replaces the `x` spacing as denominator. The last element repeats the
/// second-to-last; there is no backward difference at the boundary.
pub fn derivative(x: &[f64], y: &[f64], fixed_interval: Option<f64>) -> Vec<f64> {
    let n = y.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0.0];
    }
    let mut out = vec![0.0; n];
    for i in 0..n - 1 {
        let dx = fixed_interval.unwrap_or_else(|| x[i + 1] - x[i]);
        out[i] = (y[i + 1] - y[i]) / dx;
    }
    out[n - 1] = out[n - 2];
    out
}

/// Forward difference `y[i+1] - y[i]`, last element repeating the second-to-last.
pub fn differential(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0.0];
    }
    let mut out = vec![0.0; n];
    for i in 0..n - 1 {
        out[i] = y[i + 1] - y[i];
    }
    out[n - 1] = out[n - 2];
    out
}

pub(crate) fn check_ascending(x: &[f64]) -> Result<()> {
    for (i, w) in x.windows(2).enumerate() {
        if !(w[1] > w[0]) {
            return Err(invalid(format!(
                "domain is not strictly ascending at index {}: {} then {}",
                i + 1,
                w[0],
                w[1]
            )));
        }
    }
    Ok(())
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Domain array plus ordered, uniquely named value arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct HemoData {
    pub(crate) name: String,
    pub(crate) file_path: Option<PathBuf>,
    pub(crate) file_name: Option<String>,
    pub(crate) x: Option<Channel>,
    pub(crate) ys: Vec<Channel>,
}

impl HemoData {
    pub fn new(name: impl Into<String>, file: Option<&Path>) -> Self {
        Self {
            name: name.into(),
            file_path: file.map(Path::to_path_buf),
            file_name: file
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned()),
            x: None,
            ys: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Same provenance, no data.
    pub fn blank_copy(&self, name: impl Into<String>) -> HemoData {
        HemoData {
            name: name.into(),
            file_path: self.file_path.clone(),
            file_name: self.file_name.clone(),
            x: None,
            ys: Vec::new(),
        }
    }

    /// Install the domain array. Values must be strictly ascending and match existing channels.
    pub fn set_x(
        &mut self,
        header: impl Into<Header>,
        values: Vec<f64>,
        flags: impl IntoIterator<Item = Flag>,
    ) -> Result<()> {
        let header = header.into();
        check_ascending(&values)?;
        if let Some(first) = self.ys.first() {
            if first.values.len() != values.len() {
                return Err(invalid(format!(
                    "domain '{}' has {} samples but channels have {}",
                    header,
                    values.len(),
                    first.values.len()
                )));
            }
        }
        if self.ys.iter().any(|c| c.header == header) {
            return Err(invalid(format!("domain header '{header}' shadows a channel")));
        }
        self.x = Some(Channel::new(header, values, flags.into_iter().collect()));
        for ch in &mut self.ys {
            ch.differential = None;
            ch.derivative = None;
        }
        Ok(())
    }

    /// Append a value channel.
    pub fn add_y(
        &mut self,
        header: impl Into<Header>,
        values: Vec<f64>,
        flags: impl IntoIterator<Item = Flag>,
    ) -> Result<()> {
        let header = header.into();
        if self.x.as_ref().is_some_and(|x| x.header == header) {
            return Err(invalid(format!("channel '{header}' shadows the domain header")));
        }
        if self.ys.iter().any(|c| c.header == header) {
            return Err(invalid(format!("duplicate channel '{header}'")));
        }
        let expected = self
            .x
            .as_ref()
            .map(|x| x.values.len())
            .or_else(|| self.ys.first().map(|c| c.values.len()));
        if let Some(expected) = expected {
            if expected != values.len() {
                return Err(invalid(format!(
                    "channel '{}' has {} samples, expected {}",
                    header,
                    values.len(),
                    expected
                )));
            }
        }
        self.ys
            .push(Channel::new(header, values, flags.into_iter().collect()));
        Ok(())
    }

    pub fn remove_y(&mut self, header: &str) -> Result<()> {
        let idx = self.index_of(header)?;
        self.ys.remove(idx);
        Ok(())
    }

    /// Replace a channel's array. Its derived caches are cleared.
    pub fn set_y_values(&mut self, header: &str, values: Vec<f64>) -> Result<()> {
        let idx = self.index_of(header)?;
        let expected = self.len();
        if values.len() != expected {
            return Err(invalid(format!(
                "channel '{}' replacement has {} samples, expected {}",
                header,
                values.len(),
                expected
            )));
        }
        self.ys[idx].replace_values(values);
        Ok(())
    }

    pub fn x(&self) -> &[f64] {
        self.x.as_ref().map(|c| c.values.as_slice()).unwrap_or(&[])
    }

    pub fn x_header(&self) -> Option<&Header> {
        self.x.as_ref().map(|c| &c.header)
    }

    pub fn x_unit(&self) -> Option<Unit> {
        self.x.as_ref().and_then(Channel::unit)
    }

    pub fn x_flags(&self) -> Option<&BTreeSet<Flag>> {
        self.x.as_ref().map(|c| &c.flags)
    }

    pub fn y(&self, header: &str) -> Result<&[f64]> {
        Ok(&self.channel(header)?.values)
    }

    /// Value channel headers in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = &Header> {
        self.ys.iter().map(|c| &c.header)
    }

    pub fn has_header(&self, header: &str) -> bool {
        self.ys.iter().any(|c| c.header.matches(header))
    }

    pub fn y_count(&self) -> usize {
        self.ys.len()
    }

    pub fn flags(&self, header: &str) -> Result<&BTreeSet<Flag>> {
        if let Some(x) = self.x.as_ref().filter(|x| x.header.matches(header)) {
            return Ok(&x.flags);
        }
        Ok(&self.channel(header)?.flags)
    }

    pub fn add_flags(&mut self, header: &str, flags: impl IntoIterator<Item = Flag>) -> Result<()> {
        let is_domain = self.x.as_ref().is_some_and(|x| x.header.matches(header));
        let idx = if is_domain {
            None
        } else {
            Some(self.index_of(header)?)
        };
        let target = match (idx, self.x.as_mut()) {
            (Some(i), _) => &mut self.ys[i],
            (None, Some(x)) => x,
            (None, None) => return Err(invalid(format!("unknown channel '{header}'"))),
        };
        for flag in flags {
            if let Flag::Unit(_) = flag {
                target.flags.retain(|f| !matches!(f, Flag::Unit(_)));
            }
            target.flags.insert(flag);
        }
        Ok(())
    }

    pub fn has_flag(&self, header: &str, flag: &Flag) -> bool {
        self.flags(header).is_ok_and(|f| f.contains(flag))
    }

    pub fn headers_with_flag(&self, flag: &Flag) -> Vec<&Header> {
        self.ys
            .iter()
            .filter(|c| c.flags.contains(flag))
            .map(|c| &c.header)
            .collect()
    }

    /// First channel tagged with `kind`.
    pub fn first_of_kind(&self, kind: SignalKind) -> Option<&Header> {
        self.ys
            .iter()
            .find(|c| c.kind() == Some(kind))
            .map(|c| &c.header)
    }

    pub fn unit_of(&self, header: &str) -> Option<Unit> {
        self.channel(header).ok().and_then(Channel::unit)
    }

    pub fn kind_of(&self, header: &str) -> Option<SignalKind> {
        self.channel(header).ok().and_then(Channel::kind)
    }

    /// Number of samples per array.
    pub fn len(&self) -> usize {
        self.x
            .as_ref()
            .map(|x| x.values.len())
            .or_else(|| self.ys.first().map(|c| c.values.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Longest array length across the domain and every channel.
    pub fn max_rows(&self) -> usize {
        self.x
            .iter()
            .chain(self.ys.iter())
            .map(|c| c.values.len())
            .max()
            .unwrap_or(0)
    }

    /// `(min, max)` of a channel (or the domain when `header` names it).
    pub fn range(&self, header: &str) -> Result<(f64, f64)> {
        let values = match self.x.as_ref().filter(|x| x.header.matches(header)) {
            Some(x) => &x.values,
            None => &self.channel(header)?.values,
        };
        if values.is_empty() {
            return Err(invalid(format!("'{header}' has no samples")));
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok((min, max))
    }

    /// Mean spacing of the domain in its own units.
    pub fn average_sample_interval(&self) -> Result<f64> {
        let x = self.x();
        if x.len() < 2 {
            return Err(WiaError::IllegalState(
                "sample interval needs at least two domain samples".into(),
            ));
        }
        Ok((x[x.len() - 1] - x[0]) / (x.len() - 1) as f64)
    }

    /// Sampling rate in Hz. A domain tagged in milliseconds is scaled accordingly;
    /// an untagged domain is taken to be in seconds.
    pub fn sample_rate_hz(&self) -> Result<f64> {
        let interval = self.average_sample_interval()?;
        let seconds = match self.x_unit() {
            Some(Unit::Milliseconds) => interval / 1000.0,
            _ => interval,
        };
        Ok(1.0 / seconds)
    }

    /// Compute and cache `dy/dx` for a channel.
    pub fn calculate_derivative(
        &mut self,
        header: &str,
        fixed_interval: Option<f64>,
    ) -> Result<&[f64]> {
        let idx = self.index_of(header)?;
        if fixed_interval.is_none() && self.x.is_none() {
            return Err(WiaError::IllegalState(format!(
                "cannot differentiate '{header}' without a domain"
            )));
        }
        if let Some(dx) = fixed_interval {
            if !(dx.is_finite() && dx != 0.0) {
                return Err(invalid(format!("fixed interval must be finite and non-zero, got {dx}")));
            }
        }
        let values = derivative(self.x(), &self.ys[idx].values, fixed_interval);
        let channel = &mut self.ys[idx];
        let cached = channel.derivative.insert(Derived {
            values,
            fixed_interval,
        });
        Ok(&cached.values)
    }

    /// Compute and cache the forward difference of a channel.
    pub fn calculate_differential(&mut self, header: &str) -> Result<&[f64]> {
        let idx = self.index_of(header)?;
        let channel = &mut self.ys[idx];
        let cached = channel.differential.insert(Derived {
            values: differential(&channel.values),
            fixed_interval: None,
        });
        Ok(&cached.values)
    }

    pub fn derivative(&self, header: &str) -> Result<&[f64]> {
        self.channel(header)?
            .derivative
            .as_ref()
            .map(|d| d.values.as_slice())
            .ok_or_else(|| {
                WiaError::IllegalState(format!("derivative of '{header}' was never calculated"))
            })
    }

    pub fn differential(&self, header: &str) -> Result<&[f64]> {
        self.channel(header)?
            .differential
            .as_ref()
            .map(|d| d.values.as_slice())
            .ok_or_else(|| {
                WiaError::IllegalState(format!("differential of '{header}' was never calculated"))
            })
    }

    pub fn has_derivative(&self, header: &str) -> bool {
        self.channel(header).is_ok_and(|c| c.derivative.is_some())
    }

    pub fn has_differential(&self, header: &str) -> bool {
        self.channel(header).is_ok_and(|c| c.differential.is_some())
    }

    /// Channels with a cached differential, in insertion order.
    pub fn differential_headers(&self) -> Vec<&Header> {
        self.ys
            .iter()
            .filter(|c| c.differential.is_some())
            .map(|c| &c.header)
            .collect()
    }

    /// Channels with a cached derivative, in insertion order.
    pub fn derivative_headers(&self) -> Vec<&Header> {
        self.ys
            .iter()
            .filter(|c| c.derivative.is_some())
            .map(|c| &c.header)
            .collect()
    }

    /// Crop every array, cached derived arrays included, to `[from, to_exclusive)`.
    pub fn subset(&self, name: impl Into<String>, from: usize, to_exclusive: usize) -> Result<HemoData> {
        let len = self.len();
        if from >= to_exclusive || to_exclusive > len {
            return Err(invalid(format!(
                "subset [{from}, {to_exclusive}) is outside 0..{len} or empty"
            )));
        }
        Ok(HemoData {
            name: name.into(),
            file_path: self.file_path.clone(),
            file_name: self.file_name.clone(),
            x: self.x.as_ref().map(|x| x.cropped(from, to_exclusive)),
            ys: self
                .ys
                .iter()
                .map(|c| c.cropped(from, to_exclusive))
                .collect(),
        })
    }

    /// Shift the domain so it starts at zero. Cached arrays depend only on spacing and stay.
    pub fn zero_x(&mut self) {
        if let Some(x) = self.x.as_mut() {
            if let Some(&origin) = x.values.first() {
                x.values.iter_mut().for_each(|v| *v -= origin);
            }
        }
    }

    pub(crate) fn index_of(&self, header: &str) -> Result<usize> {
        self.ys
            .iter()
            .position(|c| c.header.matches(header))
            .ok_or_else(|| invalid(format!("unknown channel '{header}'")))
    }

    pub(crate) fn channel(&self, header: &str) -> Result<&Channel> {
        Ok(&self.ys[self.index_of(header)?])
    }

    /// Recompute every present cache against the current domain.
    pub(crate) fn refresh_all_caches(&mut self) {
        let x = self.x.as_ref().map(|c| c.values.as_slice()).unwrap_or(&[]);
        for ch in &mut self.ys {
            ch.refresh_caches(x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    fn store() -> HemoData {
        let mut data = HemoData::new("beat", Some(Path::new("/tmp/rec/patient.csv")));
        data.set_x("Time", vec![0.0, 1.0, 2.0, 3.0, 4.0], [Flag::Unit(Unit::Seconds)])
            .unwrap();
        data.add_y(
            "Pressure",
            vec![10.0, 12.0, 14.0, 16.0, 18.0],
            [Flag::Unit(Unit::Pascals), Flag::Kind(SignalKind::Pressure)],
        )
        .unwrap();
        data.add_y(
            "Flow",
            vec![1.0, 1.0, 1.0, 1.0, 1.0],
            [Flag::Unit(Unit::MetersPerSecond), Flag::Kind(SignalKind::Flow)],
        )
        .unwrap();
        data
    }

    #[test]
    fn provenance_is_recorded() {
        let data = store();
        assert_eq!(data.name(), "beat");
        assert_eq!(data.file_name(), Some("patient.csv"));
        assert_eq!(data.blank_copy("empty").file_name(), Some("patient.csv"));
        assert!(data.blank_copy("empty").is_empty());
    }

    #[test]
    fn derivative_repeats_last_element() {
        let d = derivative(&[0.0, 1.0, 3.0, 4.0], &[0.0, 2.0, 4.0, 10.0], None);
        assert_eq!(d, vec![2.0, 1.0, 6.0, 6.0]);
        let fixed = derivative(&[], &[0.0, 2.0, 4.0], Some(0.5));
        assert_eq!(fixed, vec![4.0, 4.0, 4.0]);
        let diff = differential(&[1.0, 4.0, 9.0, 16.0]);
        assert_eq!(diff.len(), 4);
        assert_eq!(diff[2], diff[3]);
    }

    #[test]
    fn pressure_ramp_derivative() {
        let mut data = store();
        assert_eq!(
            data.calculate_derivative("pressure", None).unwrap(),
            &[2.0, 2.0, 2.0, 2.0, 2.0]
        );
        assert_eq!(
            data.calculate_derivative("flow", None).unwrap(),
            &[0.0, 0.0, 0.0, 0.0, 0.0]
        );
        assert!(data.has_derivative("PRESSURE"));
    }

    #[test]
    fn rejects_bad_inputs_without_mutation() {
        let mut data = store();
        let before = data.clone();
        assert!(matches!(
            data.add_y("flow", vec![0.0; 5], []),
            Err(WiaError::InvalidArgument(_))
        ));
        assert!(data.add_y("time", vec![0.0; 5], []).is_err());
        assert!(data.add_y("ecg", vec![0.0; 4], []).is_err());
        assert!(data.set_x("t", vec![0.0, 2.0, 1.0, 3.0, 4.0], []).is_err());
        assert!(data.set_x("t", vec![0.0, 1.0, 1.0, 3.0, 4.0], []).is_err());
        assert!(data.set_x("t", vec![0.0, 1.0], []).is_err());
        assert!(data.set_x("pressure", vec![0.0, 1.0, 2.0, 3.0, 4.0], []).is_err());
        assert_eq!(data, before);
    }

    #[test]
    fn uncomputed_caches_are_illegal_state() {
        let data = store();
        assert!(matches!(
            data.derivative("pressure"),
            Err(WiaError::IllegalState(_))
        ));
        assert!(matches!(
            data.differential("flow"),
            Err(WiaError::IllegalState(_))
        ));
        assert!(matches!(
            data.derivative("ecg"),
            Err(WiaError::InvalidArgument(_))
        ));
    }

    #[test]
    fn replacing_values_clears_caches() {
        let mut data = store();
        data.calculate_derivative("pressure", None).unwrap();
        data.calculate_differential("pressure").unwrap();
        data.set_y_values("pressure", vec![1.0; 5]).unwrap();
        assert!(!data.has_derivative("pressure"));
        assert!(!data.has_differential("pressure"));
    }

    #[test]
    fn subset_crops_every_array() {
        let mut data = store();
        data.calculate_differential("pressure").unwrap();
        data.add_flags("pressure", [Flag::Custom("proximal".into())])
            .unwrap();
        let sub = data.subset("crop", 1, 4).unwrap();
        assert_eq!(sub.x(), &[1.0, 2.0, 3.0]);
        assert_eq!(sub.y("pressure").unwrap(), &[12.0, 14.0, 16.0]);
        assert_eq!(sub.differential("pressure").unwrap(), &[2.0, 2.0, 2.0]);
        assert!(sub.has_flag("pressure", &Flag::Custom("proximal".into())));
        assert!(data.subset("bad", 3, 3).is_err());
        assert!(data.subset("bad", 2, 6).is_err());
    }

    #[test]
    fn bookkeeping_helpers() {
        let data = store();
        assert_eq!(data.max_rows(), 5);
        assert_eq!(data.range("pressure").unwrap(), (10.0, 18.0));
        assert_eq!(data.range("time").unwrap(), (0.0, 4.0));
        assert_close(data.average_sample_interval().unwrap(), 1.0, 1e-12);
        assert_close(data.sample_rate_hz().unwrap(), 1.0, 1e-12);
        assert_eq!(
            data.first_of_kind(SignalKind::Flow).map(Header::name),
            Some("Flow")
        );
        assert_eq!(data.unit_of("pressure"), Some(Unit::Pascals));
        assert_eq!(
            data.headers_with_flag(&Flag::Kind(SignalKind::Pressure)).len(),
            1
        );
        let names: Vec<&str> = data.headers().map(Header::name).collect();
        assert_eq!(names, vec!["Pressure", "Flow"]);
    }

    #[test]
    fn unit_flags_replace_each_other() {
        let mut data = store();
        data.add_flags("pressure", [Flag::Unit(Unit::MmHg)]).unwrap();
        assert_eq!(data.unit_of("pressure"), Some(Unit::MmHg));
        assert!(!data.has_flag("pressure", &Flag::Unit(Unit::Pascals)));
    }

    fn assert_well_formed(data: &HemoData, step: &str) {
        let x = data.x();
        assert!(
            x.windows(2).all(|w| w[0] < w[1]),
            "{step}: domain is not strictly ascending"
        );
        for header in data.headers() {
            let name = header.name();
            assert_eq!(data.y(name).unwrap().len(), x.len(), "{step}: {name}");
            if data.has_derivative(name) {
                assert_eq!(data.derivative(name).unwrap().len(), x.len(), "{step}: d{name}/dt");
            }
            if data.has_differential(name) {
                assert_eq!(data.differential(name).unwrap().len(), x.len(), "{step}: d{name}");
            }
        }
    }

    fn periodic_store() -> HemoData {
        let n = 40;
        let x: Vec<f64> = (0..n).map(|i| 5.0 + i as f64 * 0.01).collect();
        let phase = |i: usize, lag: f64| 2.0 * std::f64::consts::PI * i as f64 / n as f64 + lag;
        let mut data = HemoData::new("periodic", None);
        data.set_x("Time", x, [Flag::Unit(Unit::Seconds)]).unwrap();
        data.add_y("Pressure", (0..n).map(|i| 100.0 + phase(i, 0.0).sin()).collect(), [])
            .unwrap();
        data.add_y("Flow", (0..n).map(|i| phase(i, 0.7).sin()).collect(), [])
            .unwrap();
        data.calculate_derivative("pressure", None).unwrap();
        data.calculate_differential("flow").unwrap();
        data
    }

    #[test]
    fn mutations_keep_the_store_well_formed() {
        let data = periodic_store();
        assert_well_formed(&data, "fixture");

        assert_well_formed(&data.subset("cut", 3, 31).unwrap(), "subset");

        for n in [4, -6] {
            let mut shifted = data.clone();
            shifted.apply_index_offset("flow", n).unwrap();
            assert_eq!(shifted.len(), 40 - n.unsigned_abs());
            assert_well_formed(&shifted, "index offset");
        }

        let cropped = data
            .copy_with_y_alignment("pressure", "flow", 2, 9, false, false)
            .unwrap();
        assert_eq!(cropped.len(), 33);
        assert_well_formed(&cropped, "cropped alignment");

        let wrapped = data
            .copy_with_y_alignment("pressure", "flow", 9, 2, true, false)
            .unwrap();
        assert_eq!(wrapped.len(), 40);
        assert_well_formed(&wrapped, "wrapped alignment");

        let mut resampled = data.clone();
        resampled
            .resample(0.004, true, crate::resample::Interpolation::Spline, None)
            .unwrap();
        assert!(resampled.len() > 40);
        assert_eq!(resampled.x()[0], 0.0);
        assert_well_formed(&resampled, "resample");

        let mut zeroed = data.clone();
        zeroed.zero_x();
        assert_eq!(zeroed.x()[0], 0.0);
        assert_well_formed(&zeroed, "zero_x");
    }
}
