use crate::error::{invalid, Result};
use crate::signal::{differential, mean, Fiducial, Fiducials, HemoData};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where the reported index of each QRS complex is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QrsMarker {
    /// The amplitude maximum of the complex.
    #[default]
    Peak,
    /// The search window length before the peak, to keep pre-QRS context in a beat.
    PrePeak,
    /// The start of the monotonic upstroke leading into the peak.
    Onset,
}

impl fmt::Display for QrsMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QrsMarker::Peak => "peak",
            QrsMarker::PrePeak => "pre-peak",
            QrsMarker::Onset => "onset",
        })
    }
}

impl FromStr for QrsMarker {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "peak" => Ok(QrsMarker::Peak),
            "pre-peak" | "prepeak" | "pre_peak" => Ok(QrsMarker::PrePeak),
            "onset" | "start" => Ok(QrsMarker::Onset),
            other => Err(format!("unknown QRS marker '{other}'")),
        }
    }
}

/// Parameters of the energy-threshold QRS detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QrsConfig {
    /// Sampling rate of the ECG (Hz).
    pub hz: f64,
    pub marker: QrsMarker,
    /// Moving window integration length (seconds).
    pub integration_window_s: f64,
    /// Samples skipped after each detection (seconds).
    pub refractory_s: f64,
    /// Half-width of the window searched for the true peak (seconds).
    pub search_s: f64,
    /// Standard deviations above the mean envelope that count as a detection.
    pub threshold_scale: f64,
}

impl QrsConfig {
    pub fn new(hz: f64) -> Self {
        Self {
            hz,
            marker: QrsMarker::Peak,
            integration_window_s: 1.0 / 6.0,
            refractory_s: 0.25,
            search_s: 0.100,
            threshold_scale: 0.5,
        }
    }

    pub fn with_marker(mut self, marker: QrsMarker) -> Self {
        self.marker = marker;
        self
    }

    fn samples(&self, seconds: f64) -> usize {
        (seconds * self.hz).round().max(1.0) as usize
    }
}

/// Detect QRS complexes in an ECG sampled at `cfg.hz`.
///
/// The derivative is squared and integrated over a moving window; every crossing of
/// `mean + threshold_scale·std` of that envelope yields one detection, followed by a
/// refractory skip. Detections are refined to the maximum of the raw signal within
/// `±search_s` and then moved according to `cfg.marker`.
pub fn detect_qrs(signal: &[f64], cfg: &QrsConfig) -> Fiducials {
    if signal.len() < 2 || !(cfg.hz > 0.0) {
        return Fiducials::default();
    }

    let envelope = qrs_envelope(signal, cfg);
    let threshold = {
        let m = mean(&envelope);
        m + cfg.threshold_scale * std_dev(&envelope, m)
    };
    let refractory = cfg.samples(cfg.refractory_s);
    let search = cfg.samples(cfg.search_s);

    let mut points = Vec::new();
    let mut i = 0;
    while i < envelope.len() {
        if envelope[i] > threshold {
            let peak = refine_to_peak(signal, i, search);
            let index = match cfg.marker {
                QrsMarker::Peak => peak,
                QrsMarker::PrePeak => peak.saturating_sub(search),
                QrsMarker::Onset => find_start_of_qrs(signal, peak),
            };
            points.push(Fiducial {
                index,
                value: signal[index],
            });
            i += refractory;
        } else {
            i += 1;
        }
    }
    Fiducials::from_points(points)
}

/// Run [`detect_qrs`] on a store channel, taking the rate from the store's domain.
pub fn detect_qrs_in(data: &HemoData, ecg: &str, marker: QrsMarker) -> Result<Fiducials> {
    let signal = data.y(ecg)?;
    let hz = data.sample_rate_hz()?;
    if !hz.is_finite() || hz <= 0.0 {
        return Err(invalid(format!("sample rate {hz} Hz cannot drive QRS detection")));
    }
    let fiducials = detect_qrs(signal, &QrsConfig::new(hz).with_marker(marker));
    log::debug!(
        "detected {} QRS complexes in '{}' at {:.1} Hz",
        fiducials.len(),
        ecg,
        hz
    );
    Ok(fiducials)
}

/// Walk backward from `peak` to the start of the upstroke leading into it.
///
/// The peak itself counts as the first slope reversal; the index of the second reversal
/// is the trough the upstroke starts from. Flat stretches do not reverse the slope.
pub fn find_start_of_qrs(signal: &[f64], peak: usize) -> usize {
    if signal.is_empty() {
        return 0;
    }
    let mut i = peak.min(signal.len() - 1);
    let mut reversals = 0;
    let mut previous = -1.0;
    while i > 0 {
        let slope = signal[i] - signal[i - 1];
        if slope != 0.0 {
            let sign = slope.signum();
            if sign != previous {
                reversals += 1;
                if reversals == 2 {
                    return i;
                }
                previous = sign;
            }
        }
        i -= 1;
    }
    0
}

fn qrs_envelope(signal: &[f64], cfg: &QrsConfig) -> Vec<f64> {
    let slope = differential(signal);
    let squared = square(&slope);
    moving_average(&squared, cfg.samples(cfg.integration_window_s))
}

fn square(data: &[f64]) -> Vec<f64> {
    data.iter().map(|v| v * v).collect()
}

fn moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if win <= 1 {
        return data.to_vec();
    }
    let mut out = vec![0.0; data.len()];
    let mut acc = 0.0;
    for (i, &sample) in data.iter().enumerate() {
        acc += sample;
        if i >= win {
            acc -= data[i - win];
        }
        out[i] = acc / win as f64;
    }
    out
}

fn std_dev(data: &[f64], mean: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let var = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / data.len() as f64;
    var.sqrt()
}

fn refine_to_peak(signal: &[f64], center: usize, search: usize) -> usize {
    let start = center.saturating_sub(search);
    let end = (center + search).min(signal.len() - 1);
    let mut idx = start;
    let mut max_val = f64::MIN;
    for (j, &v) in signal.iter().enumerate().take(end + 1).skip(start) {
        if v > max_val {
            max_val = v;
            idx = j;
        }
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{CycleLengths, Flag, Unit};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn spike_train(fs: f64, freq: f64, duration: f64, noise: Option<u64>) -> Vec<f64> {
        let mut rng = noise.map(StdRng::seed_from_u64);
        let samples = (duration * fs) as usize;
        let mut beats = Vec::new();
        let mut t = 0.5;
        while t < duration {
            beats.push(t);
            t += 1.0 / freq;
        }
        (0..samples)
            .map(|i| {
                let time = i as f64 / fs;
                let mut v = 0.05 * (2.0 * PI * time).sin();
                for &bt in &beats {
                    v += 1.2 * (-0.5 * ((time - bt) / 0.01).powi(2)).exp();
                }
                if let Some(rng) = rng.as_mut() {
                    v += rng.gen_range(-0.01..0.01);
                }
                v
            })
            .collect()
    }

    fn assert_regular(fiducials: &Fiducials, expected: usize, spacing: f64) {
        let count = fiducials.len();
        assert!(
            count.abs_diff(expected) <= 1,
            "expected about {expected} complexes, found {count}"
        );
        for w in fiducials.points.windows(2) {
            let gap = (w[1].index - w[0].index) as f64;
            assert!(
                (gap - spacing).abs() <= 2.0,
                "inter-peak spacing {gap} too far from {spacing}"
            );
        }
    }

    #[test]
    fn spike_train_yields_one_detection_per_beat() {
        let (fs, freq, duration) = (500.0, 1.2, 10.0);
        let ecg = spike_train(fs, freq, duration, None);
        let found = detect_qrs(&ecg, &QrsConfig::new(fs));
        assert_regular(&found, (duration * freq) as usize, fs / freq);
        assert!(found.points.iter().all(|p| p.value > 1.0));
    }

    #[test]
    fn noisy_spike_train_is_still_regular() {
        let (fs, freq, duration) = (500.0, 1.2, 10.0);
        let ecg = spike_train(fs, freq, duration, Some(7));
        let found = detect_qrs(&ecg, &QrsConfig::new(fs));
        assert_regular(&found, (duration * freq) as usize, fs / freq);
    }

    #[test]
    fn pre_peak_marker_moves_back_by_search_window() {
        let fs = 500.0;
        let ecg = spike_train(fs, 1.0, 6.0, None);
        let peaks = detect_qrs(&ecg, &QrsConfig::new(fs));
        let pre = detect_qrs(&ecg, &QrsConfig::new(fs).with_marker(QrsMarker::PrePeak));
        assert_eq!(peaks.len(), pre.len());
        for (p, q) in peaks.points.iter().zip(&pre.points) {
            assert_eq!(p.index - q.index, 50);
        }
    }

    #[test]
    fn onset_marker_lies_on_the_upstroke() {
        let fs = 500.0;
        let ecg = spike_train(fs, 1.0, 6.0, None);
        let peaks = detect_qrs(&ecg, &QrsConfig::new(fs));
        let onsets = detect_qrs(&ecg, &QrsConfig::new(fs).with_marker(QrsMarker::Onset));
        assert_eq!(peaks.len(), onsets.len());
        for (p, o) in peaks.points.iter().zip(&onsets.points) {
            assert!(o.index < p.index);
            assert!(ecg[o.index..=p.index].windows(2).all(|w| w[1] >= w[0]));
        }
    }

    #[test]
    fn start_of_qrs_is_the_second_slope_reversal() {
        let signal = [3.0, 2.0, 1.0, 1.0, 2.0, 4.0, 8.0, 5.0, 2.0];
        assert_eq!(find_start_of_qrs(&signal, 6), 2);
        assert_eq!(find_start_of_qrs(&[1.0, 2.0, 3.0], 2), 0);
        assert_eq!(find_start_of_qrs(&[], 4), 0);
    }

    #[test]
    fn flat_signal_has_no_complexes() {
        assert!(detect_qrs(&[0.0; 2000], &QrsConfig::new(500.0)).is_empty());
        assert!(detect_qrs(&[1.0], &QrsConfig::new(500.0)).is_empty());
    }

    #[test]
    fn store_detection_uses_domain_rate() {
        let fs = 250.0;
        let ecg = spike_train(fs, 1.0, 8.0, None);
        let mut data = HemoData::new("ecg", None);
        data.set_x(
            "Time",
            (0..ecg.len()).map(|i| i as f64 * 4.0).collect(),
            [Flag::Unit(Unit::Milliseconds)],
        )
        .unwrap();
        data.add_y("ECG", ecg, []).unwrap();
        let found = detect_qrs_in(&data, "ecg", QrsMarker::Peak).unwrap();
        assert_eq!(found.len(), 8);
        let cycles = CycleLengths::from_fiducials(&found, fs);
        let duration = cycles.cycle_duration().unwrap();
        assert!((duration - 1000.0).abs() < 10.0);
        assert!(detect_qrs_in(&data, "pressure", QrsMarker::Peak).is_err());
    }

    #[test]
    fn markers_parse() {
        assert_eq!("pre-peak".parse::<QrsMarker>(), Ok(QrsMarker::PrePeak));
        assert_eq!(QrsMarker::Onset.to_string(), "onset");
        assert!("middle".parse::<QrsMarker>().is_err());
    }
}
