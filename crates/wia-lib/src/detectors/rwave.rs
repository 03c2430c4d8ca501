//! R-wave finder ranking samples by second-derivative energy.

use crate::signal::Fiducial;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RWaveConfig {
    /// Samples excluded on each side of an accepted candidate.
    pub neighborhood: usize,
    /// Candidates weaker than this fraction of the strongest energy are not accepted.
    /// Zero keeps every candidate up to the length cap.
    pub min_relative_energy: f64,
}

impl Default for RWaveConfig {
    fn default() -> Self {
        Self {
            neighborhood: 75,
            min_relative_energy: 0.0,
        }
    }
}

/// One detected R-wave: its peak and the extent of the monotonic flanks around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RWave {
    pub peak: Fiducial,
    /// First sample of the upstroke.
    pub start: usize,
    /// Last sample of the downstroke (inclusive).
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RWaveMarker {
    #[default]
    Peak,
    UpstrokeStart,
    WholePeak,
}

/// Find R-waves in `signal`, sorted by index.
///
/// Samples are ranked by squared second difference and accepted greedily, each acceptance
/// excluding `±neighborhood` samples from further selection. At most `len / 10` waves are
/// accepted. Each accepted region is refined to its amplitude maximum; regions whose maximum is
/// not a local maximum of the signal (flat stretches, the tail of a neighbouring wave) are
/// dropped.
pub fn find_r_waves(signal: &[f64], cfg: &RWaveConfig) -> Vec<RWave> {
    let n = signal.len();
    if n < 3 {
        return Vec::new();
    }
    let energy = second_difference_energy(signal);
    let max_energy = energy.iter().copied().fold(0.0, f64::max);
    if !(max_energy > 0.0) {
        return Vec::new();
    }
    let floor = cfg.min_relative_energy * max_energy;
    let cap = (n / 10).max(1);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| energy[b].total_cmp(&energy[a]).then(a.cmp(&b)));

    let mut excluded = vec![false; n];
    let mut accepted = Vec::new();
    for idx in order {
        if accepted.len() >= cap || energy[idx] <= 0.0 || energy[idx] < floor {
            break;
        }
        if excluded[idx] {
            continue;
        }
        let lo = idx.saturating_sub(cfg.neighborhood);
        let hi = (idx + cfg.neighborhood).min(n - 1);
        excluded[lo..=hi].iter_mut().for_each(|e| *e = true);
        accepted.push((lo, hi));
    }

    let mut waves: Vec<RWave> = accepted
        .into_iter()
        .map(|(lo, hi)| refine(signal, lo, hi))
        .filter(|w| is_local_max(signal, w.peak.index))
        .collect();
    waves.sort_by_key(|w| w.peak.index);
    waves.dedup_by_key(|w| w.peak.index);
    waves
}

/// Render detections as a marker channel of `len` samples (1.0 on marked samples, else 0.0).
pub fn marker_channel(len: usize, waves: &[RWave], marker: RWaveMarker) -> Vec<f64> {
    let mut out = vec![0.0; len];
    for wave in waves {
        let (from, to) = match marker {
            RWaveMarker::Peak => (wave.peak.index, wave.peak.index),
            RWaveMarker::UpstrokeStart => (wave.start, wave.start),
            RWaveMarker::WholePeak => (wave.start, wave.end),
        };
        if from < len {
            out[from..=to.min(len - 1)].iter_mut().for_each(|v| *v = 1.0);
        }
    }
    out
}

fn second_difference_energy(signal: &[f64]) -> Vec<f64> {
    let mut energy = vec![0.0; signal.len()];
    for i in 1..signal.len() - 1 {
        let d2 = signal[i + 1] - 2.0 * signal[i] + signal[i - 1];
        energy[i] = d2 * d2;
    }
    energy
}

/// Not below either neighbour and strictly above at least one.
fn is_local_max(signal: &[f64], i: usize) -> bool {
    let left = i.checked_sub(1).map(|j| signal[j]);
    let right = signal.get(i + 1).copied();
    let v = signal[i];
    let not_below = left.map_or(true, |l| l <= v) && right.map_or(true, |r| r <= v);
    let rises = left.is_some_and(|l| l < v) || right.is_some_and(|r| r < v);
    not_below && rises
}

fn refine(signal: &[f64], lo: usize, hi: usize) -> RWave {
    let mut peak = lo;
    for j in lo..=hi {
        if signal[j] > signal[peak] {
            peak = j;
        }
    }
    let mut start = peak;
    while start > lo && signal[start - 1] < signal[start] {
        start -= 1;
    }
    let mut end = peak;
    while end < hi && signal[end + 1] < signal[end] {
        end += 1;
    }
    RWave {
        peak: Fiducial {
            index: peak,
            value: signal[peak],
        },
        start,
        end,
    }
}
