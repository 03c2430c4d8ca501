use serde::{Deserialize, Serialize};

/// Shortest cycle (ms) still considered a plausible heartbeat.
pub const MIN_CYCLE_MS: f64 = 250.0;

/// A detected point of interest: index into a signal and the amplitude found there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fiducial {
    pub index: usize,
    pub value: f64,
}

/// Ordered fiducial points (QRS complexes, R-waves).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fiducials {
    pub points: Vec<Fiducial>,
}

impl Fiducials {
    pub fn from_points(mut points: Vec<Fiducial>) -> Self {
        points.sort_by_key(|p| p.index);
        points.dedup_by_key(|p| p.index);
        Self { points }
    }

    /// Points at `indices`, reading amplitudes from `signal`. Out-of-range indices are skipped.
    pub fn from_indices(indices: &[usize], signal: &[f64]) -> Self {
        let points = indices
            .iter()
            .filter_map(|&index| signal.get(index).map(|&value| Fiducial { index, value }))
            .collect();
        Self::from_points(points)
    }

    pub fn indices(&self) -> Vec<usize> {
        self.points.iter().map(|p| p.index).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Cycle lengths (ms) between consecutive fiducials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleLengths {
    pub ms: Vec<f64>,
}

impl CycleLengths {
    pub fn from_fiducials(fiducials: &Fiducials, hz: f64) -> Self {
        let mut ms = Vec::new();
        for w in fiducials.points.windows(2) {
            let dt = (w[1].index as f64 - w[0].index as f64) / hz;
            ms.push(dt * 1000.0);
        }
        Self { ms }
    }

    /// Mean cycle length in ms, or `None` when it cannot be determined or is implausibly short.
    pub fn cycle_duration(&self) -> Option<f64> {
        if self.ms.is_empty() {
            return None;
        }
        let mean = self.ms.iter().sum::<f64>() / self.ms.len() as f64;
        if !mean.is_finite() || mean < MIN_CYCLE_MS {
            None
        } else {
            Some(mean)
        }
    }
}
