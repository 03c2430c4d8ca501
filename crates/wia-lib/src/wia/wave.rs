use crate::error::{invalid, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Which end of the vessel a wave originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaveDirection {
    /// Forward-travelling, from the aortic end.
    Proximal,
    /// Backward-travelling, reflected from the microcirculation.
    Distal,
}

/// Classification of an identified wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaveType {
    EarlyForwardCompression,
    LateForwardCompression,
    LateForwardExpansion,
    EarlyBackwardCompression,
    LateBackwardCompression,
    LateBackwardExpansion,
    Other,
}

impl WaveType {
    pub const ALL: [WaveType; 7] = [
        WaveType::EarlyForwardCompression,
        WaveType::LateForwardCompression,
        WaveType::LateForwardExpansion,
        WaveType::EarlyBackwardCompression,
        WaveType::LateBackwardCompression,
        WaveType::LateBackwardExpansion,
        WaveType::Other,
    ];

    /// `None` for [`WaveType::Other`], which may travel either way.
    pub fn direction(self) -> Option<WaveDirection> {
        match self {
            WaveType::EarlyForwardCompression
            | WaveType::LateForwardCompression
            | WaveType::LateForwardExpansion => Some(WaveDirection::Proximal),
            WaveType::EarlyBackwardCompression
            | WaveType::LateBackwardCompression
            | WaveType::LateBackwardExpansion => Some(WaveDirection::Distal),
            WaveType::Other => None,
        }
    }

    pub fn display_order(self) -> usize {
        match self {
            WaveType::EarlyForwardCompression => 0,
            WaveType::LateForwardCompression => 1,
            WaveType::LateForwardExpansion => 2,
            WaveType::EarlyBackwardCompression => 3,
            WaveType::LateBackwardCompression => 4,
            WaveType::LateBackwardExpansion => 5,
            WaveType::Other => 6,
        }
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            WaveType::EarlyForwardCompression => "FCW",
            WaveType::LateForwardCompression => "LFCW",
            WaveType::LateForwardExpansion => "FEW",
            WaveType::EarlyBackwardCompression => "BCW",
            WaveType::LateBackwardCompression => "LBCW",
            WaveType::LateBackwardExpansion => "BEW",
            WaveType::Other => "Other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WaveType::EarlyForwardCompression => "Early forward compression wave",
            WaveType::LateForwardCompression => "Late forward compression wave",
            WaveType::LateForwardExpansion => "Late forward expansion wave",
            WaveType::EarlyBackwardCompression => "Early backward compression wave",
            WaveType::LateBackwardCompression => "Late backward compression wave",
            WaveType::LateBackwardExpansion => "Late backward expansion wave",
            WaveType::Other => "Other wave",
        }
    }
}

impl fmt::Display for WaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named interval of the separated intensity series.
///
/// Bounds are fixed at construction. Peak, peak time and cumulative intensity are filled in
/// by the analysis and are `None` until then. Two waves are equal when their names are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wave {
    name: String,
    wave_type: WaveType,
    direction: WaveDirection,
    start_index: usize,
    end_index: usize,
    start_time: f64,
    end_time: f64,
    #[serde(default)]
    peak: Option<f64>,
    #[serde(default)]
    peak_time: Option<f64>,
    #[serde(default)]
    cumulative_intensity: Option<f64>,
}

impl Wave {
    /// `end_index` is inclusive. A classified wave must travel in its class's direction.
    pub fn new(
        name: impl Into<String>,
        wave_type: WaveType,
        direction: WaveDirection,
        (start_index, end_index): (usize, usize),
        (start_time, end_time): (f64, f64),
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(invalid("wave name is empty"));
        }
        if end_index < start_index {
            return Err(invalid(format!(
                "wave '{name}' ends at {end_index} before it starts at {start_index}"
            )));
        }
        if let Some(expected) = wave_type.direction() {
            if expected != direction {
                return Err(invalid(format!(
                    "{wave_type} cannot be {direction:?}"
                )));
            }
        }
        Ok(Self {
            name,
            wave_type,
            direction,
            start_index,
            end_index,
            start_time,
            end_time,
            peak: None,
            peak_time: None,
            cumulative_intensity: None,
        })
    }

    /// Wave whose direction follows from its class; `Other` is taken as proximal.
    pub fn classified(
        name: impl Into<String>,
        wave_type: WaveType,
        indices: (usize, usize),
        times: (f64, f64),
    ) -> Result<Self> {
        let direction = wave_type.direction().unwrap_or(WaveDirection::Proximal);
        Self::new(name, wave_type, direction, indices, times)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wave_type(&self) -> WaveType {
        self.wave_type
    }

    pub fn direction(&self) -> WaveDirection {
        self.direction
    }

    pub fn is_proximal(&self) -> bool {
        self.direction == WaveDirection::Proximal
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Inclusive.
    pub fn end_index(&self) -> usize {
        self.end_index
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn peak(&self) -> Option<f64> {
        self.peak
    }

    pub fn peak_time(&self) -> Option<f64> {
        self.peak_time
    }

    pub fn cumulative_intensity(&self) -> Option<f64> {
        self.cumulative_intensity
    }

    pub(crate) fn set_statistics(&mut self, peak: f64, peak_time: f64, cumulative: f64) {
        self.peak = Some(peak);
        self.peak_time = Some(peak_time);
        self.cumulative_intensity = Some(cumulative);
    }
}

impl PartialEq for Wave {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Wave {}

impl Hash for Wave {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
