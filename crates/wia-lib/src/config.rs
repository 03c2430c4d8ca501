//! Analysis defaults read from TOML.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::detectors::QrsMarker;
use crate::filter::SavitzkyGolay;
use crate::resample::Interpolation;
use crate::signal::EnsembleMode;
use crate::wia::BLOOD_DENSITY;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub resample: ResampleSection,
    pub filter: FilterSection,
    pub ensemble: EnsembleSection,
    pub qrs: QrsSection,
    pub wia: WiaSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleSection {
    /// Spacing of the resampled grid, in domain units.
    pub rate: f64,
    pub interpolation: Interpolation,
    pub shift_to_zero: bool,
}

impl Default for ResampleSection {
    fn default() -> Self {
        Self {
            rate: 0.001,
            interpolation: Interpolation::Spline,
            shift_to_zero: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub enabled: bool,
    pub window: usize,
    pub poly_order: usize,
}

impl Default for FilterSection {
    fn default() -> Self {
        Self {
            enabled: false,
            window: 7,
            poly_order: 2,
        }
    }
}

impl FilterSection {
    /// The configured smoother, or `None` when filtering is off.
    pub fn smoother(&self) -> Result<Option<SavitzkyGolay>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(Some(SavitzkyGolay::new(self.window, self.poly_order)?))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleSection {
    pub mode: EnsembleMode,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QrsSection {
    pub marker: QrsMarker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WiaSection {
    /// Blood density (kg/m³).
    pub density: f64,
}

impl Default for WiaSection {
    fn default() -> Self {
        Self {
            density: BLOOD_DENSITY,
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::debug!("loaded analysis config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AnalysisConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.resample.rate.is_finite() && self.resample.rate > 0.0) {
            bail!("resample.rate must be positive, got {}", self.resample.rate);
        }
        SavitzkyGolay::new(self.filter.window, self.filter.poly_order)
            .context("invalid [filter] section")?;
        if !(self.wia.density.is_finite() && self.wia.density > 0.0) {
            bail!("wia.density must be positive, got {}", self.wia.density);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = AnalysisConfig::from_toml("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.resample.rate, 0.001);
        assert_eq!(config.ensemble.mode, EnsembleMode::Trim);
        assert!(config.filter.smoother().unwrap().is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
            [resample]
            rate = 0.002
            interpolation = "linear"

            [filter]
            enabled = true
            window = 9
            poly_order = 3

            [ensemble]
            mode = "scale"

            [qrs]
            marker = "pre-peak"
            "#,
        )
        .unwrap();
        assert_eq!(config.resample.interpolation, Interpolation::Linear);
        assert!(config.resample.shift_to_zero);
        assert_eq!(config.ensemble.mode, EnsembleMode::Scale);
        assert_eq!(config.qrs.marker, QrsMarker::PrePeak);
        let sg = config.filter.smoother().unwrap().unwrap();
        assert_eq!((sg.window(), sg.poly_order()), (9, 3));
        assert_eq!(config.wia.density, BLOOD_DENSITY);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(AnalysisConfig::from_toml("[resample]\nrate = 0.0").is_err());
        assert!(AnalysisConfig::from_toml("[filter]\nwindow = 4").is_err());
        assert!(AnalysisConfig::from_toml("[wia]\ndensity = -1.0").is_err());
        assert!(AnalysisConfig::from_toml("[ensemble]\nmode = \"median\"").is_err());
    }

    #[test]
    fn load_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wia.toml");
        std::fs::write(&path, "[wia]\ndensity = 1060.0\n").unwrap();
        assert_eq!(AnalysisConfig::load(&path).unwrap().wia.density, 1060.0);
        let missing = dir.path().join("absent.toml");
        let err = AnalysisConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
