//! Versioned JSON snapshots of stores and analyses.
//!
//! Version 1 documents carry no derivative intervals, rollback store or CMD inputs; those
//! fields default when absent. Documents newer than [`SNAPSHOT_VERSION`] are refused.

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::signal::{Derived, Flag, HemoData};
use crate::wia::{CmdInputs, Wave, WiaData, WiaSummary, BLOOD_DENSITY};

pub const SNAPSHOT_VERSION: u32 = 2;

/// One named array and its position in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub name: String,
    pub order: usize,
    pub is_domain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub file_name: Option<String>,
    pub headers: Vec<HeaderRecord>,
    pub x: Vec<f64>,
    /// Channel arrays in header order.
    pub ys: Vec<Vec<f64>>,
    #[serde(default)]
    pub differentials: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    pub derivatives: BTreeMap<String, Vec<f64>>,
    /// Fixed denominators of cached derivatives, where one was used.
    #[serde(default)]
    pub derivative_intervals: BTreeMap<String, f64>,
    #[serde(default)]
    pub flags: BTreeMap<String, Vec<String>>,
}

impl StoreSnapshot {
    pub fn from_store(data: &HemoData) -> Self {
        let mut headers = Vec::new();
        let mut flags = BTreeMap::new();
        if let Some(x) = data.x.as_ref() {
            headers.push(HeaderRecord {
                name: x.header.name().to_string(),
                order: 0,
                is_domain: true,
            });
            if !x.flags.is_empty() {
                flags.insert(
                    x.header.name().to_string(),
                    x.flags.iter().map(Flag::to_string).collect(),
                );
            }
        }
        let mut differentials = BTreeMap::new();
        let mut derivatives = BTreeMap::new();
        let mut derivative_intervals = BTreeMap::new();
        for (order, ch) in data.ys.iter().enumerate() {
            let name = ch.header.name().to_string();
            headers.push(HeaderRecord {
                name: name.clone(),
                order,
                is_domain: false,
            });
            if !ch.flags.is_empty() {
                flags.insert(name.clone(), ch.flags.iter().map(Flag::to_string).collect());
            }
            if let Some(d) = ch.differential.as_ref() {
                differentials.insert(name.clone(), d.values.clone());
            }
            if let Some(d) = ch.derivative.as_ref() {
                derivatives.insert(name.clone(), d.values.clone());
                if let Some(dx) = d.fixed_interval {
                    derivative_intervals.insert(name, dx);
                }
            }
        }
        Self {
            version: SNAPSHOT_VERSION,
            name: data.name.clone(),
            file_path: data.file_path.clone(),
            file_name: data.file_name.clone(),
            headers,
            x: data.x().to_vec(),
            ys: data.ys.iter().map(|c| c.values.clone()).collect(),
            differentials,
            derivatives,
            derivative_intervals,
            flags,
        }
    }

    /// Rebuild the store, validating it the way the store validates any input.
    pub fn into_store(self) -> Result<HemoData> {
        let mut data = HemoData::new(self.name, None);
        data.file_path = self.file_path;
        data.file_name = self.file_name;
        let flags_of = |name: &str| -> Vec<Flag> {
            self.flags
                .get(name)
                .map(|f| f.iter().filter_map(|s| s.parse().ok()).collect())
                .unwrap_or_default()
        };

        if let Some(domain) = self.headers.iter().find(|h| h.is_domain) {
            data.set_x(domain.name.as_str(), self.x, flags_of(&domain.name))?;
        }
        let mut channels: Vec<&HeaderRecord> = self.headers.iter().filter(|h| !h.is_domain).collect();
        channels.sort_by_key(|h| h.order);
        if channels.len() != self.ys.len() {
            bail!(
                "snapshot lists {} channels but carries {} arrays",
                channels.len(),
                self.ys.len()
            );
        }
        for (header, values) in channels.iter().zip(self.ys) {
            data.add_y(header.name.as_str(), values, flags_of(&header.name))?;
        }

        let len = data.len();
        for (name, values) in self.differentials {
            let idx = data.index_of(&name)?;
            check_cache_len(&name, values.len(), len)?;
            data.ys[idx].differential = Some(Derived {
                values,
                fixed_interval: None,
            });
        }
        for (name, values) in self.derivatives {
            let idx = data.index_of(&name)?;
            check_cache_len(&name, values.len(), len)?;
            let fixed_interval = self.derivative_intervals.get(&name).copied();
            data.ys[idx].derivative = Some(Derived {
                values,
                fixed_interval,
            });
        }
        Ok(data)
    }
}

fn check_cache_len(name: &str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        bail!("cached array for '{name}' has {got} samples, expected {expected}");
    }
    Ok(())
}

fn default_density() -> f64 {
    BLOOD_DENSITY
}

/// Analysis inputs plus its scalar results. Loading reruns the analysis from `raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WiaSnapshot {
    pub version: u32,
    pub name: String,
    #[serde(default = "default_density")]
    pub density: f64,
    pub raw: StoreSnapshot,
    #[serde(default)]
    pub original: Option<StoreSnapshot>,
    #[serde(default)]
    pub systole: Option<usize>,
    #[serde(default)]
    pub diastole: Option<usize>,
    #[serde(default)]
    pub cmd: CmdInputs,
    #[serde(default)]
    pub waves: Vec<Wave>,
    #[serde(default)]
    pub summary: WiaSummary,
}

impl WiaSnapshot {
    pub fn from_wia(wia: &WiaData) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            name: wia.name().to_string(),
            density: wia.density(),
            raw: StoreSnapshot::from_store(wia.raw_data()),
            original: wia.original_data().map(StoreSnapshot::from_store),
            systole: wia.systole(),
            diastole: wia.diastole(),
            cmd: wia.cmd_inputs(),
            waves: wia.waves().to_vec(),
            summary: wia.summary(),
        }
    }

    pub fn into_wia(self) -> Result<WiaData> {
        let raw = self.raw.into_store()?;
        let mut wia = WiaData::with_density(self.name, raw, self.density)?;
        if let Some(original) = self.original {
            wia.set_original(Some(original.into_store()?));
        }
        wia.set_systole_diastole(self.systole, self.diastole)?;
        wia.set_cmd_inputs(self.cmd);
        for wave in self.waves {
            let name = wave.name().to_string();
            wia.add_wave(wave)
                .with_context(|| format!("restoring wave '{name}'"))?;
        }
        Ok(wia)
    }
}

fn check_version(value: &serde_json::Value) -> Result<u32> {
    let version = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| anyhow!("snapshot has no version"))?;
    if version == 0 || version > u64::from(SNAPSHOT_VERSION) {
        bail!("unsupported snapshot version {version} (this build reads 1 to {SNAPSHOT_VERSION})");
    }
    Ok(version as u32)
}

fn parse_versioned<T: DeserializeOwned>(text: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(text).context("parsing snapshot JSON")?;
    let version = check_version(&value)?;
    if version < SNAPSHOT_VERSION {
        log::info!("upgrading version {version} snapshot");
    }
    serde_json::from_value(value).context("decoding snapshot")
}

pub fn store_to_json(data: &HemoData) -> Result<String> {
    Ok(serde_json::to_string_pretty(&StoreSnapshot::from_store(data))?)
}

pub fn store_from_json(text: &str) -> Result<HemoData> {
    parse_versioned::<StoreSnapshot>(text)?.into_store()
}

pub fn wia_to_json(wia: &WiaData) -> Result<String> {
    Ok(serde_json::to_string_pretty(&WiaSnapshot::from_wia(wia))?)
}

pub fn wia_from_json(text: &str) -> Result<WiaData> {
    parse_versioned::<WiaSnapshot>(text)?.into_wia()
}

pub fn save_store(path: &Path, data: &HemoData) -> Result<()> {
    std::fs::write(path, store_to_json(data)?)
        .with_context(|| format!("writing {}", path.display()))
}

pub fn load_store(path: &Path) -> Result<HemoData> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    store_from_json(&text).with_context(|| format!("loading {}", path.display()))
}

pub fn save_wia(path: &Path, wia: &WiaData) -> Result<()> {
    std::fs::write(path, wia_to_json(wia)?)
        .with_context(|| format!("writing {}", path.display()))
}

pub fn load_wia(path: &Path) -> Result<WiaData> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    wia_from_json(&text).with_context(|| format!("loading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{SignalKind, Unit};
    use crate::wia::WaveType;

    fn beat() -> HemoData {
        let mut data = HemoData::new("beat", Some(Path::new("/data/p1.csv")));
        let n = 60;
        data.set_x(
            "Time",
            (0..n).map(|i| i as f64 * 0.01).collect(),
            [Flag::Unit(Unit::Seconds)],
        )
        .unwrap();
        data.add_y(
            "Pressure",
            (0..n).map(|i| 90.0 + 10.0 * (i as f64 * 0.1).sin()).collect(),
            [Flag::Unit(Unit::MmHg), Flag::Kind(SignalKind::Pressure)],
        )
        .unwrap();
        data.add_y(
            "Flow",
            (0..n).map(|i| 20.0 + 5.0 * (i as f64 * 0.1 + 0.3).sin()).collect(),
            [
                Flag::Unit(Unit::CentimetersPerSecond),
                Flag::Kind(SignalKind::Flow),
            ],
        )
        .unwrap();
        data
    }

    #[test]
    fn store_round_trip_keeps_caches_and_flags() {
        let mut data = beat();
        data.calculate_derivative("pressure", Some(0.02)).unwrap();
        data.calculate_differential("flow").unwrap();
        data.add_flags("flow", [Flag::Custom("doppler".into())])
            .unwrap();
        let restored = store_from_json(&store_to_json(&data).unwrap()).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn version_one_documents_still_load() {
        let doc = r#"{
            "version": 1,
            "name": "legacy",
            "headers": [
                {"name": "t", "order": 0, "is_domain": true},
                {"name": "p", "order": 0, "is_domain": false}
            ],
            "x": [0.0, 1.0, 2.0],
            "ys": [[5.0, 6.0, 8.0]],
            "derivatives": {"p": [1.0, 2.0, 2.0]}
        }"#;
        let data = store_from_json(doc).unwrap();
        assert_eq!(data.name(), "legacy");
        assert_eq!(data.derivative("p").unwrap(), &[1.0, 2.0, 2.0]);
        assert!(data.flags("p").unwrap().is_empty());
    }

    #[test]
    fn newer_or_unversioned_documents_are_refused() {
        let newer = r#"{"version": 3, "name": "x", "headers": [], "x": [], "ys": []}"#;
        let err = store_from_json(newer).unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot version 3"));
        assert!(store_from_json(r#"{"name": "x"}"#).is_err());
    }

    #[test]
    fn inconsistent_documents_are_refused() {
        let doc = r#"{
            "version": 2, "name": "bad",
            "headers": [{"name": "t", "order": 0, "is_domain": true}],
            "x": [0.0, 1.0], "ys": [[1.0, 2.0]]
        }"#;
        assert!(store_from_json(doc).is_err());
    }

    #[test]
    fn analysis_round_trip_restores_inputs() {
        let mut wia = WiaData::new("beat", beat()).unwrap();
        let mut replacement = beat();
        replacement.rename("edited");
        wia.set_new_hemo_data(replacement).unwrap();
        wia.set_systole_diastole(Some(12), Some(40)).unwrap();
        wia.set_cfr(Some(2.1));
        wia.set_hmr(Some(3.0));
        let wave = Wave::classified("FCW", WaveType::EarlyForwardCompression, (2, 10), (0.02, 0.1))
            .unwrap();
        wia.add_wave(wave).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beat.wia.json");
        save_wia(&path, &wia).unwrap();
        let loaded = load_wia(&path).unwrap();
        assert_eq!(loaded.summary(), wia.summary());
        assert_eq!(loaded.raw_data().name(), "edited");
        assert_eq!(loaded.original_data().map(HemoData::name), Some("beat"));
        assert_eq!(loaded.cmd_status().structural, Some(true));
        assert_eq!(
            loaded.wave("FCW").and_then(Wave::cumulative_intensity),
            wia.wave("FCW").and_then(Wave::cumulative_intensity)
        );
    }
}
