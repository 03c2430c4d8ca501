//! Beats cropped from a recording and named collections of them.

pub mod aggregate;

pub use aggregate::BeatAggregator;

use crate::error::{invalid, Result};
use crate::signal::HemoData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Identifier handed out by a [`BeatAggregator`]; unique within that aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeatId(pub u64);

/// One cardiac cycle worth of data.
///
/// Equality and hashing follow the id only: two beats over identical samples are different
/// beats unless one was copied from the other.
#[derive(Debug, Clone)]
pub struct Beat {
    id: BeatId,
    data: HemoData,
}

impl Beat {
    pub(crate) fn new(id: BeatId, data: HemoData) -> Self {
        Self { id, data }
    }

    pub fn id(&self) -> BeatId {
        self.id
    }

    pub fn data(&self) -> &HemoData {
        &self.data
    }

    pub fn into_data(self) -> HemoData {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `(first, last)` domain value.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let x = self.data.x();
        Some((*x.first()?, *x.last()?))
    }

    /// True when the closed domain intervals of both beats intersect; touching ends overlap.
    pub fn overlaps(&self, other: &Beat) -> bool {
        match (self.time_span(), other.time_span()) {
            (Some((a0, a1)), Some((b0, b1))) => a0 <= b1 && b0 <= a1,
            _ => false,
        }
    }
}

impl PartialEq for Beat {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Beat {}

impl Hash for Beat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Clone, Default)]
struct Subtype {
    label: String,
    beats: Vec<Beat>,
    images: Option<Vec<Vec<u8>>>,
}

/// Named beat lists keyed by selection subtype ("manual", "auto", ...).
///
/// Subtype keys compare case-insensitively; the spelling first used is kept for display.
#[derive(Debug, Clone, Default)]
pub struct BeatSelection {
    name: String,
    subtypes: BTreeMap<String, Subtype>,
}

impl BeatSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subtypes: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the beats of `subtype`. Rendered images for it are dropped.
    pub fn insert(&mut self, subtype: &str, beats: Vec<Beat>) {
        let entry = self
            .subtypes
            .entry(subtype.to_lowercase())
            .or_insert_with(|| Subtype {
                label: subtype.to_string(),
                ..Subtype::default()
            });
        entry.beats = beats;
        entry.images = None;
    }

    /// Attach one rendered image per beat of `subtype`.
    pub fn set_images(&mut self, subtype: &str, images: Vec<Vec<u8>>) -> Result<()> {
        let entry = self
            .subtypes
            .get_mut(&subtype.to_lowercase())
            .ok_or_else(|| invalid(format!("unknown selection subtype '{subtype}'")))?;
        if images.len() != entry.beats.len() {
            return Err(invalid(format!(
                "{} images for {} beats in '{subtype}'",
                images.len(),
                entry.beats.len()
            )));
        }
        entry.images = Some(images);
        Ok(())
    }

    pub fn beats(&self, subtype: &str) -> Option<&[Beat]> {
        self.subtypes
            .get(&subtype.to_lowercase())
            .map(|s| s.beats.as_slice())
    }

    pub fn images(&self, subtype: &str) -> Option<&[Vec<u8>]> {
        self.subtypes
            .get(&subtype.to_lowercase())
            .and_then(|s| s.images.as_deref())
    }

    pub fn remove(&mut self, subtype: &str) -> Option<Vec<Beat>> {
        self.subtypes
            .remove(&subtype.to_lowercase())
            .map(|s| s.beats)
    }

    /// Subtype labels as first inserted.
    pub fn subtypes(&self) -> impl Iterator<Item = &str> {
        self.subtypes.values().map(|s| s.label.as_str())
    }

    pub fn total_beats(&self) -> usize {
        self.subtypes.values().map(|s| s.beats.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.subtypes.is_empty()
    }
}
