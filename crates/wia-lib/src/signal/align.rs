//! Shifting one channel against the others to correct instrument lag.

use super::{Channel, HemoData};
use crate::error::{invalid, Result, WiaError};
use std::ops::Range;

/// Wrap alignments are rejected when the joined boundary jumps by more than this many
/// mean adjacent differences.
pub const DISCORDANCE_FACTOR: f64 = 3.0;
const MIN_MEAN_ADJACENT_DIFF: f64 = 1e-6;

impl HemoData {
    /// Shift `header` by `n` samples relative to every other channel.
    ///
    /// A positive `n` delays the channel: its first `len - n` samples are paired with the
    /// domain and other channels from index `n` on. A negative `n` advances it. The edge that
    /// no longer overlaps is trimmed from whichever side lost its partner.
    pub fn apply_index_offset(&mut self, header: &str, n: isize) -> Result<()> {
        let target = self.index_of(header)?;
        if n == 0 {
            return Ok(());
        }
        let len = self.len();
        let shift = n.unsigned_abs();
        if shift >= len {
            return Err(invalid(format!(
                "offset of {n} samples leaves no overlap in {len} samples"
            )));
        }
        let keep = len - shift;
        let (shifted, others) = if n > 0 {
            (0..keep, shift..len)
        } else {
            (shift..len, 0..keep)
        };
        self.crop_channels(target, shifted, others);
        self.refresh_all_caches();
        Ok(())
    }

    /// [`apply_index_offset`](Self::apply_index_offset) with the shift given in domain units,
    /// rounded to the nearest whole sample.
    pub fn apply_x_offset(&mut self, header: &str, x_shift: f64) -> Result<()> {
        let interval = self.average_sample_interval()?;
        if !x_shift.is_finite() {
            return Err(invalid(format!("offset {x_shift} is not finite")));
        }
        let n = (x_shift / interval).round() as isize;
        self.apply_index_offset(header, n)
    }

    /// Copy of this store with `adjusted` shifted so that its sample `idx_adjusted` lines up
    /// with sample `idx_fixed` of `fixed`.
    ///
    /// Without `allow_wrap` the non-overlapping edges are cropped and the domain re-zeroed.
    /// With it the adjusted channel is rotated circularly instead, which is only accepted when
    /// the joined ends differ by at most [`DISCORDANCE_FACTOR`] mean adjacent differences, or
    /// when `allow_excessive_discordance` is set.
    pub fn copy_with_y_alignment(
        &self,
        fixed: &str,
        adjusted: &str,
        idx_fixed: usize,
        idx_adjusted: usize,
        allow_wrap: bool,
        allow_excessive_discordance: bool,
    ) -> Result<HemoData> {
        self.index_of(fixed)?;
        let target = self.index_of(adjusted)?;
        let n = self.len();
        if idx_fixed >= n || idx_adjusted >= n {
            return Err(invalid(format!(
                "alignment indices {idx_fixed}/{idx_adjusted} outside 0..{n}"
            )));
        }
        let delta = idx_adjusted as isize - idx_fixed as isize;
        if allow_wrap {
            self.wrapped_alignment(target, delta, allow_excessive_discordance)
        } else {
            self.cropped_alignment(target, delta)
        }
    }

    fn cropped_alignment(&self, target: usize, delta: isize) -> Result<HemoData> {
        let n = self.len();
        let shift = delta.unsigned_abs();
        if shift >= n {
            return Err(invalid(format!(
                "alignment shift of {delta} leaves no overlap in {n} samples"
            )));
        }
        let overlap = n - shift;
        let (adjusted, others) = if delta >= 0 {
            (shift..n, 0..overlap)
        } else {
            (0..overlap, shift..n)
        };
        let mut out = self.clone();
        out.crop_channels(target, adjusted, others);
        out.zero_x();
        out.refresh_all_caches();
        Ok(out)
    }

    fn wrapped_alignment(
        &self,
        target: usize,
        delta: isize,
        allow_excessive_discordance: bool,
    ) -> Result<HemoData> {
        let original = &self.ys[target].values;
        let n = original.len() as isize;
        let k = (((delta % n) + n) % n) as usize;

        let boundary = (original[original.len() - 1] - original[0]).abs();
        let mean_adjacent = if original.len() > 1 {
            original.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f64>()
                / (original.len() - 1) as f64
        } else {
            0.0
        }
        .max(MIN_MEAN_ADJACENT_DIFF);
        let threshold = DISCORDANCE_FACTOR * mean_adjacent;
        if boundary > threshold {
            if !allow_excessive_discordance {
                return Err(WiaError::Discordance {
                    boundary,
                    threshold,
                });
            }
            log::warn!(
                "wrapping '{}' across a boundary jump of {boundary} (threshold {threshold})",
                self.ys[target].header
            );
        }

        let mut rotated = original.clone();
        rotated.rotate_left(k);
        let mut out = self.clone();
        out.ys[target].replace_values(rotated);
        let x = out.x.as_ref().map(|c| c.values.as_slice()).unwrap_or(&[]);
        for ch in &mut out.ys {
            ch.compute_all_caches(x);
        }
        Ok(out)
    }

    /// Crop channel `target` to `shifted` and the domain plus every other channel to `others`.
    fn crop_channels(&mut self, target: usize, shifted: Range<usize>, others: Range<usize>) {
        if let Some(x) = self.x.as_mut() {
            *x = x.cropped(others.start, others.end);
        }
        let ys: Vec<Channel> = self
            .ys
            .iter()
            .enumerate()
            .map(|(i, ch)| {
                if i == target {
                    ch.cropped(shifted.start, shifted.end)
                } else {
                    ch.cropped(others.start, others.end)
                }
            })
            .collect();
        self.ys = ys;
    }
}
