//! Progress quantization.
//!
//! Engines report progress as a float percentage at whatever rate they like.
//! Only whole multiples of 5 in `[0, 100]` are forwarded, and within one job the
//! forwarded sequence never goes backwards.

use serde::{Deserialize, Serialize};

/// Granularity of forwarded progress.
pub const PROGRESS_STEP: u8 = 5;

/// A forwarded progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgressSample {
    pub percent: u8,
}

/// Maps a raw engine percentage to a sample, if it should be forwarded.
///
/// A sample is emitted when `percent` is within `[0, 100]` and its floor is a
/// multiple of [`PROGRESS_STEP`].
pub fn quantize(percent: f32) -> Option<ProgressSample> {
    if !(0.0..=100.0).contains(&percent) {
        return None;
    }
    let whole = percent.floor() as u8;
    (whole % PROGRESS_STEP == 0).then_some(ProgressSample { percent: whole })
}

/// Per-job filter that keeps the forwarded sequence non-decreasing.
#[derive(Debug, Default)]
pub struct ProgressGate {
    last: Option<ProgressSample>,
}

impl ProgressGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sample to forward for `percent`, if any.
    pub fn offer(&mut self, percent: f32) -> Option<ProgressSample> {
        let sample = quantize(percent)?;
        if self.last.is_some_and(|last| sample < last) {
            return None;
        }
        self.last = Some(sample);
        Some(sample)
    }

    /// Last forwarded sample.
    pub fn last(&self) -> Option<ProgressSample> {
        self.last
    }
}
