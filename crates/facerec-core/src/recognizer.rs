//! Multi-scale gallery matcher.
//!
//! Scores a canonical probe against every gallery entry at several probe
//! scales using normalized cross-correlation, and reports the best label
//! above a fixed threshold.

use crate::matching;
use crate::normalizer::resize_bilinear;
use crate::types::{CanonicalFace, Gallery, Recognition, CANONICAL_SIZE};
use image::GrayImage;

pub const DEFAULT_THRESHOLD: f32 = 0.4;
pub const DEFAULT_SCALE_START: f32 = 0.8;
pub const DEFAULT_SCALE_END: f32 = 1.2;
pub const DEFAULT_SCALE_STEP: f32 = 0.1;

/// Strategy for comparing a probe face against a gallery of known faces.
pub trait Matcher {
    fn compare(&self, probe: &CanonicalFace, gallery: &Gallery) -> Recognition;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizerConfig {
    /// A match must score strictly above this to be reported.
    pub threshold: f32,
    /// Probe scale factors, tried in order for every gallery entry.
    pub scales: Vec<f32>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            scales: scale_range(DEFAULT_SCALE_START, DEFAULT_SCALE_END, DEFAULT_SCALE_STEP),
        }
    }
}

/// Inclusive arithmetic range `start, start + step, ..., end`.
///
/// Steps are counted rather than accumulated so the end point survives
/// floating-point drift.
pub fn scale_range(start: f32, end: f32, step: f32) -> Vec<f32> {
    if step <= 0.0 || end < start {
        return vec![start];
    }
    let steps = ((end - start) / step + 1e-4).floor() as usize;
    (0..=steps).map(|i| start + step * i as f32).collect()
}

/// Nearest-template recognizer over a [`Gallery`].
///
/// For each entry (insertion order) and each scale (configuration order) the
/// probe is resized and slid over the entry's face. The first pair to exceed
/// both the running best and the threshold takes the lead; equal scores never
/// displace it, so the earliest inserted entry wins ties.
#[derive(Debug, Clone, Default)]
pub struct Recognizer {
    config: RecognizerConfig,
}

impl Recognizer {
    pub fn new(config: RecognizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    pub fn recognize(&self, probe: &CanonicalFace, gallery: &Gallery) -> Recognition {
        let scaled: Vec<(f32, GrayImage)> = self
            .config
            .scales
            .iter()
            .filter_map(|&scale| {
                let side = probe_side(scale)?;
                // Gallery faces are canonical, so a larger probe never fits any entry.
                if side > CANONICAL_SIZE {
                    tracing::trace!(scale, side, "scaled probe exceeds reference size, skipped");
                    return None;
                }
                Some((scale, resize_bilinear(probe.image(), side, side)))
            })
            .collect();

        let mut best = Recognition::unknown();

        for entry in gallery.iter() {
            for (scale, candidate) in &scaled {
                let Some(similarity) = matching::best_score(entry.face.image(), candidate) else {
                    tracing::trace!(
                        label = %entry.label,
                        scale,
                        size = candidate.width(),
                        "scaled probe exceeds reference, skipped"
                    );
                    continue;
                };

                tracing::debug!(label = %entry.label, scale, similarity, "similarity score");

                if similarity > best.score && similarity > self.config.threshold {
                    best = Recognition {
                        label: entry.label.clone(),
                        score: similarity,
                    };
                }
            }
        }

        best
    }
}

impl Matcher for Recognizer {
    fn compare(&self, probe: &CanonicalFace, gallery: &Gallery) -> Recognition {
        self.recognize(probe, gallery)
    }
}

/// Side length of the probe resized by `scale`. `None` for scales that
/// collapse the probe to nothing.
fn probe_side(scale: f32) -> Option<u32> {
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }
    let side = (CANONICAL_SIZE as f32 * scale).round();
    if side < 1.0 {
        return None;
    }
    // Saturates for huge scales, which are rejected against the canonical size.
    Some(side.min(u32::MAX as f32) as u32)
}
