//! Distance-to-confidence scoring policy.
//!
//! One versioned policy governs every computation path (local, remote,
//! fallback) so match behavior stays reproducible across them.

use crate::types::{Descriptor, MatchResult, MatchSource};
use serde::{Deserialize, Serialize};

/// Tag for the confidence transform in use; bump when the formula changes.
pub const POLICY_VERSION: &str = "inverse-v1";

/// Accept threshold applied to the confidence percentage.
pub const DEFAULT_THRESHOLD: f32 = 70.0;

/// Calibration constant `k` in `confidence = 100 / (1 + distance * k)`.
///
/// Chosen so distance 0 → 100%, ~0.001 → ~98.5%, ~0.01 → ~87%, with a
/// long tail toward 0 for unrelated faces. Tunable, but must be identical
/// on both sides of the recognition backend boundary.
pub const DEFAULT_STEEPNESS: f32 = 15.0;

/// Confidence scoring and accept/reject policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// Minimum confidence percentage for a positive match.
    pub threshold: f32,
    /// Calibration constant `k` of the inverse transform.
    pub steepness: f32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            steepness: DEFAULT_STEEPNESS,
        }
    }
}

impl MatchPolicy {
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    /// Map a distance to a confidence percentage in [0, 100].
    ///
    /// Monotonically decreasing; a non-finite distance (dimension
    /// mismatch sentinel) always scores 0.
    pub fn confidence(&self, distance: f32) -> f32 {
        if !distance.is_finite() {
            return 0.0;
        }
        (100.0 / (1.0 + distance * self.steepness)).clamp(0.0, 100.0)
    }

    /// Invert [`confidence`](Self::confidence): the distance that would
    /// have produced this confidence. Used by the degraded fallback so its
    /// pseudo-results stay consistent with the policy.
    pub fn distance_for_confidence(&self, confidence: f32) -> f32 {
        if confidence <= 0.0 {
            return f32::INFINITY;
        }
        ((100.0 / confidence.min(100.0)) - 1.0) / self.steepness
    }

    /// Accept iff confidence meets the threshold.
    pub fn decide(&self, confidence: f32) -> bool {
        confidence >= self.threshold
    }

    /// Compare an enrolled descriptor against a probe, locally.
    pub fn compare(&self, enrolled: &Descriptor, probe: &Descriptor) -> MatchResult {
        let distance = enrolled.euclidean_distance(probe);
        let confidence = self.confidence(distance);
        MatchResult {
            matched: self.decide(confidence),
            confidence,
            distance,
            source: MatchSource::Local,
            degraded: false,
        }
    }
}
