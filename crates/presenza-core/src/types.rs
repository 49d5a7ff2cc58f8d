use serde::{Deserialize, Serialize};

/// Face descriptor vector (128-dimensional for the histogram/edge pipeline).
///
/// Descriptors are comparable only when their lengths match; the matcher
/// reports an infinite distance otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
    /// Pipeline version that produced this descriptor (e.g., "hist-edge-v1").
    /// Remote backends may report their own version; `None` for descriptors
    /// of unknown origin.
    pub pipeline_version: Option<String>,
}

impl Descriptor {
    /// Compute Euclidean distance to another descriptor.
    ///
    /// Returns `f32::INFINITY` when the dimensions differ — mismatched
    /// descriptors can never match, but the comparison must still produce
    /// a reportable value for audit logs.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Which computation path produced a match result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    /// Local feature extraction + Euclidean matching (correctness baseline).
    Local,
    /// External recognition backend over HTTP.
    Remote,
    /// Deterministic degraded-mode fingerprint comparison.
    Fallback,
}

impl std::fmt::Display for MatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchSource::Local => write!(f, "local"),
            MatchSource::Remote => write!(f, "remote"),
            MatchSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Result of comparing a probe against an enrolled descriptor.
///
/// Produced per verification attempt; never persisted by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: bool,
    /// Confidence percentage in [0, 100].
    pub confidence: f32,
    /// Euclidean distance; `f32::INFINITY` on dimension mismatch.
    pub distance: f32,
    pub source: MatchSource,
    /// True when the result came from the degraded fallback path and does
    /// not carry the assurance of a real biometric comparison.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Descriptor { values: vec![0.1, 0.2, 0.3], pipeline_version: None };
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_euclidean_distance_known() {
        let a = Descriptor { values: vec![0.0, 0.0], pipeline_version: None };
        let b = Descriptor { values: vec![3.0, 4.0], pipeline_version: None };
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_symmetric() {
        let a = Descriptor { values: vec![0.5, -0.25, 1.0], pipeline_version: None };
        let b = Descriptor { values: vec![-0.5, 0.75, 0.0], pipeline_version: None };
        assert_eq!(a.euclidean_distance(&b), b.euclidean_distance(&a));
    }

    #[test]
    fn test_euclidean_distance_dimension_mismatch() {
        let a = Descriptor { values: vec![1.0, 2.0], pipeline_version: None };
        let b = Descriptor { values: vec![1.0, 2.0, 3.0], pipeline_version: None };
        assert!(a.euclidean_distance(&b).is_infinite());
    }

    #[test]
    fn test_match_source_serde_lowercase() {
        assert_eq!(serde_json::to_string(&MatchSource::Fallback).unwrap(), "\"fallback\"");
        assert_eq!(serde_json::to_string(&MatchSource::Remote).unwrap(), "\"remote\"");
    }
}
