//! Degraded-mode matcher.
//!
//! When the recognition backend is unreachable, attendance capture must
//! not hard-fail. This module derives a stable fingerprint from each
//! input with an order-sensitive rolling hash and treats the ratio of
//! the two fingerprints as a pseudo-similarity. The result is
//! deterministic for identical inputs and carries `degraded = true`: it
//! keeps the pipeline available, it is NOT a biometric comparison.

use presenza_core::{Descriptor, MatchPolicy, MatchResult, MatchSource};

/// Order-sensitive rolling hash (djb2 xor variant) over a byte stream.
/// Forced odd so fingerprints are never zero.
fn fingerprint(bytes: impl Iterator<Item = u8>) -> u64 {
    let mut hash: u64 = 5381;
    for b in bytes {
        hash = hash.wrapping_mul(33) ^ b as u64;
    }
    hash | 1
}

/// Compare inputs by fingerprint ratio and score through the shared
/// policy so fallback output stays on the same confidence scale as the
/// real matching paths.
pub fn match_degraded(enrolled: &Descriptor, image: &[u8], policy: &MatchPolicy) -> MatchResult {
    let image_fp = fingerprint(image.iter().copied());
    let descriptor_fp = fingerprint(enrolled.values.iter().flat_map(|v| v.to_le_bytes()));

    let (lo, hi) = if image_fp < descriptor_fp {
        (image_fp as f64, descriptor_fp as f64)
    } else {
        (descriptor_fp as f64, image_fp as f64)
    };
    // Ratio of smaller to larger fingerprint, in (0, 1].
    let pseudo_similarity = lo / hi;

    let confidence = (pseudo_similarity * 100.0) as f32;
    let confidence = confidence.clamp(0.0, 100.0);

    MatchResult {
        matched: policy.decide(confidence),
        confidence,
        // Back-derived through the policy inverse so downstream consumers
        // see a distance consistent with the reported confidence.
        distance: policy.distance_for_confidence(confidence),
        source: MatchSource::Fallback,
        degraded: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(values: Vec<f32>) -> Descriptor {
        Descriptor { values, pipeline_version: None }
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let a = fingerprint(b"hello world".iter().copied());
        let b = fingerprint(b"hello world".iter().copied());
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_order_sensitive() {
        let a = fingerprint(b"ab".iter().copied());
        let b = fingerprint(b"ba".iter().copied());
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_never_zero() {
        assert_ne!(fingerprint(std::iter::empty()), 0);
        assert_ne!(fingerprint(std::iter::repeat(0u8).take(64)), 0);
    }

    #[test]
    fn test_match_degraded_deterministic() {
        let enrolled = desc(vec![0.1, 0.2, 0.3, 0.4]);
        let image = b"captured image payload";
        let policy = MatchPolicy::default();

        let first = match_degraded(&enrolled, image, &policy);
        let second = match_degraded(&enrolled, image, &policy);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first.distance, second.distance);
        assert_eq!(first.matched, second.matched);
    }

    #[test]
    fn test_match_degraded_flags() {
        let result = match_degraded(&desc(vec![0.5; 16]), b"bytes", &MatchPolicy::default());
        assert_eq!(result.source, MatchSource::Fallback);
        assert!(result.degraded);
        assert!((0.0..=100.0).contains(&result.confidence));
    }

    #[test]
    fn test_match_degraded_decision_follows_policy() {
        let enrolled = desc(vec![0.5; 16]);
        let image = b"payload";
        let permissive = MatchPolicy::with_threshold(0.0);
        let impossible = MatchPolicy::with_threshold(101.0);
        assert!(match_degraded(&enrolled, image, &permissive).matched);
        assert!(!match_degraded(&enrolled, image, &impossible).matched);
    }

    #[test]
    fn test_distance_consistent_with_confidence() {
        let policy = MatchPolicy::default();
        let result = match_degraded(&desc(vec![0.1; 8]), b"img", &policy);
        let rescored = policy.confidence(result.distance);
        assert!((rescored - result.confidence).abs() < 0.5);
    }
}
