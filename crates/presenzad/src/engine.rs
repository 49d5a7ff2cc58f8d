//! Verification engine — composes matching and geofencing into a single
//! accept/reject decision.
//!
//! Both gates run for every attempt (after the enrollment pre-check) so
//! a rejection reports every failing gate, not just the first. The
//! enrolled descriptor is cloned out of the store before the backend
//! call; no lock is held across the network boundary.

use crate::store::{EnrollmentStore, StoreError};
use crate::zones::ZoneStore;
use chrono::{DateTime, Utc};
use presenza_core::{extractor, MatchPolicy, MatchResult};
use presenza_geo::{GeofenceResult, GeofenceZone};
use presenza_remote::{RecognitionClient, RemoteError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error(transparent)]
    Image(#[from] extractor::ExtractorError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a verification attempt was rejected, in gate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotEnrolled,
    InvalidImage,
    FaceMismatch,
    InvalidCoordinate,
    OutsideGeofence,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RejectReason::NotEnrolled => "not_enrolled",
            RejectReason::InvalidImage => "invalid_image",
            RejectReason::FaceMismatch => "face_mismatch",
            RejectReason::InvalidCoordinate => "invalid_coordinate",
            RejectReason::OutsideGeofence => "outside_geofence",
        };
        write!(f, "{name}")
    }
}

/// The decision handed to the persistence collaborator. Accepted records
/// become "pending approval"; rejections carry every failing gate plus
/// the match/geofence evidence for audit.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationDecision {
    pub id: Uuid,
    pub identity_id: String,
    pub accepted: bool,
    /// `None` only when matching never ran (not enrolled, unusable image).
    pub match_result: Option<MatchResult>,
    /// `None` only when the geofence check never ran (not enrolled,
    /// out-of-range coordinate).
    pub geofence: Option<GeofenceResult>,
    pub reasons: Vec<RejectReason>,
    pub decided_at: DateTime<Utc>,
}

/// Composition root of the verification pipeline.
pub struct Engine {
    store: Arc<EnrollmentStore>,
    zones: Arc<ZoneStore>,
    remote: Option<RecognitionClient>,
    policy: MatchPolicy,
}

impl Engine {
    pub fn new(
        store: Arc<EnrollmentStore>,
        zones: Arc<ZoneStore>,
        remote: Option<RecognitionClient>,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            store,
            zones,
            remote,
            policy,
        }
    }

    /// One-time enrollment: extract a descriptor from the captured image
    /// and lock it in for the identity.
    pub fn enroll(&self, identity_id: &str, image: &[u8]) -> Result<DateTime<Utc>, EnrollError> {
        let descriptor = extractor::extract_from_bytes(image)?;
        let enrolled_at = self.store.enroll(identity_id, descriptor)?;
        Ok(enrolled_at)
    }

    /// Decide whether this attendance event can be accepted.
    ///
    /// Never returns an error: every failure mode becomes a structured
    /// rejection with reasons.
    pub async fn verify(
        &self,
        identity_id: &str,
        image: &[u8],
        user_lat: f64,
        user_lng: f64,
    ) -> VerificationDecision {
        let mut reasons = Vec::new();

        // Gate 0: enrollment pre-check. Short-circuits both gates.
        let Some(record) = self.store.get(identity_id).filter(|r| r.locked) else {
            tracing::info!(identity = identity_id, "verify rejected: not enrolled");
            return self.decision(identity_id, None, None, vec![RejectReason::NotEnrolled]);
        };

        // Gate 1: face match — remote with fallback, or fully local.
        let match_result = match &self.remote {
            Some(client) => match client.match_remote(&record.descriptor, image, &self.policy).await {
                Ok(result) => Some(result),
                Err(RemoteError::InvalidInput(detail)) => {
                    tracing::info!(identity = identity_id, detail, "verify: unusable input");
                    reasons.push(RejectReason::InvalidImage);
                    None
                }
            },
            None => match extractor::extract_from_bytes(image) {
                Ok(probe) => Some(self.policy.compare(&record.descriptor, &probe)),
                Err(err) => {
                    tracing::info!(identity = identity_id, error = %err, "verify: unusable image");
                    reasons.push(RejectReason::InvalidImage);
                    None
                }
            },
        };

        if let Some(result) = &match_result {
            if result.degraded {
                tracing::warn!(
                    identity = identity_id,
                    confidence = result.confidence,
                    "match answered by degraded fallback; reduced assurance"
                );
            }
            if !result.matched {
                reasons.push(RejectReason::FaceMismatch);
            }
        }

        // Gate 2: geofence, always evaluated alongside the face gate.
        let geofence = match geofence_gate(user_lat, user_lng, &self.zones.snapshot()) {
            Ok(result) => {
                if !result.within {
                    reasons.push(RejectReason::OutsideGeofence);
                }
                Some(result)
            }
            Err(err) => {
                tracing::info!(identity = identity_id, error = %err, "verify: bad coordinate");
                reasons.push(RejectReason::InvalidCoordinate);
                None
            }
        };

        self.decision(identity_id, match_result, geofence, reasons)
    }

    fn decision(
        &self,
        identity_id: &str,
        match_result: Option<MatchResult>,
        geofence: Option<GeofenceResult>,
        reasons: Vec<RejectReason>,
    ) -> VerificationDecision {
        let matched = match_result.as_ref().map(|m| m.matched).unwrap_or(false);
        let within = geofence.as_ref().map(|g| g.within).unwrap_or(false);
        let accepted = matched && within;
        debug_assert_eq!(accepted, reasons.is_empty());

        let decision = VerificationDecision {
            id: Uuid::new_v4(),
            identity_id: identity_id.to_string(),
            accepted,
            match_result,
            geofence,
            reasons,
            decided_at: Utc::now(),
        };

        tracing::info!(
            identity = identity_id,
            accepted = decision.accepted,
            confidence = decision.match_result.as_ref().map(|m| m.confidence),
            zone = decision.geofence.as_ref().and_then(|g| g.zone_name.as_deref()),
            reasons = ?decision.reasons,
            "verification decided"
        );
        decision
    }
}

/// Evaluates the geofence against one immutable zone slice. Containment
/// and the nearest-zone diagnostics attached on failure come from the
/// same slice, so a concurrent zone update cannot make the reported
/// nearest zone disagree with the containment verdict.
fn geofence_gate(
    user_lat: f64,
    user_lng: f64,
    zones: &[GeofenceZone],
) -> Result<GeofenceResult, presenza_geo::GeoError> {
    let mut result = presenza_geo::check(user_lat, user_lng, zones)?;
    if !result.within {
        if let Ok((name, distance)) = presenza_geo::nearest(user_lat, user_lng, zones) {
            result.zone_name = Some(name);
            result.distance_meters = Some(distance);
        }
    }
    Ok(result)
}
