//! presenza-geo — Geofence validation.
//!
//! Great-circle distance on a spherical Earth model and containment
//! checks against administrator-configured circular zones.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Named constants ---
/// Mean Earth radius for the spherical haversine model.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Floor applied to zone radii to compensate for consumer-grade GPS error.
pub const GPS_SLACK_METERS: f64 = 50.0;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("coordinate out of range: lat {lat}, lng {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },
    #[error("no geofence zones configured")]
    NoZonesConfigured,
}

/// A named circular zone where attendance may be marked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceZone {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

impl GeofenceZone {
    /// Radius used for containment: the configured radius, floored at
    /// [`GPS_SLACK_METERS`].
    pub fn effective_radius(&self) -> f64 {
        self.radius_meters.max(GPS_SLACK_METERS)
    }
}

/// Outcome of a containment check. Ephemeral, produced per attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeofenceResult {
    pub within: bool,
    /// Matched zone on success; nearest zone when the caller fills in
    /// diagnostics on failure.
    pub zone_name: Option<String>,
    pub distance_meters: Option<f64>,
}

fn validate(lat: f64, lng: f64) -> Result<(), GeoError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(GeoError::InvalidCoordinate { lat, lng });
    }
    Ok(())
}

/// Great-circle distance in meters between two coordinates (haversine).
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> Result<f64, GeoError> {
    validate(lat1, lng1)?;
    validate(lat2, lng2)?;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    Ok(EARTH_RADIUS_METERS * c)
}

/// Check a coordinate against the zone list.
///
/// Zones are tested in list order; the first containing zone wins. An
/// empty list yields `within = false` — absence of zones is a
/// configuration state, not an error, for containment.
pub fn check(user_lat: f64, user_lng: f64, zones: &[GeofenceZone]) -> Result<GeofenceResult, GeoError> {
    validate(user_lat, user_lng)?;

    for zone in zones {
        let distance = distance_meters(user_lat, user_lng, zone.latitude, zone.longitude)?;
        if distance <= zone.effective_radius() {
            tracing::debug!(zone = %zone.name, distance_m = distance, "inside geofence");
            return Ok(GeofenceResult {
                within: true,
                zone_name: Some(zone.name.clone()),
                distance_meters: Some(distance),
            });
        }
    }

    Ok(GeofenceResult {
        within: false,
        zone_name: None,
        distance_meters: None,
    })
}

/// The single closest zone and its distance, regardless of containment.
/// For diagnostic display ("you are N m from Campus").
pub fn nearest(user_lat: f64, user_lng: f64, zones: &[GeofenceZone]) -> Result<(String, f64), GeoError> {
    validate(user_lat, user_lng)?;
    if zones.is_empty() {
        return Err(GeoError::NoZonesConfigured);
    }

    let mut best: Option<(&GeofenceZone, f64)> = None;
    for zone in zones {
        let distance = distance_meters(user_lat, user_lng, zone.latitude, zone.longitude)?;
        if best.map(|(_, d)| distance < d).unwrap_or(true) {
            best = Some((zone, distance));
        }
    }

    // Non-empty list guarantees a best candidate.
    let (zone, distance) = best.ok_or(GeoError::NoZonesConfigured)?;
    Ok((zone.name.clone(), distance))
}

/// GPS accuracy grade for operator display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl std::fmt::Display for AccuracyGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccuracyGrade::Excellent => write!(f, "excellent"),
            AccuracyGrade::Good => write!(f, "good"),
            AccuracyGrade::Fair => write!(f, "fair"),
            AccuracyGrade::Poor => write!(f, "poor"),
        }
    }
}

/// Grade a reported GPS accuracy radius (meters).
pub fn accuracy_grade(accuracy_meters: f64) -> AccuracyGrade {
    if accuracy_meters < 10.0 {
        AccuracyGrade::Excellent
    } else if accuracy_meters < 50.0 {
        AccuracyGrade::Good
    } else if accuracy_meters < 100.0 {
        AccuracyGrade::Fair
    } else {
        AccuracyGrade::Poor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(name: &str, lat: f64, lng: f64, radius: f64) -> GeofenceZone {
        GeofenceZone {
            name: name.into(),
            latitude: lat,
            longitude: lng,
            radius_meters: radius,
        }
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let d = distance_meters(40.7128, -74.006, 40.7128, -74.006).unwrap();
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_distance_symmetric() {
        let d1 = distance_meters(40.7128, -74.006, 40.758, -73.9855).unwrap();
        let d2 = distance_meters(40.758, -73.9855, 40.7128, -74.006).unwrap();
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn test_distance_known_pair() {
        // ~0.001° of latitude ≈ 111.2 m
        let d = distance_meters(40.0, -74.0, 40.001, -74.0).unwrap();
        assert!((d - 111.2).abs() < 1.0, "d = {d}");
    }

    #[test]
    fn test_invalid_latitude_rejected() {
        assert!(matches!(
            distance_meters(91.0, 0.0, 0.0, 0.0),
            Err(GeoError::InvalidCoordinate { .. })
        ));
        assert!(distance_meters(-90.5, 0.0, 0.0, 0.0).is_err());
        assert!(distance_meters(f64::NAN, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_invalid_longitude_rejected() {
        assert!(distance_meters(0.0, 180.5, 0.0, 0.0).is_err());
        assert!(distance_meters(0.0, 0.0, 0.0, -181.0).is_err());
    }

    #[test]
    fn test_check_at_zone_center() {
        let zones = [zone("Campus", 40.7128, -74.006, 100.0)];
        let result = check(40.7128, -74.006, &zones).unwrap();
        assert!(result.within);
        assert_eq!(result.zone_name.as_deref(), Some("Campus"));
        assert_eq!(result.distance_meters, Some(0.0));
    }

    #[test]
    fn test_check_outside_all_zones() {
        let zones = [zone("Campus", 40.7128, -74.006, 100.0)];
        // ~5 km away
        let result = check(40.7578, -74.006, &zones).unwrap();
        assert!(!result.within);
        assert!(result.zone_name.is_none());
    }

    #[test]
    fn test_check_empty_zone_list() {
        let result = check(40.0, -74.0, &[]).unwrap();
        assert!(!result.within);
    }

    #[test]
    fn test_check_first_matching_zone_wins() {
        // Same center, both contain the point; insertion order decides.
        let zones = [
            zone("First", 40.0, -74.0, 200.0),
            zone("Second", 40.0, -74.0, 500.0),
        ];
        let result = check(40.0, -74.0, &zones).unwrap();
        assert_eq!(result.zone_name.as_deref(), Some("First"));
    }

    #[test]
    fn test_small_radius_floored_to_gps_slack() {
        // Zone radius 10 m, user ~33 m away: inside only because of the
        // 50 m floor.
        let zones = [zone("Kiosk", 40.0, -74.0, 10.0)];
        let result = check(40.0003, -74.0, &zones).unwrap();
        assert!(result.within);
    }

    #[test]
    fn test_nearest_picks_closest() {
        let zones = [
            zone("Far", 41.0, -74.0, 100.0),
            zone("Near", 40.001, -74.0, 100.0),
        ];
        let (name, distance) = nearest(40.0, -74.0, &zones).unwrap();
        assert_eq!(name, "Near");
        assert!(distance < 200.0);
    }

    #[test]
    fn test_nearest_empty_zone_list() {
        assert!(matches!(nearest(40.0, -74.0, &[]), Err(GeoError::NoZonesConfigured)));
    }

    #[test]
    fn test_nearest_invalid_coordinate() {
        let zones = [zone("Campus", 40.0, -74.0, 100.0)];
        assert!(nearest(95.0, -74.0, &zones).is_err());
    }

    #[test]
    fn test_accuracy_grades() {
        assert_eq!(accuracy_grade(5.0), AccuracyGrade::Excellent);
        assert_eq!(accuracy_grade(25.0), AccuracyGrade::Good);
        assert_eq!(accuracy_grade(75.0), AccuracyGrade::Fair);
        assert_eq!(accuracy_grade(150.0), AccuracyGrade::Poor);
    }
}
