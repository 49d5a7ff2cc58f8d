//! Geofence zone store — administrator-mutable, read-mostly.
//!
//! The engine snapshots the zone list at call time so a containment
//! check never holds the lock. Writes serialize behind the write lock.

use presenza_geo::GeofenceZone;
use serde::Deserialize;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZoneError {
    #[error("zone radius must be positive, got {0}")]
    InvalidRadius(f64),
    #[error("zone {0} already exists")]
    DuplicateName(String),
    #[error("unknown zone {0}")]
    UnknownZone(String),
    #[error("zone file parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level zone file structure (`zones.toml`).
#[derive(Debug, Deserialize)]
struct ZoneFile {
    #[serde(default)]
    zones: Vec<GeofenceZone>,
}

/// Mutable set of configured geofence zones, in insertion order.
#[derive(Default)]
pub struct ZoneStore {
    zones: RwLock<Vec<GeofenceZone>>,
}

impl ZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `zones.toml` document and seed a store from it.
    pub fn from_toml_str(source: &str) -> Result<Self, ZoneError> {
        let file: ZoneFile = toml::from_str(source)?;
        let store = Self::new();
        for zone in file.zones {
            store.add(zone)?;
        }
        Ok(store)
    }

    pub fn add(&self, zone: GeofenceZone) -> Result<(), ZoneError> {
        if zone.radius_meters <= 0.0 {
            return Err(ZoneError::InvalidRadius(zone.radius_meters));
        }
        let mut zones = self.zones.write().unwrap_or_else(|e| e.into_inner());
        if zones.iter().any(|z| z.name == zone.name) {
            return Err(ZoneError::DuplicateName(zone.name));
        }
        tracing::info!(zone = %zone.name, radius_m = zone.radius_meters, "zone added");
        zones.push(zone);
        Ok(())
    }

    /// Replace an existing zone by name, keeping its position in the list.
    pub fn update(&self, zone: GeofenceZone) -> Result<(), ZoneError> {
        if zone.radius_meters <= 0.0 {
            return Err(ZoneError::InvalidRadius(zone.radius_meters));
        }
        let mut zones = self.zones.write().unwrap_or_else(|e| e.into_inner());
        match zones.iter_mut().find(|z| z.name == zone.name) {
            Some(slot) => {
                *slot = zone;
                Ok(())
            }
            None => Err(ZoneError::UnknownZone(zone.name)),
        }
    }

    /// Remove a zone by name. Returns true when it existed.
    pub fn remove(&self, name: &str) -> bool {
        let mut zones = self.zones.write().unwrap_or_else(|e| e.into_inner());
        let before = zones.len();
        zones.retain(|z| z.name != name);
        zones.len() != before
    }

    /// Clone the current zone list. Containment checks run on the
    /// snapshot, never under the lock.
    pub fn snapshot(&self) -> Vec<GeofenceZone> {
        self.zones.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.zones.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
