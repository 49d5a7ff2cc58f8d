//! Enrollment store — one descriptor per identity, at-most-one lifecycle.
//!
//! Read-mostly: lookups clone the record out under a read lock, writes
//! (enroll / reset / delete) serialize behind the write lock so two
//! concurrent enrolls for the same identity cannot both observe
//! "unlocked".

use chrono::{DateTime, Utc};
use presenza_core::Descriptor;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("identity {0} is already enrolled; an administrative reset is required")]
    AlreadyEnrolled(String),
}

/// Stored enrollment for one identity.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentRecord {
    pub identity_id: String,
    pub descriptor: Descriptor,
    pub enrolled_at: DateTime<Utc>,
    /// Set on successful enrollment; only an administrative reset clears it.
    pub locked: bool,
}

/// In-memory enrollment store keyed by identity.
#[derive(Default)]
pub struct EnrollmentStore {
    records: RwLock<HashMap<String, EnrollmentRecord>>,
}

impl EnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll a descriptor for an identity and lock the record.
    ///
    /// Fails with [`StoreError::AlreadyEnrolled`] when a locked record
    /// exists. An unlocked record (post-reset) is replaced, last write
    /// wins. Returns the enrollment timestamp.
    pub fn enroll(&self, identity_id: &str, descriptor: Descriptor) -> Result<DateTime<Utc>, StoreError> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = records.get(identity_id) {
            if existing.locked {
                return Err(StoreError::AlreadyEnrolled(identity_id.to_string()));
            }
        }

        let enrolled_at = Utc::now();
        records.insert(
            identity_id.to_string(),
            EnrollmentRecord {
                identity_id: identity_id.to_string(),
                descriptor,
                enrolled_at,
                locked: true,
            },
        );
        tracing::info!(identity = identity_id, "enrollment stored");
        Ok(enrolled_at)
    }

    /// Clone the record for an identity, if any.
    pub fn get(&self, identity_id: &str) -> Option<EnrollmentRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity_id)
            .cloned()
    }

    /// True iff a record exists and is locked.
    pub fn is_enrolled(&self, identity_id: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity_id)
            .map(|r| r.locked)
            .unwrap_or(false)
    }

    /// Administrative unlock: keeps the descriptor, allows re-enrollment.
    /// Returns true when a record existed.
    pub fn reset(&self, identity_id: &str) -> bool {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.get_mut(identity_id) {
            Some(record) => {
                record.locked = false;
                tracing::info!(identity = identity_id, "enrollment reset");
                true
            }
            None => false,
        }
    }

    /// Remove the record entirely. Returns true when a record existed.
    pub fn delete(&self, identity_id: &str) -> bool {
        let removed = self
            .records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(identity_id)
            .is_some();
        if removed {
            tracing::info!(identity = identity_id, "enrollment deleted");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
