//! presenza-core — Face descriptor extraction and matching engine.
//!
//! Turns a captured RGB image into a fixed-length 128-dimensional
//! descriptor (intensity histogram + edge histogram + block texture)
//! and scores descriptor pairs with a calibrated confidence transform.

pub mod extractor;
pub mod matcher;
pub mod types;

pub use matcher::{MatchPolicy, POLICY_VERSION};
pub use types::{Descriptor, MatchResult, MatchSource};
