//! presenza-remote — Recognition backend client.
//!
//! Delegates extraction + matching to an external recognition service
//! over HTTP, bounded by a hard timeout. Network-layer failures never
//! surface to callers: they route to a deterministic degraded fallback
//! so attendance capture stays available during backend outages.

pub mod client;
pub mod fallback;

pub use client::{RecognitionClient, RemoteError, DEFAULT_TIMEOUT};
