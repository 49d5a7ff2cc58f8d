use crate::fallback;
use base64::Engine;
use presenza_core::{Descriptor, MatchPolicy, MatchResult, MatchSource};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Hard bound on a backend match call before the fallback takes over.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MATCH_ENDPOINT: &str = "/api/face/match";

/// The only caller-visible failures. Everything network-shaped is
/// absorbed into the fallback path.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

/// Internal transport/protocol failures; logged, never propagated.
#[derive(Error, Debug)]
enum CallError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchRequest<'a> {
    enrolled_embedding: &'a [f32],
    captured_image: String,
    threshold: f32,
}

#[derive(Deserialize)]
struct MatchResponse {
    matched: bool,
    confidence: f32,
    distance: f32,
    #[serde(default)]
    message: String,
}

/// HTTP client for the out-of-process recognition service.
#[derive(Clone)]
pub struct RecognitionClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RecognitionClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeout,
        }
    }

    /// Match a captured image against an enrolled descriptor, remotely.
    ///
    /// Always produces a `MatchResult`: on timeout, transport failure,
    /// non-2xx status, or malformed response body the deterministic
    /// degraded fallback answers instead, flagged `degraded = true`.
    pub async fn match_remote(
        &self,
        enrolled: &Descriptor,
        image: &[u8],
        policy: &MatchPolicy,
    ) -> Result<MatchResult, RemoteError> {
        if enrolled.is_empty() {
            return Err(RemoteError::InvalidInput("enrolled descriptor is empty"));
        }
        if image.is_empty() {
            return Err(RemoteError::InvalidInput("captured image is empty"));
        }

        match tokio::time::timeout(self.timeout, self.call(enrolled, image, policy)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => {
                tracing::warn!(
                    error = %err,
                    backend = %self.base_url,
                    "recognition backend failed; answering from degraded fallback"
                );
                Ok(fallback::match_degraded(enrolled, image, policy))
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    backend = %self.base_url,
                    "recognition backend timed out; answering from degraded fallback"
                );
                Ok(fallback::match_degraded(enrolled, image, policy))
            }
        }
    }

    async fn call(
        &self,
        enrolled: &Descriptor,
        image: &[u8],
        policy: &MatchPolicy,
    ) -> Result<MatchResult, CallError> {
        let request = MatchRequest {
            enrolled_embedding: &enrolled.values,
            captured_image: base64::engine::general_purpose::STANDARD.encode(image),
            threshold: policy.threshold,
        };

        let response = self
            .http
            .post(format!("{}{MATCH_ENDPOINT}", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CallError::Status(status));
        }

        let body: MatchResponse = response.json().await?;
        tracing::debug!(
            matched = body.matched,
            confidence = body.confidence,
            distance = body.distance,
            message = %body.message,
            "recognition backend responded"
        );

        Ok(MatchResult {
            matched: body.matched,
            confidence: body.confidence.clamp(0.0, 100.0),
            distance: body.distance.max(0.0),
            source: MatchSource::Remote,
            degraded: false,
        })
    }
}
