use anyhow::{Context, Result};
use presenza_remote::RecognitionClient;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod store;
mod zones;

use engine::Engine;
use store::EnrollmentStore;
use zones::ZoneStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("presenzad starting");

    let cfg = config::Config::from_env();

    let zone_store = match std::fs::read_to_string(&cfg.zones_path) {
        Ok(source) => ZoneStore::from_toml_str(&source)
            .with_context(|| format!("loading zones from {}", cfg.zones_path.display()))?,
        Err(err) => {
            tracing::warn!(
                path = %cfg.zones_path.display(),
                error = %err,
                "zone file unavailable; starting with an empty zone set"
            );
            ZoneStore::new()
        }
    };
    tracing::info!(zones = zone_store.len(), "zone configuration loaded");

    let remote = cfg.backend_url.as_deref().map(|url| {
        RecognitionClient::new(url, Duration::from_secs(cfg.backend_timeout_secs))
    });
    match &cfg.backend_url {
        Some(url) => tracing::info!(
            backend = %url,
            timeout_secs = cfg.backend_timeout_secs,
            "recognition backend configured; fallback armed"
        ),
        None => tracing::info!("no recognition backend configured; matching locally"),
    }

    let _engine = Engine::new(
        Arc::new(EnrollmentStore::new()),
        Arc::new(zone_store),
        remote,
        cfg.policy(),
    );
    // TODO: expose Engine::enroll/verify to the session collaborator once
    // its transport lands; until then the engine is exercised via the CLI
    // and the test suite.

    tracing::info!("presenzad ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("presenzad shutting down");

    Ok(())
}
