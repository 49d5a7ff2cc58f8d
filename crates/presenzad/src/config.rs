use presenza_core::MatchPolicy;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Base URL of the external recognition backend. `None` runs the
    /// pipeline fully locally (extraction + Euclidean matching).
    pub backend_url: Option<String>,
    /// Hard timeout in seconds for a backend match call.
    pub backend_timeout_secs: u64,
    /// Minimum confidence percentage for a positive face match.
    pub match_threshold: f32,
    /// Calibration constant of the distance→confidence transform.
    pub confidence_steepness: f32,
    /// Path to the TOML file holding the geofence zone set.
    pub zones_path: PathBuf,
}

impl Config {
    /// Load configuration from `PRESENZA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".config")
            })
            .join("presenza");

        let zones_path = std::env::var("PRESENZA_ZONES_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir.join("zones.toml"));

        Self {
            backend_url: std::env::var("PRESENZA_BACKEND_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            backend_timeout_secs: env_u64("PRESENZA_BACKEND_TIMEOUT_SECS", 30),
            match_threshold: env_f32("PRESENZA_MATCH_THRESHOLD", 70.0),
            confidence_steepness: env_f32("PRESENZA_CONFIDENCE_STEEPNESS", 15.0),
            zones_path,
        }
    }

    /// Scoring policy shared by local, remote, and fallback matching.
    pub fn policy(&self) -> MatchPolicy {
        MatchPolicy {
            threshold: self.match_threshold,
            steepness: self.confidence_steepness,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
