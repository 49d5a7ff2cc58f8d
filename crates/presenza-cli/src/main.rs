use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use presenza_core::{extractor, Descriptor, MatchPolicy, POLICY_VERSION};
use presenza_geo::GeofenceZone;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "presenza", about = "Presenza attendance verification diagnostics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a face descriptor from an image file
    Extract {
        /// Image file (PNG/JPEG)
        image: PathBuf,
        /// Write descriptor JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Match an image against a stored descriptor
    Match {
        /// Captured image file
        image: PathBuf,
        /// Enrolled descriptor JSON (from `presenza extract`)
        descriptor: PathBuf,
        /// Confidence threshold percentage
        #[arg(short, long, default_value_t = 70.0)]
        threshold: f32,
    },
    /// Check a coordinate against a zone configuration file
    Geofence {
        latitude: f64,
        longitude: f64,
        /// Zone configuration (zones.toml)
        #[arg(short, long)]
        zones: PathBuf,
        /// Reported GPS accuracy in meters, for grading
        #[arg(short, long)]
        accuracy: Option<f64>,
    },
    /// Print the active confidence scoring policy
    Policy,
}

/// Matches the daemon's `zones.toml` layout.
#[derive(Deserialize)]
struct ZoneFile {
    #[serde(default)]
    zones: Vec<GeofenceZone>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { image, output } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let descriptor = extractor::extract_from_bytes(&bytes)?;
            let json = serde_json::to_string_pretty(&descriptor)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("descriptor ({} dims) written to {}", descriptor.len(), path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Match { image, descriptor, threshold } => {
            let enrolled: Descriptor = serde_json::from_str(
                &std::fs::read_to_string(&descriptor)
                    .with_context(|| format!("reading {}", descriptor.display()))?,
            )
            .context("parsing descriptor JSON")?;
            let bytes = std::fs::read(&image)
                .with_context(|| format!("reading {}", image.display()))?;
            let probe = extractor::extract_from_bytes(&bytes)?;

            let policy = MatchPolicy::with_threshold(threshold);
            let result = policy.compare(&enrolled, &probe);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.matched {
                std::process::exit(1);
            }
        }
        Commands::Geofence { latitude, longitude, zones, accuracy } => {
            let file: ZoneFile = toml::from_str(
                &std::fs::read_to_string(&zones)
                    .with_context(|| format!("reading {}", zones.display()))?,
            )
            .context("parsing zone TOML")?;

            let result = presenza_geo::check(latitude, longitude, &file.zones)?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if !result.within && !file.zones.is_empty() {
                let (name, distance) = presenza_geo::nearest(latitude, longitude, &file.zones)?;
                println!("nearest zone: {name} ({distance:.0} m away)");
            }
            if let Some(acc) = accuracy {
                println!("gps accuracy: {} ({acc:.0} m)", presenza_geo::accuracy_grade(acc));
            }
            if !result.within {
                std::process::exit(1);
            }
        }
        Commands::Policy => {
            let policy = MatchPolicy::default();
            println!("version:   {POLICY_VERSION}");
            println!("threshold: {:.1}%", policy.threshold);
            println!("steepness: {:.1}", policy.steepness);
        }
    }

    Ok(())
}
