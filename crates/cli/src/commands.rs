use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use landbook_core::color::Argb;
use landbook_core::geofence::{resolve, FieldSnapshot, TrackingState};
use landbook_core::kml;
use landbook_core::model::{Land, Point, Ring};
use landbook_core::types::DbId;
use landbook_db::repositories::LandRepo;
use landbook_db::services::{import_kml, ImportError};
use landbook_db::Store;
use landbook_events::{Location, ReplayLocationProvider, TrackingService};

use crate::config::CliConfig;

/// How long to wait for the tracker to report on one replayed fix.
const FIX_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "landbook")]
#[command(about = "Field boundaries: KML import/export and geofencing", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a KML file and print its lands as JSON
    Inspect { file: PathBuf },
    /// Encode a JSON list of lands as KML
    Export {
        /// JSON array of lands
        lands: PathBuf,
        /// Where to write the KML document
        out: PathBuf,
    },
    /// Classify a point against the lands of a KML file
    Locate {
        file: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Replay a `lat,lon` track against the lands of a KML file
    Track { file: PathBuf, track: PathBuf },
}

/// Shown for any file that cannot be read or decoded. The cause is logged.
#[derive(Debug, thiserror::Error)]
#[error("cannot read file")]
pub struct UnreadableFile;

pub async fn run(cli: Cli, config: &CliConfig) -> Result<()> {
    match cli.command {
        Commands::Inspect { file } => inspect(&file).await,
        Commands::Export { lands, out } => export(&lands, &out, config).await,
        Commands::Locate { file, lat, lon } => locate(&file, Point::new(lat, lon)).await,
        Commands::Track { file, track } => replay(&file, &track, config).await,
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Failed to read file");
        UnreadableFile.into()
    })
}

/// Import a KML file into a fresh store.
async fn load_store(path: &Path) -> Result<Store> {
    let text = read_text(path).await?;
    let store = landbook_db::open_memory_store().await?;
    match import_kml(&store, &text).await {
        Ok(summary) => {
            tracing::info!(
                path = %path.display(),
                imported = summary.imported.len(),
                skipped = summary.skipped,
                "KML loaded"
            );
            Ok(store)
        }
        Err(ImportError::Kml(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to decode KML");
            Err(UnreadableFile.into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn inspect(path: &Path) -> Result<()> {
    let text = read_text(path).await?;
    let report = kml::decode_report(&text).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Failed to decode KML");
        UnreadableFile
    })?;
    tracing::info!(
        lands = report.lands.len(),
        skipped = report.skipped,
        points = report.lands.iter().map(|l| l.border.len()).sum::<usize>(),
        "KML decoded"
    );
    println!("{}", serde_json::to_string_pretty(&report.lands)?);
    Ok(())
}

/// A land as written by hand in the export input; everything except the
/// border is optional.
#[derive(Debug, Deserialize)]
struct LandInput {
    #[serde(default)]
    id: DbId,
    #[serde(default)]
    title: String,
    color: Option<Argb>,
    border: Ring,
    #[serde(default)]
    holes: Vec<Ring>,
}

impl LandInput {
    fn into_land(self, default_color: Argb) -> Land {
        Land::new(
            self.id,
            self.title,
            self.color.unwrap_or(default_color),
            self.border,
            self.holes,
        )
    }
}

fn parse_lands(text: &str, default_color: Argb) -> Result<Vec<Land>> {
    let inputs: Vec<LandInput> = serde_json::from_str(text).context("invalid lands JSON")?;
    Ok(inputs
        .into_iter()
        .map(|input| input.into_land(default_color))
        .collect())
}

async fn export(lands_path: &Path, out: &Path, config: &CliConfig) -> Result<()> {
    let text = read_text(lands_path).await?;
    let lands = parse_lands(&text, config.default_color)?;
    let Some(document) = kml::encode(&lands) else {
        println!("nothing to export: no land has a border");
        return Ok(());
    };
    tokio::fs::write(out, &document)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    tracing::info!(lands = lands.len(), path = %out.display(), "KML written");
    Ok(())
}

async fn locate(path: &Path, point: Point) -> Result<()> {
    let store = load_store(path).await?;
    let snapshot = FieldSnapshot {
        lands: LandRepo::list(&store).await?,
        ..FieldSnapshot::default()
    };
    let state = resolve(Some(&point), Arc::new(snapshot));
    println!("{}", describe(&state));
    Ok(())
}

async fn replay(path: &Path, track_path: &Path, config: &CliConfig) -> Result<()> {
    let store = load_store(path).await?;
    let track = parse_track(&read_text(track_path).await?)?;
    for line in replay_track(store, track, config).await? {
        println!("{line}");
    }
    Ok(())
}

/// Feed `track` to a tracking service one fix per location interval and
/// describe the state reported for each fix.
async fn replay_track(store: Store, track: Vec<Point>, config: &CliConfig) -> Result<Vec<String>> {
    let provider = ReplayLocationProvider::live();
    let service = Arc::new(
        TrackingService::new(store, Arc::new(provider.clone()))
            .with_location_request(config.location_request()),
    );
    let mut updates = service.subscribe();
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let service = service.clone();
        let cancel = cancel.clone();
        async move { service.run(cancel).await }
    });
    provider.wait_for_listeners(1).await;

    let mut ticks = tokio::time::interval(config.location_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut lines = Vec::with_capacity(track.len());
    for point in track {
        ticks.tick().await;
        let fix = Location::at(point);
        provider.push(fix);
        let reported = tokio::time::timeout(FIX_TIMEOUT, updates.wait_for(|u| u.location == Some(fix)))
            .await
            .ok()
            .and_then(Result::ok)
            .map(|update| describe(&update.state));
        lines.push(match reported {
            Some(line) => format!("{},{} {line}", point.latitude, point.longitude),
            None => format!("{},{} skipped", point.latitude, point.longitude),
        });
    }

    cancel.cancel();
    task.await.context("tracking task panicked")??;
    Ok(lines)
}

/// Parse `lat,lon` lines. Blank lines and `#` comments are ignored.
fn parse_track(text: &str) -> Result<Vec<Point>> {
    text.lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| {
            let (lat, lon) = line
                .split_once(',')
                .with_context(|| format!("line {number}: expected `lat,lon`"))?;
            let lat: f64 = lat
                .trim()
                .parse()
                .with_context(|| format!("line {number}: bad latitude"))?;
            let lon: f64 = lon
                .trim()
                .parse()
                .with_context(|| format!("line {number}: bad longitude"))?;
            Ok(Point::new(lat, lon))
        })
        .collect()
}

fn describe(state: &TrackingState) -> String {
    match state.title() {
        Some(title) => format!("{} {title:?}", state.label()),
        None => state.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use landbook_core::color::DEFAULT_LAND_COLOR;

    use super::*;

    #[test]
    fn test_parse_track() {
        let track = parse_track("# walk\n45.0, 7.0\n\n45.001,7.002\n").unwrap();
        assert_eq!(track, vec![Point::new(45.0, 7.0), Point::new(45.001, 7.002)]);
    }

    #[test]
    fn test_parse_track_reports_line() {
        let err = parse_track("45,7\n45;7\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
        assert!(parse_track("x,7").is_err());
    }

    #[test]
    fn test_parse_lands_fills_defaults() {
        let text = r#"[
            {"title": "North", "border": [
                {"latitude": 0.0, "longitude": 0.0},
                {"latitude": 0.0, "longitude": 1.0},
                {"latitude": 1.0, "longitude": 1.0}
            ]},
            {"id": 4, "color": 2147483648, "border": [], "holes": [[]]}
        ]"#;
        let lands = parse_lands(text, DEFAULT_LAND_COLOR).unwrap();
        assert_eq!(lands.len(), 2);
        assert_eq!(lands[0].id, 0);
        assert_eq!(lands[0].color, DEFAULT_LAND_COLOR);
        assert_eq!(lands[1].id, 4);
        assert_eq!(lands[1].color, Argb(0x8000_0000));
        assert!(lands[1].holes.is_empty());
    }

    #[test]
    fn test_describe() {
        let snapshot = Arc::new(FieldSnapshot::default());
        assert_eq!(describe(&resolve(None, snapshot.clone())), "waiting_for_location");
        let land = Land::new(1, "North", DEFAULT_LAND_COLOR, vec![], vec![]);
        let state = TrackingState::InsideLand { land, snapshot };
        assert_eq!(describe(&state), "inside_land \"North\"");
    }

    #[tokio::test]
    async fn test_replay_waits_one_interval_between_fixes() {
        let store = landbook_db::open_memory_store().await.unwrap();
        let land = Land::new(
            0,
            "North",
            DEFAULT_LAND_COLOR,
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 1.0),
                Point::new(1.0, 1.0),
                Point::new(1.0, 0.0),
            ],
            vec![],
        );
        LandRepo::insert(&store, &land).await.unwrap();
        let config = CliConfig {
            location_interval: Duration::from_millis(100),
            ..CliConfig::default()
        };
        let track = vec![Point::new(0.5, 0.5), Point::new(2.0, 2.0), Point::new(0.2, 0.2)];

        let started = tokio::time::Instant::now();
        let lines = replay_track(store, track, &config).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200), "{:?}", started.elapsed());
        assert_eq!(
            lines,
            vec![
                "0.5,0.5 inside_land \"North\"".to_string(),
                "2,2 not_inside".to_string(),
                "0.2,0.2 inside_land \"North\"".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_unreadable() {
        let err = load_store(Path::new("/nonexistent/fields.kml")).await.unwrap_err();
        assert_matches!(err.downcast_ref::<UnreadableFile>(), Some(UnreadableFile));
        assert_eq!(err.to_string(), "cannot read file");
    }
}
