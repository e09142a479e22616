use std::time::Duration;

use anyhow::{Context, Result};

use landbook_core::color::{Argb, DEFAULT_LAND_COLOR};
use landbook_events::LocationRequest;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    /// Color for lands that do not specify one (default: `FF2E7D32`).
    pub default_color: Argb,
    /// Emit JSON log lines instead of plain text (default: off).
    pub log_json: bool,
    /// Time between replayed location fixes (default: `1000` ms).
    pub location_interval: Duration,
    /// Fixes closer than this to the previous one are dropped (default: `0`).
    pub min_displacement_m: f64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_color: DEFAULT_LAND_COLOR,
            log_json: false,
            location_interval: Duration::from_millis(1000),
            min_displacement_m: 0.0,
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default    |
    /// |---------------------------------|------------|
    /// | `LANDBOOK_DEFAULT_COLOR`        | `FF2E7D32` |
    /// | `LANDBOOK_LOG_JSON`             | `0`        |
    /// | `LANDBOOK_LOCATION_INTERVAL_MS` | `1000`     |
    /// | `LANDBOOK_MIN_DISPLACEMENT_M`   | `0`        |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let default_color = match lookup("LANDBOOK_DEFAULT_COLOR") {
            Some(raw) => Argb::from_hex(&raw)
                .with_context(|| format!("LANDBOOK_DEFAULT_COLOR must be AARRGGBB hex, got {raw:?}"))?,
            None => defaults.default_color,
        };

        let log_json = lookup("LANDBOOK_LOG_JSON")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(defaults.log_json);

        let location_interval = match lookup("LANDBOOK_LOCATION_INTERVAL_MS") {
            Some(raw) => {
                let millis: u64 = raw
                    .trim()
                    .parse()
                    .context("LANDBOOK_LOCATION_INTERVAL_MS must be a valid u64")?;
                anyhow::ensure!(millis > 0, "LANDBOOK_LOCATION_INTERVAL_MS must be positive");
                Duration::from_millis(millis)
            }
            None => defaults.location_interval,
        };

        let min_displacement_m = match lookup("LANDBOOK_MIN_DISPLACEMENT_M") {
            Some(raw) => {
                let value: f64 = raw
                    .trim()
                    .parse()
                    .context("LANDBOOK_MIN_DISPLACEMENT_M must be a number")?;
                anyhow::ensure!(
                    value.is_finite() && value >= 0.0,
                    "LANDBOOK_MIN_DISPLACEMENT_M must be non-negative, got {value}"
                );
                value
            }
            None => defaults.min_displacement_m,
        };

        Ok(Self {
            default_color,
            log_json,
            location_interval,
            min_displacement_m,
        })
    }

    /// Location request used when replaying a track.
    pub fn location_request(&self) -> LocationRequest {
        LocationRequest {
            interval: self.location_interval,
            fastest_interval: self.location_interval / 2,
            min_displacement_m: self.min_displacement_m,
            ..LocationRequest::default()
        }
    }
}
