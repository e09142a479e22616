//! Location and compass source interfaces.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use landbook_core::model::Point;
use landbook_core::types::Timestamp;

use crate::error::EnvError;
use crate::subscription::Subscription;

/// One position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub point: Point,
    /// Horizontal accuracy radius in meters, when the source reports one.
    pub accuracy_m: Option<f32>,
    pub timestamp: Timestamp,
}

impl Location {
    /// Fix at `point` stamped now, without accuracy.
    pub fn at(point: Point) -> Self {
        Self {
            point,
            accuracy_m: None,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Power/accuracy trade-off requested from a location source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    HighAccuracy,
    BalancedPowerAccuracy,
    LowPower,
    Passive,
}

/// Parameters of a location subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRequest {
    pub priority: Priority,
    /// Desired time between fixes.
    pub interval: Duration,
    /// Fixes arriving faster than this are not delivered.
    pub fastest_interval: Duration,
    /// Fixes closer than this to the last delivered one are not delivered.
    pub min_displacement_m: f64,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            priority: Priority::HighAccuracy,
            interval: Duration::from_millis(1000),
            fastest_interval: Duration::from_millis(500),
            min_displacement_m: 0.0,
        }
    }
}

/// Parameters of a bearing subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct BearingRequest {
    pub interval: Duration,
    pub fastest_interval: Duration,
    /// Bearings within this many degrees of the last delivered one are
    /// not delivered.
    pub min_degree_change: f32,
}

impl Default for BearingRequest {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            fastest_interval: Duration::from_millis(100),
            min_degree_change: 1.0,
        }
    }
}

/// A source of position fixes.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Start a stream of fixes. Fails up front when permission is missing
    /// or the provider is disabled.
    fn location_updates(&self, request: LocationRequest) -> Result<Subscription<Location>, EnvError>;

    /// Wait for one fresh fix.
    async fn current_location(&self, priority: Priority) -> Result<Location, EnvError>;

    /// The most recent fix the source has seen, if any.
    async fn last_known_location(&self) -> Result<Option<Location>, EnvError>;
}

/// A source of device bearings in degrees clockwise from magnetic north.
pub trait CompassProvider: Send + Sync {
    fn bearing_updates(&self, request: BearingRequest) -> Result<Subscription<f32>, EnvError>;
}
