//! Field records: lands, zones, notes and scheduled works.
//!
//! A record with `id == 0` has never been persisted. The `empty`
//! constructors return those unsaved sentinels explicitly; nothing in the
//! crate relies on `Default` to stand in for a missing record.

use serde::{Deserialize, Serialize};

use crate::color::{Argb, DEFAULT_LAND_COLOR};
use crate::geometry;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Point / Ring
// ---------------------------------------------------------------------------

/// A WGS84 coordinate in degrees. Equality is exact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub latitude: f64,
    pub longitude: f64,
}

impl Point {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Ordered polygon boundary. The closing edge (last -> first) is implicit.
pub type Ring = Vec<Point>;

/// Drop inner rings that carry no points.
pub fn non_empty_holes(holes: Vec<Ring>) -> Vec<Ring> {
    holes.into_iter().filter(|hole| !hole.is_empty()).collect()
}

// ---------------------------------------------------------------------------
// Land
// ---------------------------------------------------------------------------

/// A land parcel: one outer border and any number of holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Land {
    pub id: DbId,
    pub title: String,
    pub color: Argb,
    pub border: Ring,
    pub holes: Vec<Ring>,
}

impl Land {
    /// Construct a land, filtering out empty holes.
    pub fn new(
        id: DbId,
        title: impl Into<String>,
        color: Argb,
        border: Ring,
        holes: Vec<Ring>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            color,
            border,
            holes: non_empty_holes(holes),
        }
    }

    /// The unsaved placeholder the editor starts from.
    pub fn empty() -> Self {
        Self {
            id: 0,
            title: String::new(),
            color: DEFAULT_LAND_COLOR,
            border: Vec::new(),
            holes: Vec::new(),
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id != 0
    }

    /// `true` if the point lies inside the border but not inside a hole.
    pub fn contains(&self, point: &Point) -> bool {
        geometry::contains_point(point, &self.border)
            && !self.holes.iter().any(|hole| geometry::contains_point(point, hole))
    }
}

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

/// A sub-area drawn inside a land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: DbId,
    /// Parent land id.
    pub lid: DbId,
    pub title: String,
    pub color: Argb,
    pub border: Ring,
    pub holes: Vec<Ring>,
}

impl Zone {
    pub fn new(
        id: DbId,
        lid: DbId,
        title: impl Into<String>,
        color: Argb,
        border: Ring,
        holes: Vec<Ring>,
    ) -> Self {
        Self {
            id,
            lid,
            title: title.into(),
            color,
            border,
            holes: non_empty_holes(holes),
        }
    }

    /// Unsaved placeholder zone attached to `lid`.
    pub fn empty(lid: DbId) -> Self {
        Self {
            id: 0,
            lid,
            title: String::new(),
            color: DEFAULT_LAND_COLOR,
            border: Vec::new(),
            holes: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// A circular annotation anchored inside a land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: DbId,
    pub lid: DbId,
    pub title: String,
    pub description: String,
    pub color: Argb,
    pub center: Point,
    /// Radius in meters.
    pub radius: f64,
    pub created_at: Timestamp,
    pub edited_at: Timestamp,
}

/// Radius given to new notes.
pub const DEFAULT_NOTE_RADIUS_M: f64 = 10.0;

impl Note {
    /// Unsaved placeholder note at `center`.
    pub fn empty(lid: DbId, center: Point) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: 0,
            lid,
            title: String::new(),
            description: String::new(),
            color: DEFAULT_LAND_COLOR,
            center,
            radius: DEFAULT_NOTE_RADIUS_M,
            created_at: now,
            edited_at: now,
        }
    }

    /// Distance from the note center in meters.
    pub fn distance_to(&self, point: &Point) -> f64 {
        geometry::distance(&self.center, point)
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.distance_to(point) <= self.radius
    }
}

// ---------------------------------------------------------------------------
// Work
// ---------------------------------------------------------------------------

/// A scheduled job, optionally tied to a land and/or zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub id: DbId,
    pub lid: Option<DbId>,
    pub zid: Option<DbId>,
    pub title: String,
    pub description: String,
    pub scheduled_at: Timestamp,
    pub created_at: Timestamp,
    pub edited_at: Timestamp,
}

impl Work {
    /// Unsaved placeholder work scheduled for now.
    pub fn empty() -> Self {
        let now = chrono::Utc::now();
        Self {
            id: 0,
            lid: None,
            zid: None,
            title: String::new(),
            description: String::new(),
            scheduled_at: now,
            created_at: now,
            edited_at: now,
        }
    }

    /// Calendar day the work is scheduled for (UTC).
    pub fn scheduled_date(&self) -> chrono::NaiveDate {
        self.scheduled_at.date_naive()
    }
}
