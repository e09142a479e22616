//! Classify a location against the stored lands, zones and notes.
//!
//! Priority inside a land is note > zone > land. Only the first land (in
//! input order) whose outer border contains the location is considered;
//! if the location falls into one of its holes the result is
//! [`TrackingState::NotInsideLocation`] and no other land is tried.

use std::sync::Arc;

use serde::Serialize;

use crate::geometry::contains_point;
use crate::model::{Land, Note, Point, Zone};

/// Everything the resolver looks at, shared with whoever renders the result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FieldSnapshot {
    pub lands: Vec<Land>,
    pub zones: Vec<Zone>,
    pub notes: Vec<Note>,
}

/// Outcome of one resolution. Every variant carries the snapshot it was
/// computed from.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingState {
    WaitingForLocation {
        snapshot: Arc<FieldSnapshot>,
    },
    NotInsideLocation {
        snapshot: Arc<FieldSnapshot>,
    },
    InsideLand {
        land: Land,
        snapshot: Arc<FieldSnapshot>,
    },
    InsideZone {
        zone: Zone,
        snapshot: Arc<FieldSnapshot>,
    },
    InsideNote {
        note: Note,
        snapshot: Arc<FieldSnapshot>,
    },
}

impl TrackingState {
    pub fn snapshot(&self) -> &Arc<FieldSnapshot> {
        match self {
            Self::WaitingForLocation { snapshot }
            | Self::NotInsideLocation { snapshot }
            | Self::InsideLand { snapshot, .. }
            | Self::InsideZone { snapshot, .. }
            | Self::InsideNote { snapshot, .. } => snapshot,
        }
    }

    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::WaitingForLocation { .. } => "waiting_for_location",
            Self::NotInsideLocation { .. } => "not_inside",
            Self::InsideLand { .. } => "inside_land",
            Self::InsideZone { .. } => "inside_zone",
            Self::InsideNote { .. } => "inside_note",
        }
    }

    /// Title of the matched land, zone or note.
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::InsideLand { land, .. } => Some(&land.title),
            Self::InsideZone { zone, .. } => Some(&zone.title),
            Self::InsideNote { note, .. } => Some(&note.title),
            _ => None,
        }
    }
}

/// Resolve the tracking state for `location`.
pub fn resolve(location: Option<&Point>, snapshot: Arc<FieldSnapshot>) -> TrackingState {
    let Some(point) = location else {
        return TrackingState::WaitingForLocation { snapshot };
    };

    let Some(land) = snapshot
        .lands
        .iter()
        .find(|land| contains_point(point, &land.border))
    else {
        return TrackingState::NotInsideLocation { snapshot };
    };

    // A hole of the first candidate excludes the fix from every land.
    if !land.contains(point) {
        return TrackingState::NotInsideLocation { snapshot };
    }

    if let Some(note) = nearest_note(&snapshot.notes, land, point) {
        let note = note.clone();
        return TrackingState::InsideNote { note, snapshot };
    }

    if let Some(zone) = snapshot
        .zones
        .iter()
        .find(|zone| zone.lid == land.id && contains_point(point, &zone.border))
    {
        let zone = zone.clone();
        return TrackingState::InsideZone { zone, snapshot };
    }

    let land = land.clone();
    TrackingState::InsideLand { land, snapshot }
}

/// Note of `land` covering `point`, closest center first.
fn nearest_note<'a>(notes: &'a [Note], land: &Land, point: &Point) -> Option<&'a Note> {
    notes
        .iter()
        .filter(|note| note.lid == land.id)
        .map(|note| (note, note.distance_to(point)))
        .filter(|(note, distance)| *distance <= note.radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(note, _)| note)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::color::DEFAULT_LAND_COLOR;

    fn rect(south: f64, west: f64, north: f64, east: f64) -> Vec<Point> {
        vec![
            Point::new(south, west),
            Point::new(south, east),
            Point::new(north, east),
            Point::new(north, west),
        ]
    }

    fn land(id: i64, border: Vec<Point>, holes: Vec<Vec<Point>>) -> Land {
        Land::new(id, format!("land-{id}"), DEFAULT_LAND_COLOR, border, holes)
    }

    fn zone(id: i64, lid: i64, border: Vec<Point>) -> Zone {
        Zone::new(id, lid, format!("zone-{id}"), DEFAULT_LAND_COLOR, border, vec![])
    }

    fn note(id: i64, lid: i64, center: Point, radius: f64) -> Note {
        let mut note = Note::empty(lid, center);
        note.id = id;
        note.title = format!("note-{id}");
        note.radius = radius;
        note
    }

    fn snapshot(lands: Vec<Land>, zones: Vec<Zone>, notes: Vec<Note>) -> Arc<FieldSnapshot> {
        Arc::new(FieldSnapshot {
            lands,
            zones,
            notes,
        })
    }

    #[test]
    fn test_waiting_without_location() {
        let snap = snapshot(vec![], vec![], vec![]);
        assert_matches!(
            resolve(None, snap.clone()),
            TrackingState::WaitingForLocation { snapshot } if Arc::ptr_eq(&snapshot, &snap)
        );
    }

    #[test]
    fn test_outside_every_land() {
        let snap = snapshot(vec![land(1, rect(0.0, 0.0, 1.0, 1.0), vec![])], vec![], vec![]);
        let state = resolve(Some(&Point::new(5.0, 5.0)), snap);
        assert_matches!(state, TrackingState::NotInsideLocation { .. });
        assert_eq!(state.snapshot().lands.len(), 1);
    }

    #[test]
    fn test_inside_land() {
        let snap = snapshot(vec![land(1, rect(0.0, 0.0, 1.0, 1.0), vec![])], vec![], vec![]);
        assert_matches!(
            resolve(Some(&Point::new(0.5, 0.5)), snap),
            TrackingState::InsideLand { land, .. } if land.id == 1
        );
    }

    #[test]
    fn test_hole_means_not_inside_and_stops_search() {
        let hole = rect(0.4, 0.4, 0.6, 0.6);
        let snap = snapshot(
            vec![
                land(1, rect(0.0, 0.0, 1.0, 1.0), vec![hole]),
                // Fills the hole, but is never consulted.
                land(2, rect(0.45, 0.45, 0.55, 0.55), vec![]),
            ],
            vec![],
            vec![],
        );
        assert_matches!(
            resolve(Some(&Point::new(0.5, 0.5)), snap),
            TrackingState::NotInsideLocation { .. }
        );
    }

    #[test]
    fn test_first_land_in_list_order_wins() {
        let snap = snapshot(
            vec![
                land(1, rect(0.0, 0.0, 1.0, 1.0), vec![]),
                land(2, rect(0.4, 0.4, 0.6, 0.6), vec![]),
            ],
            vec![],
            vec![],
        );
        assert_matches!(
            resolve(Some(&Point::new(0.5, 0.5)), snap),
            TrackingState::InsideLand { land, .. } if land.id == 1
        );
    }

    #[test]
    fn test_note_beats_zone() {
        let center = Point::new(0.5, 0.5);
        let snap = snapshot(
            vec![land(1, rect(0.0, 0.0, 1.0, 1.0), vec![])],
            vec![zone(10, 1, rect(0.4, 0.4, 0.6, 0.6))],
            vec![note(20, 1, center, 50.0)],
        );
        assert_matches!(
            resolve(Some(&center), snap),
            TrackingState::InsideNote { note, .. } if note.id == 20
        );
    }

    #[test]
    fn test_nearest_note_wins() {
        let here = Point::new(0.5, 0.5);
        let snap = snapshot(
            vec![land(1, rect(0.0, 0.0, 1.0, 1.0), vec![])],
            vec![],
            vec![
                note(1, 1, Point::new(0.5003, 0.5), 500.0),
                note(2, 1, Point::new(0.5001, 0.5), 500.0),
                note(3, 1, Point::new(0.5002, 0.5), 500.0),
            ],
        );
        assert_matches!(
            resolve(Some(&here), snap),
            TrackingState::InsideNote { note, .. } if note.id == 2
        );
    }

    #[test]
    fn test_zone_when_no_note_covers() {
        let here = Point::new(0.5, 0.5);
        let snap = snapshot(
            vec![land(1, rect(0.0, 0.0, 1.0, 1.0), vec![])],
            vec![
                zone(10, 1, rect(0.9, 0.9, 0.95, 0.95)),
                zone(11, 1, rect(0.4, 0.4, 0.6, 0.6)),
                zone(12, 1, rect(0.3, 0.3, 0.7, 0.7)),
            ],
            vec![note(20, 1, Point::new(0.9, 0.9), 5.0)],
        );
        let state = resolve(Some(&here), snap);
        assert_matches!(&state, TrackingState::InsideZone { zone, .. } if zone.id == 11);
        assert_eq!(state.label(), "inside_zone");
        assert_eq!(state.title(), Some("zone-11"));
    }

    #[test]
    fn test_zones_and_notes_of_other_lands_ignored() {
        let here = Point::new(0.5, 0.5);
        let snap = snapshot(
            vec![land(1, rect(0.0, 0.0, 1.0, 1.0), vec![])],
            vec![zone(10, 2, rect(0.4, 0.4, 0.6, 0.6))],
            vec![note(20, 2, here, 100.0)],
        );
        assert_matches!(
            resolve(Some(&here), snap),
            TrackingState::InsideLand { .. }
        );
    }
}
