//! Spherical geometry over lat/lng points.
//!
//! Containment follows great-circle edges between consecutive vertices,
//! so large polygons behave the same way they are drawn on the map.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use crate::model::Point;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_009.0;

/// Smallest handle radius, used from [`MAX_HANDLE_ZOOM`] upwards.
pub const MIN_HANDLE_RADIUS_M: f64 = 5.0;

/// Zoom level at which handle radius stops shrinking.
pub const MAX_HANDLE_ZOOM: f32 = 19.0;

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Axis-aligned lat/lng bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn center(&self) -> Point {
        Point::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    pub fn contains(&self, point: &Point) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }
}

/// Smallest box containing every point, or `None` for an empty slice.
pub fn bounds_of(points: &[Point]) -> Option<Bounds> {
    let (first, rest) = points.split_first()?;
    let init = Bounds {
        south: first.latitude,
        west: first.longitude,
        north: first.latitude,
        east: first.longitude,
    };
    Some(rest.iter().fold(init, |b, p| Bounds {
        south: b.south.min(p.latitude),
        west: b.west.min(p.longitude),
        north: b.north.max(p.latitude),
        east: b.east.max(p.longitude),
    }))
}

/// Center of [`bounds_of`].
pub fn center_of(points: &[Point]) -> Option<Point> {
    bounds_of(points).map(|b| b.center())
}

// ---------------------------------------------------------------------------
// Distance
// ---------------------------------------------------------------------------

/// Great-circle (haversine) distance in meters.
pub fn distance(a: &Point, b: &Point) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = lat2 - lat1;
    let d_lng = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Index of the vertex closest to `point`, or `None` for an empty ring.
pub fn nearest_index(ring: &[Point], point: &Point) -> Option<usize> {
    ring.iter()
        .enumerate()
        .map(|(i, p)| (i, distance(p, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Radius of a vertex handle in meters for a given map zoom level.
pub fn radius_for_zoom(zoom: f32) -> f64 {
    if zoom >= MAX_HANDLE_ZOOM {
        MIN_HANDLE_RADIUS_M
    } else {
        195.0 - 10.0 * f64::from(zoom)
    }
}

// ---------------------------------------------------------------------------
// Containment
// ---------------------------------------------------------------------------

/// Even-odd containment test with great-circle edges.
///
/// The ring is treated as closed. Rings with fewer than three points
/// contain nothing. A point equal to a vertex counts as inside.
pub fn contains_point(point: &Point, ring: &[Point]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let lat3 = point.latitude.to_radians();
    let lng3 = point.longitude.to_radians();

    let prev = ring[ring.len() - 1];
    let mut lat1 = prev.latitude.to_radians();
    let mut lng1 = prev.longitude.to_radians();
    let mut crossings = 0usize;

    for vertex in ring {
        let d_lng3 = wrap(lng3 - lng1, -PI, PI);
        if lat3 == lat1 && d_lng3 == 0.0 {
            return true;
        }
        let lat2 = vertex.latitude.to_radians();
        let lng2 = vertex.longitude.to_radians();
        if crosses(lat1, lat2, wrap(lng2 - lng1, -PI, PI), lat3, d_lng3) {
            crossings += 1;
        }
        lat1 = lat2;
        lng1 = lng2;
    }

    crossings % 2 == 1
}

/// Whether the ray going south from (`lat3`, `lng3`) crosses the segment
/// (`lat1`, 0) -> (`lat2`, `lng2`). Longitudes are relative to the segment
/// start and already wrapped into `[-PI, PI)`.
fn crosses(lat1: f64, lat2: f64, lng2: f64, lat3: f64, lng3: f64) -> bool {
    // Both segment ends on the same side of the query longitude.
    if (lng3 >= 0.0 && lng3 >= lng2) || (lng3 < 0.0 && lng3 < lng2) {
        return false;
    }
    // Query point on the south pole.
    if lat3 <= -FRAC_PI_2 {
        return false;
    }
    // Segment touches a pole.
    if lat1 <= -FRAC_PI_2 || lat2 <= -FRAC_PI_2 || lat1 >= FRAC_PI_2 || lat2 >= FRAC_PI_2 {
        return false;
    }
    if lng2 <= -PI {
        return false;
    }
    let linear_lat = (lat1 * (lng2 - lng3) + lat2 * lng3) / lng2;
    if lat1 >= 0.0 && lat2 >= 0.0 && lat3 < linear_lat {
        return false;
    }
    if lat1 <= 0.0 && lat2 <= 0.0 && lat3 >= linear_lat {
        return true;
    }
    // Query point on the north pole.
    if lat3 >= FRAC_PI_2 {
        return true;
    }
    lat3.tan() >= tan_lat_great_circle(lat1, lat2, lng2, lng3)
}

/// tan(latitude) of the great circle through (`lat1`, 0) and (`lat2`, `lng2`)
/// at longitude `lng3`.
fn tan_lat_great_circle(lat1: f64, lat2: f64, lng2: f64, lng3: f64) -> f64 {
    (lat1.tan() * (lng2 - lng3).sin() + lat2.tan() * lng3.sin()) / lng2.sin()
}

fn wrap(n: f64, min: f64, max: f64) -> f64 {
    if n >= min && n < max {
        n
    } else {
        (n - min).rem_euclid(max - min) + min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
        ]
    }

    /// L-shaped polygon, concave at (5, 5).
    fn l_shape() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(5.0, 10.0),
            Point::new(5.0, 5.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 0.0),
        ]
    }

    #[test]
    fn test_contains_point_inside_and_outside() {
        let ring = square();
        assert!(contains_point(&Point::new(5.0, 5.0), &ring));
        assert!(contains_point(&Point::new(1.0, 9.0), &ring));
        assert!(!contains_point(&Point::new(11.0, 5.0), &ring));
        assert!(!contains_point(&Point::new(-1.0, 5.0), &ring));
        assert!(!contains_point(&Point::new(5.0, 20.0), &ring));
    }

    #[test]
    fn test_contains_point_concave() {
        let ring = l_shape();
        assert!(contains_point(&Point::new(2.0, 8.0), &ring));
        assert!(contains_point(&Point::new(8.0, 2.0), &ring));
        assert!(!contains_point(&Point::new(8.0, 8.0), &ring));
    }

    #[test]
    fn test_contains_point_vertex_counts_as_inside() {
        assert!(contains_point(&Point::new(10.0, 10.0), &square()));
    }

    #[test]
    fn test_degenerate_rings_contain_nothing() {
        let p = Point::new(0.0, 0.0);
        assert!(!contains_point(&p, &[]));
        assert!(!contains_point(&p, &[p]));
        assert!(!contains_point(&p, &[p, Point::new(1.0, 1.0)]));
    }

    #[test]
    fn test_contains_point_invariant_under_rotation() {
        let ring = l_shape();
        let queries = [
            Point::new(2.0, 8.0),
            Point::new(8.0, 8.0),
            Point::new(8.0, 2.0),
            Point::new(-3.0, 4.0),
            Point::new(4.9, 4.9),
            Point::new(5.1, 5.1),
        ];
        let expected: Vec<bool> = queries.iter().map(|q| contains_point(q, &ring)).collect();
        for shift in 1..ring.len() {
            let mut rotated = ring.clone();
            rotated.rotate_left(shift);
            let got: Vec<bool> = queries.iter().map(|q| contains_point(q, &rotated)).collect();
            assert_eq!(got, expected, "rotation by {shift}");
        }
    }

    #[test]
    fn test_contains_point_across_antimeridian() {
        let ring = vec![
            Point::new(-1.0, 179.0),
            Point::new(-1.0, -179.0),
            Point::new(1.0, -179.0),
            Point::new(1.0, 179.0),
        ];
        assert!(contains_point(&Point::new(0.0, 179.5), &ring));
        assert!(contains_point(&Point::new(0.0, -179.5), &ring));
        assert!(!contains_point(&Point::new(0.0, 178.0), &ring));
    }

    #[test]
    fn test_distance_known_value() {
        // One degree of latitude is ~111.2 km on the mean sphere.
        let d = distance(&Point::new(0.0, 0.0), &Point::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_distance_symmetric_and_monotonic() {
        let a = Point::new(45.0, 7.0);
        let near = Point::new(45.001, 7.0);
        let far = Point::new(45.01, 7.0);
        assert_eq!(distance(&a, &far), distance(&far, &a));
        assert!(distance(&a, &near) < distance(&a, &far));
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_nearest_index() {
        let ring = square();
        assert_eq!(nearest_index(&ring, &Point::new(9.0, 9.5)), Some(2));
        assert_eq!(nearest_index(&ring, &Point::new(0.1, 0.2)), Some(0));
        assert_eq!(nearest_index(&[], &Point::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_bounds_and_center() {
        assert!(bounds_of(&[]).is_none());
        assert!(center_of(&[]).is_none());
        let b = bounds_of(&l_shape()).unwrap();
        assert_eq!(
            b,
            Bounds {
                south: 0.0,
                west: 0.0,
                north: 10.0,
                east: 10.0
            }
        );
        assert_eq!(center_of(&l_shape()), Some(Point::new(5.0, 5.0)));
        let single = [Point::new(3.0, 4.0)];
        assert_eq!(center_of(&single), Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_radius_for_zoom() {
        assert_eq!(radius_for_zoom(19.0), 5.0);
        assert_eq!(radius_for_zoom(21.0), 5.0);
        assert_eq!(radius_for_zoom(10.0), 95.0);
        assert_eq!(radius_for_zoom(18.0), 15.0);
        assert!(radius_for_zoom(12.0) > radius_for_zoom(13.0));
    }
}
