//! Walk a replayed device through a land with a zone, a note and a hole,
//! with a working compass, and check every published state.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use landbook_core::color::DEFAULT_LAND_COLOR;
use landbook_core::geofence::TrackingState;
use landbook_core::model::{Land, Note, Point, Zone};
use landbook_db::repositories::LandRepo;
use landbook_db::services::{save_land, save_note, save_zone};
use landbook_db::Store;
use landbook_events::{
    Bearing, BearingRequest, Location, ReplayLocationProvider, SensorCompass, SensorFeed,
    TrackingService, TrackingUpdate,
};

fn rect(south: f64, west: f64, north: f64, east: f64) -> Vec<Point> {
    vec![
        Point::new(south, west),
        Point::new(south, east),
        Point::new(north, east),
        Point::new(north, west),
    ]
}

async fn seed(store: &Store) -> i64 {
    let land = Land::new(
        0,
        "Farm",
        DEFAULT_LAND_COLOR,
        rect(45.0, 7.0, 45.01, 7.01),
        vec![rect(45.008, 7.008, 45.009, 7.009)],
    );
    let lid = save_land(store, &land).await.unwrap();
    let zone = Zone::new(0, lid, "Orchard", DEFAULT_LAND_COLOR, rect(45.0, 7.0, 45.005, 7.005), vec![]);
    save_zone(store, &zone).await.unwrap();
    let mut note = Note::empty(lid, Point::new(45.002, 7.002));
    note.title = "Broken sprinkler".to_string();
    note.radius = 20.0;
    save_note(store, &note).await.unwrap();
    lid
}

async fn move_to(
    provider: &ReplayLocationProvider,
    updates: &mut watch::Receiver<TrackingUpdate>,
    point: Point,
) -> TrackingUpdate {
    let fix = Location::at(point);
    provider.push(fix);
    tokio::time::timeout(
        Duration::from_secs(1),
        updates.wait_for(|u| u.location == Some(fix)),
    )
    .await
    .expect("tracking update in time")
    .expect("service running")
    .clone()
}

#[tokio::test]
async fn test_walk_through_the_farm() {
    let store = landbook_db::open_memory_store().await.unwrap();
    let lid = seed(&store).await;

    let provider = ReplayLocationProvider::live();
    let accelerometer = SensorFeed::default();
    let magnetometer = SensorFeed::default();
    let compass = SensorCompass::new(Some(accelerometer.clone()), Some(magnetometer.clone()));
    let service = Arc::new(
        TrackingService::new(store.clone(), Arc::new(provider.clone()))
            .with_compass(Arc::new(compass))
            .with_bearing_request(BearingRequest {
                fastest_interval: Duration::ZERO,
                ..BearingRequest::default()
            }),
    );
    let mut updates = service.subscribe();
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let service = service.clone();
        let cancel = cancel.clone();
        async move { service.run(cancel).await }
    });
    provider.wait_for_listeners(1).await;

    let update = move_to(&provider, &mut updates, Point::new(44.9, 7.0)).await;
    assert_matches!(update.state, TrackingState::NotInsideLocation { .. });
    assert_eq!(update.state.snapshot().lands.len(), 1);

    let update = move_to(&provider, &mut updates, Point::new(45.007, 7.007)).await;
    assert_matches!(update.state, TrackingState::InsideLand { land, .. } if land.id == lid);

    let update = move_to(&provider, &mut updates, Point::new(45.004, 7.004)).await;
    assert_matches!(update.state, TrackingState::InsideZone { zone, .. } if zone.title == "Orchard");

    let update = move_to(&provider, &mut updates, Point::new(45.002, 7.0021)).await;
    assert_matches!(update.state, TrackingState::InsideNote { note, .. } if note.title == "Broken sprinkler");

    let update = move_to(&provider, &mut updates, Point::new(45.0085, 7.0085)).await;
    assert_matches!(update.state, TrackingState::NotInsideLocation { .. });

    // Compass readings arrive independently of location fixes.
    accelerometer.publish([0.0, 0.0, 9.81]);
    magnetometer.publish([-20.0, 0.0, -40.0]);
    let update = tokio::time::timeout(
        Duration::from_secs(1),
        updates.wait_for(|u| matches!(u.bearing, Bearing::Degrees(_))),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_matches!(update.bearing, Bearing::Degrees(d) if (d - 90.0).abs() < 0.01);

    // Deleting the land is picked up without a new fix.
    let here = Point::new(45.007, 7.007);
    move_to(&provider, &mut updates, here).await;
    LandRepo::delete(&store, lid).await.unwrap();
    let update = tokio::time::timeout(
        Duration::from_secs(1),
        updates.wait_for(|u| {
            let snapshot = u.state.snapshot();
            snapshot.lands.is_empty() && snapshot.zones.is_empty() && snapshot.notes.is_empty()
        }),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_matches!(update.state, TrackingState::NotInsideLocation { .. });

    cancel.cancel();
    assert_eq!(task.await.unwrap(), Ok(()));
    provider.wait_for_listeners(0).await;
}
