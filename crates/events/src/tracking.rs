//! Live classification of the device position against the stored field.
//!
//! [`TrackingService::run`] merges four push sources (location fixes, the
//! lands/zones/notes queries and an optional bearing stream), resolves the
//! tracking state on every change and publishes a [`TrackingUpdate`] on a
//! watch channel until cancelled.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use landbook_core::geofence::{resolve, FieldSnapshot, TrackingState};
use landbook_db::repositories::{LandRepo, NoteRepo, ZoneRepo};
use landbook_db::Store;

use crate::error::EnvError;
use crate::location::{BearingRequest, CompassProvider, Location, LocationProvider, LocationRequest};
use crate::subscription::SubscriptionSlot;

/// Compass reading shown next to the tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "degrees", rename_all = "snake_case")]
pub enum Bearing {
    /// The device has no compass, or it failed.
    Unavailable,
    /// A compass is running but has not reported yet.
    Waiting,
    Degrees(f32),
}

/// One published tracking result.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingUpdate {
    pub state: TrackingState,
    pub bearing: Bearing,
    /// The fix the state was resolved from.
    pub location: Option<Location>,
}

impl TrackingUpdate {
    fn initial() -> Self {
        Self {
            state: resolve(None, Arc::new(FieldSnapshot::default())),
            bearing: Bearing::Waiting,
            location: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TrackingService
// ---------------------------------------------------------------------------

/// Background service resolving location fixes against the store.
pub struct TrackingService {
    store: Store,
    location: Arc<dyn LocationProvider>,
    compass: Option<Arc<dyn CompassProvider>>,
    location_request: LocationRequest,
    bearing_request: BearingRequest,
    updates: watch::Sender<TrackingUpdate>,
}

impl TrackingService {
    pub fn new(store: Store, location: Arc<dyn LocationProvider>) -> Self {
        Self {
            store,
            location,
            compass: None,
            location_request: LocationRequest::default(),
            bearing_request: BearingRequest::default(),
            updates: watch::Sender::new(TrackingUpdate::initial()),
        }
    }

    pub fn with_compass(mut self, compass: Arc<dyn CompassProvider>) -> Self {
        self.compass = Some(compass);
        self
    }

    pub fn with_location_request(mut self, request: LocationRequest) -> Self {
        self.location_request = request;
        self
    }

    pub fn with_bearing_request(mut self, request: BearingRequest) -> Self {
        self.bearing_request = request;
        self
    }

    /// Receive every published update, starting with the latest one.
    pub fn subscribe(&self) -> watch::Receiver<TrackingUpdate> {
        self.updates.subscribe()
    }

    /// Run until `cancel` fires or the store is dropped.
    ///
    /// Location permission and provider errors abort the run before
    /// anything is published. A missing or failing compass only downgrades
    /// the bearing to [`Bearing::Unavailable`].
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), EnvError> {
        let mut locations = SubscriptionSlot::default();
        locations.replace(
            self.location
                .location_updates(self.location_request.clone())?,
        );

        let mut bearings = SubscriptionSlot::default();
        let mut bearing = self.start_compass(&mut bearings);

        let mut lands = LandRepo::watch_all(&self.store);
        let mut zones = ZoneRepo::watch_all(&self.store);
        let mut notes = NoteRepo::watch_all(&self.store);
        let (Some(l), Some(z), Some(n)) = (lands.next().await, zones.next().await, notes.next().await)
        else {
            return Ok(());
        };
        let mut snapshot = Arc::new(FieldSnapshot {
            lands: l,
            zones: z,
            notes: n,
        });
        let mut location: Option<Location> = None;
        self.publish(location, snapshot.clone(), bearing);
        tracing::info!(lands = snapshot.lands.len(), "Tracking started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Tracking cancelled");
                    break;
                }
                fix = locations.recv() => match fix {
                    Some(fix) => location = Some(fix),
                    None => {
                        tracing::info!("Location stream ended");
                        locations.cancel();
                        continue;
                    }
                },
                reading = bearings.recv() => match reading {
                    Some(degrees) => bearing = Bearing::Degrees(degrees),
                    None => {
                        tracing::warn!("Compass stream ended");
                        bearings.cancel();
                        bearing = Bearing::Unavailable;
                    }
                },
                changed = lands.next() => match changed {
                    Some(l) => snapshot = Arc::new(FieldSnapshot { lands: l, ..(*snapshot).clone() }),
                    None => break,
                },
                changed = zones.next() => match changed {
                    Some(z) => snapshot = Arc::new(FieldSnapshot { zones: z, ..(*snapshot).clone() }),
                    None => break,
                },
                changed = notes.next() => match changed {
                    Some(n) => snapshot = Arc::new(FieldSnapshot { notes: n, ..(*snapshot).clone() }),
                    None => break,
                },
            }
            self.publish(location, snapshot.clone(), bearing);
        }

        locations.cancel();
        bearings.cancel();
        Ok(())
    }

    fn start_compass(&self, slot: &mut SubscriptionSlot<f32>) -> Bearing {
        let Some(compass) = &self.compass else {
            return Bearing::Unavailable;
        };
        match compass.bearing_updates(self.bearing_request.clone()) {
            Ok(subscription) => {
                slot.replace(subscription);
                Bearing::Waiting
            }
            Err(e) => {
                tracing::warn!(error = %e, "Compass unavailable, continuing without bearing");
                Bearing::Unavailable
            }
        }
    }

    fn publish(&self, location: Option<Location>, snapshot: Arc<FieldSnapshot>, bearing: Bearing) {
        let state = resolve(location.as_ref().map(|l| &l.point), snapshot);
        let previous = self.updates.borrow().state.clone();
        if previous.label() != state.label() || previous.title() != state.title() {
            tracing::info!(
                state = state.label(),
                title = state.title().unwrap_or_default(),
                "Tracking state changed"
            );
        }
        self.updates.send_replace(TrackingUpdate {
            state,
            bearing,
            location,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use landbook_core::color::DEFAULT_LAND_COLOR;
    use landbook_core::model::{Land, Point};
    use landbook_db::services::save_land;

    use super::*;
    use crate::compass::SensorCompass;
    use crate::replay::ReplayLocationProvider;

    async fn memory_store() -> Store {
        landbook_db::open_memory_store().await.unwrap()
    }

    fn square() -> Land {
        Land::new(
            0,
            "Home",
            DEFAULT_LAND_COLOR,
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 1.0),
                Point::new(1.0, 1.0),
                Point::new(1.0, 0.0),
            ],
            vec![],
        )
    }

    #[tokio::test]
    async fn test_permission_error_aborts_run() {
        let provider = ReplayLocationProvider::live();
        provider.set_permission_granted(false);
        let service = TrackingService::new(memory_store().await, Arc::new(provider));
        assert_eq!(
            service.run(CancellationToken::new()).await,
            Err(EnvError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_missing_sensors_degrade_to_unavailable() {
        let store = memory_store().await;
        save_land(&store, &square()).await.unwrap();
        let provider = ReplayLocationProvider::live();
        let service = Arc::new(
            TrackingService::new(store, Arc::new(provider.clone()))
                .with_compass(Arc::new(SensorCompass::default())),
        );
        let mut updates = service.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let service = service.clone();
            let cancel = cancel.clone();
            async move { service.run(cancel).await }
        });

        provider.wait_for_listeners(1).await;
        provider.push(Location::at(Point::new(0.5, 0.5)));
        let update = tokio::time::timeout(
            Duration::from_secs(1),
            updates.wait_for(|u| u.location.is_some()),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_matches!(update.state, TrackingState::InsideLand { .. });
        assert_eq!(update.bearing, Bearing::Unavailable);

        cancel.cancel();
        assert_eq!(task.await.unwrap(), Ok(()));
        provider.wait_for_listeners(0).await;
    }
}
