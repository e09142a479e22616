//! A [`LocationProvider`] that replays recorded fixes.
//!
//! Two feeds are supported: a fixed track replayed from the start for each
//! subscriber, and live fixes handed in with
//! [`ReplayLocationProvider::push`]. Permission and provider state can be
//! switched at runtime, and the number of registered listeners is
//! observable so tests can check that cancelled subscriptions unregister.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use landbook_core::geometry::distance;

use crate::error::EnvError;
use crate::location::{Location, LocationProvider, LocationRequest, Priority};
use crate::subscription::{subscription, Publisher, Subscription, DEFAULT_CAPACITY};

/// Buffer of the live feed.
const LIVE_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct ReplayLocationProvider {
    inner: Arc<Inner>,
}

struct Inner {
    track: Vec<Location>,
    live: broadcast::Sender<Location>,
    last: watch::Sender<Option<Location>>,
    listeners: watch::Sender<usize>,
    permission_granted: AtomicBool,
    provider_enabled: AtomicBool,
}

impl std::fmt::Debug for ReplayLocationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayLocationProvider")
            .field("track", &self.inner.track.len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ReplayLocationProvider {
    /// Provider that replays `track` to every subscriber, one fix per
    /// request interval.
    pub fn from_track(track: Vec<Location>) -> Self {
        let (live, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                track,
                live,
                last: watch::Sender::new(None),
                listeners: watch::Sender::new(0),
                permission_granted: AtomicBool::new(true),
                provider_enabled: AtomicBool::new(true),
            }),
        }
    }

    /// Provider fed only through [`push`](Self::push).
    pub fn live() -> Self {
        Self::from_track(Vec::new())
    }

    /// Deliver a fix to every live subscriber.
    pub fn push(&self, location: Location) {
        self.inner.last.send_replace(Some(location));
        // No receivers just means nobody is listening yet.
        let _ = self.inner.live.send(location);
    }

    pub fn set_permission_granted(&self, granted: bool) {
        self.inner.permission_granted.store(granted, Ordering::SeqCst);
    }

    pub fn set_provider_enabled(&self, enabled: bool) {
        self.inner.provider_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Number of subscriptions whose listener is still registered.
    pub fn listener_count(&self) -> usize {
        *self.inner.listeners.borrow()
    }

    /// Wait until exactly `count` listeners are registered.
    pub async fn wait_for_listeners(&self, count: usize) {
        let mut rx = self.inner.listeners.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|current| *current == count).await;
    }

    fn check_available(&self) -> Result<(), EnvError> {
        if !self.inner.permission_granted.load(Ordering::SeqCst) {
            return Err(EnvError::PermissionDenied);
        }
        if !self.inner.provider_enabled.load(Ordering::SeqCst) {
            return Err(EnvError::ProviderDisabled);
        }
        Ok(())
    }
}

#[async_trait]
impl LocationProvider for ReplayLocationProvider {
    fn location_updates(&self, request: LocationRequest) -> Result<Subscription<Location>, EnvError> {
        self.check_available()?;
        let (publisher, subscription) = subscription(DEFAULT_CAPACITY);
        let listener = Listener::register(self.inner.clone());
        let live = self.inner.live.subscribe();
        let track = self.inner.track.clone();
        tracing::debug!(
            priority = ?request.priority,
            track = track.len(),
            "Location listener registered"
        );

        tokio::spawn(async move {
            let mut filter = DisplacementFilter::new(request.min_displacement_m);
            if !track.is_empty() {
                replay_track(&listener, &publisher, &track, &request, &mut filter).await;
            } else {
                forward_live(&listener, &publisher, live, &request, &mut filter).await;
            }
            drop(listener);
            tracing::debug!("Location listener unregistered");
        });

        Ok(subscription)
    }

    async fn current_location(&self, _priority: Priority) -> Result<Location, EnvError> {
        self.check_available()?;
        if let Some(first) = self.inner.track.first() {
            self.inner.last.send_replace(Some(*first));
            return Ok(*first);
        }
        let mut live = self.inner.live.subscribe();
        loop {
            match live.recv().await {
                Ok(location) => return Ok(location),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Err(EnvError::Closed),
            }
        }
    }

    async fn last_known_location(&self) -> Result<Option<Location>, EnvError> {
        self.check_available()?;
        Ok(*self.inner.last.borrow())
    }
}

/// Registration of one subscription; unregisters on drop.
struct Listener {
    inner: Arc<Inner>,
}

impl Listener {
    fn register(inner: Arc<Inner>) -> Self {
        inner.listeners.send_modify(|count| *count += 1);
        Self { inner }
    }

    fn record(&self, location: Location) {
        self.inner.last.send_replace(Some(location));
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.inner
            .listeners
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

/// Drops fixes closer than `min_m` to the last delivered one.
struct DisplacementFilter {
    min_m: f64,
    last: Option<Location>,
}

impl DisplacementFilter {
    fn new(min_m: f64) -> Self {
        Self { min_m, last: None }
    }

    fn accept(&mut self, location: &Location) -> bool {
        let keep = self
            .last
            .map_or(true, |last| distance(&last.point, &location.point) >= self.min_m);
        if keep {
            self.last = Some(*location);
        }
        keep
    }
}

async fn replay_track(
    listener: &Listener,
    publisher: &Publisher<Location>,
    track: &[Location],
    request: &LocationRequest,
    filter: &mut DisplacementFilter,
) {
    let pause = request.interval.max(request.fastest_interval);
    for (index, location) in track.iter().enumerate() {
        if index > 0 && !pause.is_zero() && !sleep_or_closed(publisher, pause).await {
            return;
        }
        if !filter.accept(location) {
            continue;
        }
        listener.record(*location);
        if !publisher.send(*location).await {
            return;
        }
    }
}

/// Forward pushed fixes, holding each one back until `fastest_interval`
/// has passed since the previous delivery.
async fn forward_live(
    listener: &Listener,
    publisher: &Publisher<Location>,
    mut live: broadcast::Receiver<Location>,
    request: &LocationRequest,
    filter: &mut DisplacementFilter,
) {
    let mut last_sent: Option<Instant> = None;
    loop {
        let location = tokio::select! {
            _ = publisher.closed() => return,
            received = live.recv() => match received {
                Ok(location) => location,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Location listener lagging, fixes dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
        };
        if !filter.accept(&location) {
            continue;
        }
        if let Some(at) = last_sent {
            let wait = request.fastest_interval.saturating_sub(at.elapsed());
            if !wait.is_zero() && !sleep_or_closed(publisher, wait).await {
                return;
            }
        }
        last_sent = Some(Instant::now());
        listener.record(location);
        if !publisher.send(location).await {
            return;
        }
    }
}

/// Sleep for `pause`; `false` if the subscriber went away meanwhile.
async fn sleep_or_closed(publisher: &Publisher<Location>, pause: Duration) -> bool {
    tokio::select! {
        _ = publisher.closed() => false,
        _ = tokio::time::sleep(pause) => true,
    }
}
