//! Device bearing from accelerometer and magnetometer readings.

use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::EnvError;
use crate::location::{BearingRequest, CompassProvider};
use crate::subscription::{subscription, Publisher, Subscription, DEFAULT_CAPACITY};

/// Standard gravity in m/s².
const STANDARD_GRAVITY: f32 = 9.806_65;

/// Accelerations below 10% of gravity mean the device is in free fall and
/// has no usable "down".
const FREE_FALL_GRAVITY_SQUARED: f32 = 0.01 * STANDARD_GRAVITY * STANDARD_GRAVITY;

/// Below this the magnetic field is (anti)parallel to gravity, or too weak.
const MIN_HORIZONTAL_FIELD: f32 = 0.1;

/// Default buffer of a sensor feed.
const SENSOR_CAPACITY: usize = 64;

/// One three-axis sensor reading in device coordinates.
pub type SensorReading = [f32; 3];

/// Compass azimuth in degrees `[0, 360)` from a gravity vector and a
/// geomagnetic field vector, both in device coordinates.
///
/// Returns `None` when the device is in free fall or the field is
/// degenerate.
pub fn azimuth_from_sensors(gravity: SensorReading, geomagnetic: SensorReading) -> Option<f32> {
    let [ax, ay, az] = gravity;
    let [ex, ey, ez] = geomagnetic;

    let norm_sq_a = ax * ax + ay * ay + az * az;
    if norm_sq_a < FREE_FALL_GRAVITY_SQUARED {
        return None;
    }

    // East = field x down.
    let hx = ey * az - ez * ay;
    let hy = ez * ax - ex * az;
    let hz = ex * ay - ey * ax;
    let norm_h = (hx * hx + hy * hy + hz * hz).sqrt();
    if norm_h < MIN_HORIZONTAL_FIELD {
        return None;
    }
    let (hx, hy, hz) = (hx / norm_h, hy / norm_h, hz / norm_h);

    let inv_a = norm_sq_a.sqrt().recip();
    let (ax, ay, az) = (ax * inv_a, ay * inv_a, az * inv_a);

    // North = down x east; only the y component is needed.
    let my = az * hx - ax * hz;

    let degrees = hy.atan2(my).to_degrees();
    Some(normalize_degrees(degrees))
}

fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Smallest angle between two bearings, in `[0, 180]`.
pub fn angular_difference(a: f32, b: f32) -> f32 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Passes a bearing only when it moved at least `min_degree_change` from
/// the last one passed.
#[derive(Debug, Clone)]
pub struct BearingFilter {
    min_degree_change: f32,
    last: Option<f32>,
}

impl BearingFilter {
    pub fn new(min_degree_change: f32) -> Self {
        Self {
            min_degree_change: min_degree_change.max(0.0),
            last: None,
        }
    }

    pub fn accept(&mut self, bearing: f32) -> Option<f32> {
        let moved = self
            .last
            .map_or(true, |last| angular_difference(last, bearing) >= self.min_degree_change);
        if moved {
            self.last = Some(bearing);
            Some(bearing)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// SensorFeed
// ---------------------------------------------------------------------------

/// Fan-out of raw readings from one hardware sensor.
#[derive(Debug, Clone)]
pub struct SensorFeed {
    sender: broadcast::Sender<SensorReading>,
}

impl SensorFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a reading to every listener. Dropped when nobody listens.
    pub fn publish(&self, reading: SensorReading) {
        let _ = self.sender.send(reading);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SensorReading> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for SensorFeed {
    fn default() -> Self {
        Self::new(SENSOR_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// SensorCompass
// ---------------------------------------------------------------------------

/// [`CompassProvider`] over an accelerometer and a magnetometer. A device
/// missing either sensor has no compass.
#[derive(Debug, Clone, Default)]
pub struct SensorCompass {
    accelerometer: Option<SensorFeed>,
    magnetometer: Option<SensorFeed>,
}

impl SensorCompass {
    pub fn new(accelerometer: Option<SensorFeed>, magnetometer: Option<SensorFeed>) -> Self {
        Self {
            accelerometer,
            magnetometer,
        }
    }

    pub fn is_available(&self) -> bool {
        self.accelerometer.is_some() && self.magnetometer.is_some()
    }
}

impl CompassProvider for SensorCompass {
    fn bearing_updates(&self, request: BearingRequest) -> Result<Subscription<f32>, EnvError> {
        let accelerometer = self
            .accelerometer
            .as_ref()
            .ok_or(EnvError::SensorUnavailable("accelerometer"))?
            .subscribe();
        let magnetometer = self
            .magnetometer
            .as_ref()
            .ok_or(EnvError::SensorUnavailable("magnetometer"))?
            .subscribe();

        let (publisher, subscription) = subscription(DEFAULT_CAPACITY);
        tokio::spawn(async move {
            run_compass(publisher, accelerometer, magnetometer, request).await;
            tracing::debug!("Compass listeners unregistered");
        });
        Ok(subscription)
    }
}

async fn run_compass(
    publisher: Publisher<f32>,
    mut accelerometer: broadcast::Receiver<SensorReading>,
    mut magnetometer: broadcast::Receiver<SensorReading>,
    request: BearingRequest,
) {
    let mut gravity = None;
    let mut geomagnetic = None;
    let mut filter = BearingFilter::new(request.min_degree_change);
    let mut last_sent: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = publisher.closed() => return,
            reading = accelerometer.recv() => match reading {
                Ok(reading) => gravity = Some(reading),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            },
            reading = magnetometer.recv() => match reading {
                Ok(reading) => geomagnetic = Some(reading),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            },
        }

        let (Some(g), Some(m)) = (gravity, geomagnetic) else {
            continue;
        };
        let Some(azimuth) = azimuth_from_sensors(g, m) else {
            continue;
        };
        if last_sent.is_some_and(|at| at.elapsed() < request.fastest_interval) {
            continue;
        }
        let Some(bearing) = filter.accept(azimuth) else {
            continue;
        };
        last_sent = Some(Instant::now());
        if !publisher.send(bearing).await {
            return;
        }
    }
}
