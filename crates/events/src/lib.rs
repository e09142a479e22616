//! Location and compass sources and the live tracking service.
//!
//! - [`LocationProvider`] / [`CompassProvider`]: push-based sources that
//!   hand out cancelable [`Subscription`]s.
//! - [`SubscriptionSlot`]: holds at most one subscription per stream.
//! - [`ReplayLocationProvider`]: a provider fed from a fixed track or from
//!   [`ReplayLocationProvider::push`].
//! - [`SensorCompass`]: bearing from accelerometer and magnetometer feeds.
//! - [`TrackingService`]: resolves every location fix against the stored
//!   lands, zones and notes.

pub mod compass;
pub mod error;
pub mod location;
pub mod replay;
pub mod subscription;
pub mod tracking;

pub use compass::{azimuth_from_sensors, BearingFilter, SensorCompass, SensorFeed};
pub use error::EnvError;
pub use location::{
    BearingRequest, CompassProvider, Location, LocationProvider, LocationRequest, Priority,
};
pub use replay::ReplayLocationProvider;
pub use subscription::{subscription, Publisher, Subscription, SubscriptionSlot};
pub use tracking::{Bearing, TrackingService, TrackingUpdate};
