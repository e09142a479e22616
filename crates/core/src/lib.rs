//! Domain logic for the landbook field-management toolkit.
//!
//! Everything in this crate is synchronous and free of I/O. Persistence
//! and platform data sources live in `landbook-db` and `landbook-events`.

pub mod border_editor;
pub mod color;
pub mod error;
pub mod geofence;
pub mod geometry;
pub mod kml;
pub mod model;
pub mod types;
pub mod validation;
