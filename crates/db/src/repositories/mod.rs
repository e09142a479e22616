//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&Store` as the first argument. Writes bump the store's
//! change tick after they commit. `watch_*` methods return a
//! [`Query`](crate::Query) that re-emits whenever its result changes.

pub mod land_repo;
pub mod note_repo;
pub mod work_repo;
pub mod zone_repo;

pub use land_repo::LandRepo;
pub use note_repo::NoteRepo;
pub use work_repo::WorkRepo;
pub use zone_repo::ZoneRepo;
