/// All record ids. `0` marks a record that has not been persisted yet.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
