//! Save, import and export operations layered over the repositories.
//!
//! Validation lives here rather than in the repositories: the editor may
//! hold any intermediate shape, but nothing reaches the store without a
//! border of at least three points and a non-blank title.

use landbook_core::error::CoreError;
use landbook_core::kml::{self, KmlError};
use landbook_core::model::{non_empty_holes, Land, Note, Zone};
use landbook_core::types::DbId;
use landbook_core::validation::{validate_land, validate_note, validate_zone};

use crate::repositories::land_repo;
use crate::repositories::{LandRepo, NoteRepo, ZoneRepo};
use crate::Store;

/// Why a record could not be saved.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SaveError {
    /// Report a foreign key violation as the missing parent it means.
    fn missing_parent(err: sqlx::Error, entity: &'static str, id: DbId) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Self::Invalid(CoreError::NotFound { entity, id })
            }
            other => Self::Database(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("cannot read file: {0}")]
    Kml(#[from] KmlError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of a KML import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    /// Ids of the stored lands, in document order.
    pub imported: Vec<DbId>,
    /// Polygon placemarks that could not become a land.
    pub skipped: usize,
}

/// Validate and persist a land, returning its id.
pub async fn save_land(store: &Store, land: &Land) -> Result<DbId, SaveError> {
    validate_land(land)?;
    let id = LandRepo::insert(store, land).await?;
    tracing::info!(land_id = id, title = %land.title, points = land.border.len(), "Land saved");
    Ok(id)
}

/// Validate and persist a zone, returning its id.
pub async fn save_zone(store: &Store, zone: &Zone) -> Result<DbId, SaveError> {
    validate_zone(zone)?;
    let id = ZoneRepo::insert(store, zone)
        .await
        .map_err(|e| SaveError::missing_parent(e, "land", zone.lid))?;
    tracing::info!(zone_id = id, land_id = zone.lid, title = %zone.title, "Zone saved");
    Ok(id)
}

/// Validate and persist a note, returning its id.
pub async fn save_note(store: &Store, note: &Note) -> Result<DbId, SaveError> {
    validate_note(note)?;
    let id = NoteRepo::insert(store, note)
        .await
        .map_err(|e| SaveError::missing_parent(e, "land", note.lid))?;
    tracing::info!(note_id = id, land_id = note.lid, radius = note.radius, "Note saved");
    Ok(id)
}

/// Decode `text` and store every usable land as a new record.
///
/// Imported lands always get fresh ids. A blank name becomes
/// `Imported land N`; borders shorter than three points are counted as
/// skipped. All lands are written in one transaction.
pub async fn import_kml(store: &Store, text: &str) -> Result<ImportSummary, ImportError> {
    let report = kml::decode_report(text)?;
    let mut skipped = report.skipped;
    let mut accepted = Vec::with_capacity(report.lands.len());

    for (index, mut land) in report.lands.into_iter().enumerate() {
        if land.title.trim().is_empty() {
            land.title = format!("Imported land {}", index + 1);
        }
        land.id = 0;
        land.holes = non_empty_holes(land.holes);
        match validate_land(&land) {
            Ok(()) => accepted.push(land),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping imported land");
                skipped += 1;
            }
        }
    }

    let mut tx = store.pool().begin().await?;
    let mut imported = Vec::with_capacity(accepted.len());
    for land in &accepted {
        imported.push(land_repo::upsert(&mut *tx, land).await?);
    }
    tx.commit().await?;
    if !imported.is_empty() {
        store.notify();
    }

    tracing::info!(imported = imported.len(), skipped, "KML import finished");
    Ok(ImportSummary { imported, skipped })
}

/// Encode every stored land. `None` when no land has a border.
pub async fn export_kml(store: &Store) -> Result<Option<String>, sqlx::Error> {
    let lands = LandRepo::list(store).await?;
    let text = kml::encode(&lands);
    match &text {
        Some(text) => tracing::info!(lands = lands.len(), bytes = text.len(), "KML export ready"),
        None => tracing::info!("Nothing to export"),
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use sqlx::SqlitePool;

    use landbook_core::color::{Argb, DEFAULT_LAND_COLOR};
    use landbook_core::model::Point;

    use super::*;

    const TWO_FIELDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Style id="s"><PolyStyle><color>7f00ff00</color></PolyStyle></Style>
    <Placemark>
      <name>North</name>
      <styleUrl>#s</styleUrl>
      <Polygon><outerBoundaryIs><LinearRing><coordinates>
        0,0,0 1,0,0 1,1,0 0,0,0
      </coordinates></LinearRing></outerBoundaryIs></Polygon>
    </Placemark>
    <Placemark>
      <Polygon><outerBoundaryIs><LinearRing><coordinates>
        2,2 3,2 3,3
      </coordinates></LinearRing></outerBoundaryIs></Polygon>
    </Placemark>
    <Placemark>
      <name>Sliver</name>
      <Polygon><outerBoundaryIs><LinearRing><coordinates>
        5,5 6,6
      </coordinates></LinearRing></outerBoundaryIs></Polygon>
    </Placemark>
  </Document>
</kml>"#;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
        ]
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_save_land_validates(pool: SqlitePool) {
        let store = Store::new(pool);
        let land = Land::new(0, "  ", DEFAULT_LAND_COLOR, square(), vec![]);
        assert_matches!(
            save_land(&store, &land).await,
            Err(SaveError::Invalid(CoreError::BlankTitle))
        );

        let land = Land::new(0, "Field", DEFAULT_LAND_COLOR, square()[..2].to_vec(), vec![]);
        assert_matches!(
            save_land(&store, &land).await,
            Err(SaveError::Invalid(CoreError::InvalidBorder { points: 2 }))
        );
        assert!(LandRepo::list(&store).await.unwrap().is_empty());

        let land = Land::new(0, "Field", DEFAULT_LAND_COLOR, square(), vec![]);
        assert_eq!(save_land(&store, &land).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_save_zone_needs_land(pool: SqlitePool) {
        let store = Store::new(pool);
        let zone = Zone::new(0, 9, "Orchard", DEFAULT_LAND_COLOR, square(), vec![]);
        assert_matches!(
            save_zone(&store, &zone).await,
            Err(SaveError::Invalid(CoreError::NotFound { entity: "land", id: 9 }))
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_save_note_needs_land(pool: SqlitePool) {
        let store = Store::new(pool);
        let mut note = Note::empty(5, Point::new(0.5, 0.5));
        note.title = "Gate".to_string();
        assert_matches!(
            save_note(&store, &note).await,
            Err(SaveError::Invalid(CoreError::NotFound { entity: "land", id: 5 }))
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_import_names_and_skips(pool: SqlitePool) {
        let store = Store::new(pool);
        let summary = import_kml(&store, TWO_FIELDS).await.unwrap();
        assert_eq!(summary.imported, vec![1, 2]);
        assert_eq!(summary.skipped, 1);

        let lands = LandRepo::list(&store).await.unwrap();
        assert_eq!(lands[0].title, "North");
        assert_eq!(lands[0].color, Argb(0x7f00_ff00));
        assert_eq!(lands[0].border.len(), 3);
        assert_eq!(lands[1].title, "Imported land 2");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_import_rejects_garbage(pool: SqlitePool) {
        let store = Store::new(pool);
        let result = import_kml(&store, "<kml><Document>").await;
        assert_matches!(result, Err(ImportError::Kml(_)));
        assert!(result.unwrap_err().to_string().starts_with("cannot read file"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_export_round_trip(pool: SqlitePool) {
        let store = Store::new(pool);
        assert_eq!(export_kml(&store).await.unwrap(), None);

        import_kml(&store, TWO_FIELDS).await.unwrap();
        let text = export_kml(&store).await.unwrap().unwrap();
        let again = crate::open_memory_store().await.unwrap();
        let summary = import_kml(&again, &text).await.unwrap();
        assert_eq!(summary.imported.len(), 2);
        assert_eq!(
            LandRepo::list(&store).await.unwrap(),
            LandRepo::list(&again).await.unwrap()
        );
    }
}
