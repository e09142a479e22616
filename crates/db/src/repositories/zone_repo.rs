//! Repository for the `zones` table.

use sqlx::types::Json;

use landbook_core::model::{non_empty_holes, Zone};
use landbook_core::types::DbId;

use crate::models::{color_column, ZoneRow};
use crate::{DbPool, Query, Store};

/// Column list for zones queries.
const COLUMNS: &str = "id, lid, title, color, border, holes";

/// Provides CRUD operations for zones.
pub struct ZoneRepo;

impl ZoneRepo {
    /// Insert or replace a zone. Fails with a foreign key violation when
    /// the parent land does not exist.
    pub async fn insert(store: &Store, zone: &Zone) -> Result<DbId, sqlx::Error> {
        let query = format!(
            "INSERT INTO zones ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (id) DO UPDATE SET
                lid = excluded.lid,
                title = excluded.title,
                color = excluded.color,
                border = excluded.border,
                holes = excluded.holes
             RETURNING id"
        );
        let id = sqlx::query_scalar::<_, DbId>(&query)
            .bind((zone.id != 0).then_some(zone.id))
            .bind(zone.lid)
            .bind(&zone.title)
            .bind(color_column(zone.color))
            .bind(Json(&zone.border))
            .bind(Json(non_empty_holes(zone.holes.clone())))
            .fetch_one(store.pool())
            .await?;
        store.notify();
        Ok(id)
    }

    /// Find a zone by its ID.
    pub async fn find_by_id(store: &Store, id: DbId) -> Result<Option<Zone>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM zones WHERE id = ?1");
        let row = sqlx::query_as::<_, ZoneRow>(&query)
            .bind(id)
            .fetch_optional(store.pool())
            .await?;
        Ok(row.map(Zone::from))
    }

    /// List all zones, ordered by id.
    pub async fn list(store: &Store) -> Result<Vec<Zone>, sqlx::Error> {
        fetch_all(store.pool().clone()).await
    }

    /// List the zones of one land.
    pub async fn list_by_land(store: &Store, lid: DbId) -> Result<Vec<Zone>, sqlx::Error> {
        fetch_by_land(store.pool().clone(), lid).await
    }

    /// Delete a zone. Works scheduled in it are removed by cascade.
    pub async fn delete(store: &Store, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM zones WHERE id = ?1")
            .bind(id)
            .execute(store.pool())
            .await?;
        let existed = result.rows_affected() > 0;
        if existed {
            store.notify();
        }
        Ok(existed)
    }

    /// Live list of all zones.
    pub fn watch_all(store: &Store) -> Query<Vec<Zone>> {
        store.query(fetch_all)
    }

    /// Live list of the zones of one land.
    pub fn watch_by_land(store: &Store, lid: DbId) -> Query<Vec<Zone>> {
        store.query(move |pool| fetch_by_land(pool, lid))
    }
}

async fn fetch_all(pool: DbPool) -> Result<Vec<Zone>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM zones ORDER BY id");
    let rows = sqlx::query_as::<_, ZoneRow>(&query).fetch_all(&pool).await?;
    Ok(rows.into_iter().map(Zone::from).collect())
}

async fn fetch_by_land(pool: DbPool, lid: DbId) -> Result<Vec<Zone>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM zones WHERE lid = ?1 ORDER BY id");
    let rows = sqlx::query_as::<_, ZoneRow>(&query)
        .bind(lid)
        .fetch_all(&pool)
        .await?;
    Ok(rows.into_iter().map(Zone::from).collect())
}
