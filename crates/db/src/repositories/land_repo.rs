//! Repository for the `lands` table.

use sqlx::types::Json;
use sqlx::{Executor, Sqlite};

use landbook_core::model::{non_empty_holes, Land};
use landbook_core::types::DbId;

use crate::models::{color_column, LandRow};
use crate::{DbPool, Query, Store};

/// Column list for lands queries.
const COLUMNS: &str = "id, title, color, border, holes";

/// Provides CRUD operations for lands.
pub struct LandRepo;

impl LandRepo {
    /// Insert or replace a land. Id `0` allocates a new id; the stored id
    /// is returned either way.
    pub async fn insert(store: &Store, land: &Land) -> Result<DbId, sqlx::Error> {
        let id = upsert(store.pool(), land).await?;
        store.notify();
        Ok(id)
    }

    /// Find a land by its ID.
    pub async fn find_by_id(store: &Store, id: DbId) -> Result<Option<Land>, sqlx::Error> {
        fetch_by_id(store.pool().clone(), id).await
    }

    /// List all lands, ordered by id.
    pub async fn list(store: &Store) -> Result<Vec<Land>, sqlx::Error> {
        fetch_all(store.pool().clone()).await
    }

    /// Delete a land. Its zones, notes and works go with it through the
    /// schema's cascades. Returns `true` if the land existed.
    pub async fn delete(store: &Store, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM lands WHERE id = ?1")
            .bind(id)
            .execute(store.pool())
            .await?;
        let existed = result.rows_affected() > 0;
        if existed {
            store.notify();
        }
        Ok(existed)
    }

    /// Live list of all lands.
    pub fn watch_all(store: &Store) -> Query<Vec<Land>> {
        store.query(fetch_all)
    }

    /// Live view of a single land; `None` while it does not exist.
    pub fn watch_by_id(store: &Store, id: DbId) -> Query<Option<Land>> {
        store.query(move |pool| fetch_by_id(pool, id))
    }
}

/// Insert or update one land on any executor, so imports can batch
/// inside a transaction.
pub(crate) async fn upsert<'e, E>(executor: E, land: &Land) -> Result<DbId, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!(
        "INSERT INTO lands ({COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (id) DO UPDATE SET
            title = excluded.title,
            color = excluded.color,
            border = excluded.border,
            holes = excluded.holes
         RETURNING id"
    );
    sqlx::query_scalar::<_, DbId>(&query)
        .bind((land.id != 0).then_some(land.id))
        .bind(&land.title)
        .bind(color_column(land.color))
        .bind(Json(&land.border))
        .bind(Json(non_empty_holes(land.holes.clone())))
        .fetch_one(executor)
        .await
}

async fn fetch_by_id(pool: DbPool, id: DbId) -> Result<Option<Land>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM lands WHERE id = ?1");
    let row = sqlx::query_as::<_, LandRow>(&query)
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    Ok(row.map(Land::from))
}

async fn fetch_all(pool: DbPool) -> Result<Vec<Land>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM lands ORDER BY id");
    let rows = sqlx::query_as::<_, LandRow>(&query).fetch_all(&pool).await?;
    Ok(rows.into_iter().map(Land::from).collect())
}
