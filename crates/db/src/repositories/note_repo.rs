//! Repository for the `notes` table.

use chrono::Utc;

use landbook_core::model::Note;
use landbook_core::types::DbId;

use crate::models::{color_column, NoteRow};
use crate::{DbPool, Query, Store};

/// Column list for notes queries.
const COLUMNS: &str = "id, lid, title, description, color, latitude, longitude, radius, \
    created_at, edited_at";

/// Provides CRUD operations for notes.
pub struct NoteRepo;

impl NoteRepo {
    /// Insert or replace a note. `edited_at` is stamped on every write;
    /// `created_at` is kept from the stored row when replacing.
    pub async fn insert(store: &Store, note: &Note) -> Result<DbId, sqlx::Error> {
        let query = format!(
            "INSERT INTO notes ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (id) DO UPDATE SET
                lid = excluded.lid,
                title = excluded.title,
                description = excluded.description,
                color = excluded.color,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                radius = excluded.radius,
                edited_at = excluded.edited_at
             RETURNING id"
        );
        let id = sqlx::query_scalar::<_, DbId>(&query)
            .bind((note.id != 0).then_some(note.id))
            .bind(note.lid)
            .bind(&note.title)
            .bind(&note.description)
            .bind(color_column(note.color))
            .bind(note.center.latitude)
            .bind(note.center.longitude)
            .bind(note.radius)
            .bind(note.created_at)
            .bind(Utc::now())
            .fetch_one(store.pool())
            .await?;
        store.notify();
        Ok(id)
    }

    /// Find a note by its ID.
    pub async fn find_by_id(store: &Store, id: DbId) -> Result<Option<Note>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notes WHERE id = ?1");
        let row = sqlx::query_as::<_, NoteRow>(&query)
            .bind(id)
            .fetch_optional(store.pool())
            .await?;
        Ok(row.map(Note::from))
    }

    /// List all notes, ordered by id.
    pub async fn list(store: &Store) -> Result<Vec<Note>, sqlx::Error> {
        fetch_all(store.pool().clone()).await
    }

    /// List the notes of one land.
    pub async fn list_by_land(store: &Store, lid: DbId) -> Result<Vec<Note>, sqlx::Error> {
        fetch_by_land(store.pool().clone(), lid).await
    }

    pub async fn delete(store: &Store, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ?1")
            .bind(id)
            .execute(store.pool())
            .await?;
        let existed = result.rows_affected() > 0;
        if existed {
            store.notify();
        }
        Ok(existed)
    }

    /// Live list of all notes.
    pub fn watch_all(store: &Store) -> Query<Vec<Note>> {
        store.query(fetch_all)
    }

    pub fn watch_by_land(store: &Store, lid: DbId) -> Query<Vec<Note>> {
        store.query(move |pool| fetch_by_land(pool, lid))
    }
}

async fn fetch_all(pool: DbPool) -> Result<Vec<Note>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM notes ORDER BY id");
    let rows = sqlx::query_as::<_, NoteRow>(&query).fetch_all(&pool).await?;
    Ok(rows.into_iter().map(Note::from).collect())
}

async fn fetch_by_land(pool: DbPool, lid: DbId) -> Result<Vec<Note>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM notes WHERE lid = ?1 ORDER BY id");
    let rows = sqlx::query_as::<_, NoteRow>(&query)
        .bind(lid)
        .fetch_all(&pool)
        .await?;
    Ok(rows.into_iter().map(Note::from).collect())
}
