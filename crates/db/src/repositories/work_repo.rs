//! Repository for the `works` table.

use chrono::{NaiveDate, Utc};

use landbook_core::model::Work;
use landbook_core::types::DbId;

use crate::models::WorkRow;
use crate::{DbPool, Query, Store};

/// Column list for works queries.
const COLUMNS: &str = "id, lid, zid, title, description, scheduled_at, created_at, edited_at";

/// Schedule order shared by every list.
const ORDER: &str = "ORDER BY scheduled_at, id";

/// Provides CRUD operations for scheduled works.
pub struct WorkRepo;

impl WorkRepo {
    /// Insert or replace a work. A referenced land or zone must exist.
    pub async fn insert(store: &Store, work: &Work) -> Result<DbId, sqlx::Error> {
        let id = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO works
                (id, lid, zid, title, description, scheduled_at, scheduled_on, created_at, edited_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (id) DO UPDATE SET
                lid = excluded.lid,
                zid = excluded.zid,
                title = excluded.title,
                description = excluded.description,
                scheduled_at = excluded.scheduled_at,
                scheduled_on = excluded.scheduled_on,
                edited_at = excluded.edited_at
             RETURNING id",
        )
        .bind((work.id != 0).then_some(work.id))
        .bind(work.lid)
        .bind(work.zid)
        .bind(&work.title)
        .bind(&work.description)
        .bind(work.scheduled_at)
        .bind(work.scheduled_date())
        .bind(work.created_at)
        .bind(Utc::now())
        .fetch_one(store.pool())
        .await?;
        store.notify();
        Ok(id)
    }

    /// Find a work by its ID.
    pub async fn find_by_id(store: &Store, id: DbId) -> Result<Option<Work>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM works WHERE id = ?1");
        let row = sqlx::query_as::<_, WorkRow>(&query)
            .bind(id)
            .fetch_optional(store.pool())
            .await?;
        Ok(row.map(Work::from))
    }

    /// List all works, soonest first.
    pub async fn list(store: &Store) -> Result<Vec<Work>, sqlx::Error> {
        fetch_all(store.pool().clone()).await
    }

    pub async fn list_by_land(store: &Store, lid: DbId) -> Result<Vec<Work>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM works WHERE lid = ?1 {ORDER}");
        fetch(store.pool(), &query, lid).await
    }

    pub async fn list_by_zone(store: &Store, zid: DbId) -> Result<Vec<Work>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM works WHERE zid = ?1 {ORDER}");
        fetch(store.pool(), &query, zid).await
    }

    /// Works scheduled on `date` (UTC).
    pub async fn list_by_date(store: &Store, date: NaiveDate) -> Result<Vec<Work>, sqlx::Error> {
        fetch_by_date(store.pool().clone(), date).await
    }

    /// Number of works scheduled on `date` (UTC).
    pub async fn count_by_date(store: &Store, date: NaiveDate) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM works WHERE scheduled_on = ?1")
            .bind(date)
            .fetch_one(store.pool())
            .await
    }

    pub async fn delete(store: &Store, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM works WHERE id = ?1")
            .bind(id)
            .execute(store.pool())
            .await?;
        let existed = result.rows_affected() > 0;
        if existed {
            store.notify();
        }
        Ok(existed)
    }

    /// Live list of all works, soonest first.
    pub fn watch_all(store: &Store) -> Query<Vec<Work>> {
        store.query(fetch_all)
    }

    /// Live list of the works scheduled on `date`.
    pub fn watch_by_date(store: &Store, date: NaiveDate) -> Query<Vec<Work>> {
        store.query(move |pool| fetch_by_date(pool, date))
    }
}

async fn fetch(pool: &DbPool, query: &str, key: DbId) -> Result<Vec<Work>, sqlx::Error> {
    let rows = sqlx::query_as::<_, WorkRow>(query)
        .bind(key)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(Work::from).collect())
}

async fn fetch_all(pool: DbPool) -> Result<Vec<Work>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM works {ORDER}");
    let rows = sqlx::query_as::<_, WorkRow>(&query).fetch_all(&pool).await?;
    Ok(rows.into_iter().map(Work::from).collect())
}

async fn fetch_by_date(pool: DbPool, date: NaiveDate) -> Result<Vec<Work>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM works WHERE scheduled_on = ?1 {ORDER}");
    let rows = sqlx::query_as::<_, WorkRow>(&query)
        .bind(date)
        .fetch_all(&pool)
        .await?;
    Ok(rows.into_iter().map(Work::from).collect())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use sqlx::SqlitePool;

    use landbook_core::model::Land;

    use super::*;
    use crate::repositories::LandRepo;

    fn work_at(day: u32, hour: u32) -> Work {
        let mut work = Work::empty();
        work.scheduled_at = Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap();
        work
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_list_orders_by_schedule(pool: SqlitePool) {
        let store = Store::new(pool);
        WorkRepo::insert(&store, &work_at(3, 9)).await.unwrap();
        WorkRepo::insert(&store, &work_at(1, 9)).await.unwrap();
        WorkRepo::insert(&store, &work_at(2, 9)).await.unwrap();
        let ids: Vec<DbId> = WorkRepo::list(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_by_date(pool: SqlitePool) {
        let store = Store::new(pool);
        WorkRepo::insert(&store, &work_at(1, 8)).await.unwrap();
        WorkRepo::insert(&store, &work_at(1, 17)).await.unwrap();
        WorkRepo::insert(&store, &work_at(2, 8)).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(WorkRepo::count_by_date(&store, day).await.unwrap(), 2);
        let works = WorkRepo::list_by_date(&store, day).await.unwrap();
        assert_eq!(works.len(), 2);
        assert_eq!(works[0].scheduled_at, work_at(1, 8).scheduled_at);
        let empty = day - Duration::days(1);
        assert_eq!(WorkRepo::count_by_date(&store, empty).await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_insert_checks_references(pool: SqlitePool) {
        let store = Store::new(pool);
        let mut work = Work::empty();
        work.zid = Some(4);
        assert_matches!(
            WorkRepo::insert(&store, &work).await,
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation()
        );

        let lid = LandRepo::insert(&store, &Land::empty()).await.unwrap();
        work.zid = None;
        work.lid = Some(lid);
        let id = WorkRepo::insert(&store, &work).await.unwrap();
        assert_eq!(WorkRepo::list_by_land(&store, lid).await.unwrap()[0].id, id);
        assert!(WorkRepo::list_by_zone(&store, 4).await.unwrap().is_empty());
        assert_eq!(WorkRepo::find_by_id(&store, id).await.unwrap().unwrap().lid, Some(lid));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_watch_by_date(pool: SqlitePool) {
        let store = Store::new(pool);
        let day = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        let mut query = WorkRepo::watch_by_date(&store, day);
        assert_eq!(query.next().await, Some(vec![]));

        let id = WorkRepo::insert(&store, &work_at(2, 6)).await.unwrap();
        assert_eq!(query.next().await.unwrap()[0].id, id);

        WorkRepo::delete(&store, id).await.unwrap();
        assert_eq!(query.next().await, Some(vec![]));
    }
}
