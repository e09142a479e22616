//! Persistence for lands, zones, notes and works.
//!
//! Rows live in SQLite behind a [`DbPool`]. [`Store`] pairs the pool with a
//! change tick that every committed write bumps, so an open [`Query`]
//! re-runs its select and pushes the new result. Repositories in
//! [`repositories`] are zero-sized structs whose methods take `&Store` as
//! the first argument.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

pub mod models;
pub mod repositories;
pub mod services;
pub mod store;

pub use store::{Query, Store};

pub type DbPool = sqlx::SqlitePool;

/// URL of a private database that lives as long as its pool.
pub const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

/// Create a connection pool from a database URL.
///
/// An in-memory database exists per connection, so its pool is held to a
/// single connection that is never recycled.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool_options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };
    pool_options.connect_with(options).await
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Open a migrated store at `database_url`.
pub async fn open_store(database_url: &str) -> Result<Store, sqlx::Error> {
    let pool = create_pool(database_url).await?;
    run_migrations(&pool).await?;
    tracing::debug!(database_url, "Store opened");
    Ok(Store::new(pool))
}

/// Open a migrated store backed by a private in-memory database.
pub async fn open_memory_store() -> Result<Store, sqlx::Error> {
    open_store(MEMORY_DATABASE_URL).await
}

#[cfg(test)]
mod tests {
    use landbook_core::model::{Land, Zone};

    use super::*;
    use crate::repositories::{LandRepo, ZoneRepo};

    #[tokio::test]
    async fn test_memory_store_is_migrated_and_shared() {
        let store = open_memory_store().await.unwrap();
        let id = LandRepo::insert(&store, &Land::empty()).await.unwrap();
        let other = store.clone();
        assert_eq!(LandRepo::list(&other).await.unwrap()[0].id, id);
    }

    #[tokio::test]
    async fn test_memory_stores_are_private() {
        let first = open_memory_store().await.unwrap();
        let second = open_memory_store().await.unwrap();
        LandRepo::insert(&first, &Land::empty()).await.unwrap();
        assert!(LandRepo::list(&second).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let store = open_memory_store().await.unwrap();
        assert!(ZoneRepo::insert(&store, &Zone::empty(42)).await.is_err());
    }
}
