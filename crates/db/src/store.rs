use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use tokio::sync::watch;

use crate::DbPool;

/// Cheaply clonable handle to the database plus its change tick.
///
/// Writers call [`Store::notify`] after a commit; every open [`Query`]
/// then re-runs its select.
#[derive(Clone)]
pub struct Store {
    pool: DbPool,
    changes: Arc<watch::Sender<u64>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("version", &*self.changes.borrow())
            .field("queries", &self.changes.receiver_count())
            .finish()
    }
}

impl Store {
    /// Wrap a migrated pool.
    pub fn new(pool: DbPool) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            pool,
            changes: Arc::new(changes),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Wake every open query. Call after each committed write.
    pub(crate) fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    /// Open a push query that runs `select` now and after every write.
    pub fn query<T, F, Fut>(&self, select: F) -> Query<T>
    where
        F: Fn(DbPool) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, sqlx::Error>> + Send + 'static,
    {
        Query {
            rx: self.changes.subscribe(),
            pool: self.pool.clone(),
            select: Box::new(move |pool| select(pool).boxed()),
            pending: true,
            last: None,
        }
    }
}

type Select<T> = Box<dyn Fn(DbPool) -> BoxFuture<'static, Result<T, sqlx::Error>> + Send + Sync>;

/// A live query. The first [`Query::next`] yields the current result, each
/// later call waits for a write that changes it.
pub struct Query<T> {
    rx: watch::Receiver<u64>,
    pool: DbPool,
    select: Select<T>,
    /// A change was seen but its select has not completed yet.
    pending: bool,
    last: Option<T>,
}

impl<T> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("pending", &self.pending)
            .field("started", &self.last.is_some())
            .finish()
    }
}

impl<T: Clone + PartialEq> Query<T> {
    /// Wait for the next distinct result. Returns `None` once every
    /// [`Store`] handle is dropped.
    ///
    /// Cancel safe: dropping the future loses no update. A failed select
    /// is logged and retried on the next write.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            if !self.pending {
                if self.rx.changed().await.is_err() {
                    return None;
                }
                self.pending = true;
            }
            self.rx.borrow_and_update();
            let result = (self.select)(self.pool.clone()).await;
            self.pending = false;
            match result {
                Ok(value) if self.last.as_ref() != Some(&value) => {
                    self.last = Some(value.clone());
                    return Some(value);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Live query failed"),
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = T>
    where
        T: Send + 'static,
    {
        futures::stream::unfold(self, |mut query| async move {
            let value = query.next().await?;
            Some((value, query))
        })
    }
}
