// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded reuse of database handles.
//!
//! The pool never blocks: `acquire` hands out an idle handle or opens a new
//! one. `pool_size` only caps how many handles are kept idle between uses;
//! surplus handles are closed when they are released.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use stowage_config::StorageConfig;
use stowage_core::StowageError;
use tracing::{debug, warn};

use crate::database::{Database, OpenOptions};

/// Opens new handles to the backing store.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn open(&self) -> Result<Database, StowageError>;
}

/// Opens handles to a SQLite file with fixed PRAGMA settings.
#[derive(Debug, Clone)]
pub struct SqliteConnectionFactory {
    path: String,
    options: OpenOptions,
}

impl SqliteConnectionFactory {
    pub fn new(path: impl Into<String>, options: OpenOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.database_path.clone(), OpenOptions::from(config))
    }
}

#[async_trait]
impl ConnectionFactory for SqliteConnectionFactory {
    async fn open(&self) -> Result<Database, StowageError> {
        Database::open_with(&self.path, &self.options).await
    }
}

pub struct ConnectionPool {
    factory: Arc<dyn ConnectionFactory>,
    pool_size: usize,
    idle: Mutex<VecDeque<Database>>,
    shut_down: AtomicBool,
}

impl ConnectionPool {
    pub fn new(factory: Arc<dyn ConnectionFactory>, pool_size: usize) -> Arc<Self> {
        Arc::new(Self {
            factory,
            pool_size,
            idle: Mutex::new(VecDeque::with_capacity(pool_size)),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Borrow a handle. It returns to the pool when the guard is dropped.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledConnection, StowageError> {
        if self.is_shut_down() {
            return Err(StowageError::Disposed {
                resource: "connection pool",
            });
        }

        let reused = self.idle_guard().pop_front();
        let db = match reused {
            Some(db) => db,
            None => {
                debug!("no idle handle, opening a new one");
                self.factory.open().await?
            }
        };

        Ok(PooledConnection {
            db,
            pool: Arc::clone(self),
        })
    }

    /// Take a handle back. Kept while fewer than `pool_size` are idle,
    /// closed otherwise.
    pub fn release(&self, db: Database) {
        let mut idle = self.idle_guard();
        if self.is_shut_down() || idle.len() >= self.pool_size {
            drop(idle);
            debug!("closing surplus handle");
            drop(db);
            return;
        }
        idle.push_back(db);
    }

    /// Stop handing out handles and close the idle ones.
    ///
    /// Handles still borrowed are closed when they come back.
    pub async fn shutdown(&self) {
        let drained: Vec<Database> = {
            let mut idle = self.idle_guard();
            self.shut_down.store(true, Ordering::SeqCst);
            idle.drain(..).collect()
        };

        let count = drained.len();
        for db in drained {
            if let Err(e) = db.close().await {
                warn!(error = %e, "failed to close pooled handle");
            }
        }
        debug!(closed = count, "connection pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.idle_guard().len()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    fn idle_guard(&self) -> MutexGuard<'_, VecDeque<Database>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("pool_size", &self.pool_size)
            .field("idle", &self.idle_count())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// A handle borrowed from a [`ConnectionPool`].
#[derive(Debug)]
pub struct PooledConnection {
    db: Database,
    pool: Arc<ConnectionPool>,
}

impl Deref for PooledConnection {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // The clone shares the handle's thread; only the pool keeps it alive.
        self.pool.release(self.db.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::{tempdir, TempDir};

    struct CountingFactory {
        inner: SqliteConnectionFactory,
        opened: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionFactory for CountingFactory {
        async fn open(&self) -> Result<Database, StowageError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.inner.open().await
        }
    }

    fn counting_pool(pool_size: usize) -> (TempDir, Arc<CountingFactory>, Arc<ConnectionPool>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.db").to_str().unwrap().to_string();
        let factory = Arc::new(CountingFactory {
            inner: SqliteConnectionFactory::new(path, OpenOptions::default()),
            opened: AtomicUsize::new(0),
        });
        let pool = ConnectionPool::new(factory.clone(), pool_size);
        (dir, factory, pool)
    }

    #[tokio::test]
    async fn released_handle_is_reused() {
        let (_dir, factory, pool) = counting_pool(2);

        let first = pool.acquire().await.unwrap();
        drop(first);
        assert_eq!(pool.idle_count(), 1);

        let _second = pool.acquire().await.unwrap();
        assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn acquire_never_blocks_past_pool_size() {
        let (_dir, factory, pool) = counting_pool(1);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        assert_eq!(factory.opened.load(Ordering::SeqCst), 3);

        drop(a);
        drop(b);
        drop(c);
        assert_eq!(pool.idle_count(), 1, "only pool_size handles are retained");
    }

    #[tokio::test]
    async fn borrowed_handle_runs_queries() {
        let (_dir, _factory, pool) = counting_pool(1);
        let db = pool.acquire().await.unwrap();
        let one: i64 = db
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn acquire_after_shutdown_is_disposed() {
        let (_dir, _factory, pool) = counting_pool(2);
        drop(pool.acquire().await.unwrap());

        pool.shutdown().await;
        assert_eq!(pool.idle_count(), 0);

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, StowageError::Disposed { .. }));
    }

    #[tokio::test]
    async fn handle_returned_after_shutdown_is_closed() {
        let (_dir, _factory, pool) = counting_pool(2);
        let borrowed = pool.acquire().await.unwrap();
        pool.shutdown().await;

        drop(borrowed);
        assert_eq!(pool.idle_count(), 0);
    }
}
