// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite storage engine for Stowage.
//!
//! Provides the SqliteStorage facade implementing the JobStorage trait,
//! with pooled handles, schema migrations, a lease-based distributed lock,
//! pluggable persistent job queues and buffered write-only transactions.

pub mod adapter;
pub mod connection;
pub mod context;
pub mod database;
pub mod keyed;
pub mod lock;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
pub mod queue;
pub mod schema;
pub mod transaction;

pub use adapter::SqliteStorage;
pub use connection::SqliteConnection;
pub use context::StorageContext;
pub use database::{Database, OpenOptions};
pub use lock::SqliteDistributedLock;
pub use pool::{ConnectionFactory, ConnectionPool, PooledConnection, SqliteConnectionFactory};
pub use queue::{
    EnqueuedAndFetchedCount, PersistentJobQueue, PersistentJobQueueMonitoringApi,
    PersistentJobQueueProvider, QueueProviderRegistry, SqliteFetchedJob, SqliteJobQueue,
    SqliteJobQueueMonitoringApi, SqliteJobQueueProvider,
};
pub use schema::Tables;
pub use transaction::SqliteWriteOnlyTransaction;

#[cfg(test)]
pub(crate) mod testing {
    use stowage_config::{LockConfig, QueueConfig, StorageConfig};
    use tempfile::{tempdir, TempDir};

    use crate::context::StorageContext;
    use crate::database::OpenOptions;
    use crate::migrations::run_migrations;
    use crate::pool::{ConnectionPool, SqliteConnectionFactory};
    use crate::schema::Tables;
    use std::sync::Arc;

    /// A migrated database in a temp dir with a short poll interval.
    pub async fn test_context() -> (TempDir, StorageContext) {
        test_context_with(QueueConfig {
            poll_interval_ms: 50,
            ..QueueConfig::default()
        })
        .await
    }

    pub async fn test_context_with(queue: QueueConfig) -> (TempDir, StorageContext) {
        test_context_with_options(queue, OpenOptions::from(&StorageConfig::default())).await
    }

    /// Like [`test_context_with`], with explicit handle options. The file is
    /// `test.db` inside the returned directory.
    pub async fn test_context_with_options(
        queue: QueueConfig,
        options: OpenOptions,
    ) -> (TempDir, StorageContext) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db").to_str().unwrap().to_string();
        let pool = ConnectionPool::new(Arc::new(SqliteConnectionFactory::new(path, options)), 4);

        let tables = Tables::new("").unwrap();
        let db = pool.acquire().await.unwrap();
        let migration_tables = tables.clone();
        db.run(move |conn| run_migrations(conn, &migration_tables))
            .await
            .unwrap();
        drop(db);

        let ctx = StorageContext::new(pool, tables, LockConfig::default(), queue);
        (dir, ctx)
    }
}
