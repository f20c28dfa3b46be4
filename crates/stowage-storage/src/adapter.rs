// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SqliteStorage: the [`JobStorage`] implementation.
//!
//! Construction is cheap and does no I/O. `initialize` opens the pool and
//! runs migrations; `close` checkpoints the WAL and shuts the pool down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use stowage_config::StowageConfig;
use stowage_config::validation::validate_config;
use stowage_core::{HealthStatus, JobStorage, StorageConnection, StowageError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::connection::SqliteConnection;
use crate::context::StorageContext;
use crate::migrations;
use crate::pool::{ConnectionPool, SqliteConnectionFactory};
use crate::queue::{PersistentJobQueueMonitoringApi, QueueProviderRegistry};
use crate::schema::Tables;

pub struct SqliteStorage {
    config: StowageConfig,
    providers: Arc<QueueProviderRegistry>,
    ctx: OnceCell<Arc<StorageContext>>,
    closed: AtomicBool,
}

impl SqliteStorage {
    /// Create a storage that routes every queue to the built-in SQLite queue.
    /// Call [`initialize`](JobStorage::initialize) before use.
    pub fn new(config: StowageConfig) -> Self {
        Self::with_queue_providers(config, QueueProviderRegistry::default())
    }

    pub fn with_queue_providers(config: StowageConfig, providers: QueueProviderRegistry) -> Self {
        Self {
            config,
            providers: Arc::new(providers),
            ctx: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &StowageConfig {
        &self.config
    }

    pub fn queue_providers(&self) -> &QueueProviderRegistry {
        &self.providers
    }

    /// The shared context, once initialized and until closed.
    pub fn context(&self) -> Result<&Arc<StorageContext>, StowageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StowageError::Disposed { resource: "storage" });
        }
        self.ctx.get().ok_or_else(|| StowageError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// A connection with the concrete type, for callers that need the
    /// cancellable lock acquisition.
    pub async fn sqlite_connection(&self) -> Result<SqliteConnection, StowageError> {
        let ctx = Arc::clone(self.context()?);
        SqliteConnection::open(ctx, Arc::clone(&self.providers)).await
    }

    /// Monitoring view of the provider serving `queue`.
    pub fn monitoring_api(
        &self,
        queue: &str,
    ) -> Result<Arc<dyn PersistentJobQueueMonitoringApi>, StowageError> {
        let ctx = self.context()?;
        Ok(self.providers.resolve(queue).monitoring_api(ctx))
    }

    /// Monitoring views of every distinct provider, the default one first.
    pub fn monitoring_apis(&self) -> Result<Vec<Arc<dyn PersistentJobQueueMonitoringApi>>, StowageError> {
        let ctx = self.context()?;
        Ok(self
            .providers
            .providers()
            .iter()
            .map(|provider| provider.monitoring_api(ctx))
            .collect())
    }
}

#[async_trait]
impl JobStorage for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn initialize(&self) -> Result<(), StowageError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StowageError::Disposed { resource: "storage" });
        }
        if self.ctx.initialized() {
            return Err(StowageError::Internal("storage is already initialized".into()));
        }

        let storage = &self.config.storage;
        let tables = Tables::new(&storage.table_prefix)?;
        validate_config(&self.config).map_err(|errors| {
            StowageError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

        let factory = Arc::new(SqliteConnectionFactory::from_config(storage));
        let pool = ConnectionPool::new(factory, storage.pool_size);

        if storage.prepare_schema {
            let db = pool.acquire().await?;
            let migration_tables = tables.clone();
            db.run(move |conn| migrations::run_migrations(conn, &migration_tables))
                .await?;
        }

        let ctx = Arc::new(StorageContext::new(
            pool,
            tables,
            self.config.lock.clone(),
            self.config.queue.clone(),
        ));
        self.ctx
            .set(ctx)
            .map_err(|_| StowageError::Internal("storage is already initialized".into()))?;

        info!(
            path = %storage.database_path,
            prefix = %storage.table_prefix,
            pool_size = storage.pool_size,
            "sqlite storage initialized"
        );
        Ok(())
    }

    async fn connection(&self) -> Result<Box<dyn StorageConnection>, StowageError> {
        Ok(Box::new(self.sqlite_connection().await?))
    }

    async fn health_check(&self) -> Result<HealthStatus, StowageError> {
        let ctx = self.context()?;
        let db = ctx.pool.acquire().await?;
        match db
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
        {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn close(&self) -> Result<(), StowageError> {
        let ctx = Arc::clone(self.context()?);
        self.closed.store(true, Ordering::SeqCst);

        if self.config.storage.wal_mode {
            match ctx.pool.acquire().await {
                Ok(db) => {
                    if let Err(e) = db
                        .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
                        .await
                    {
                        warn!(error = %e, "WAL checkpoint on close failed");
                    }
                }
                Err(e) => warn!(error = %e, "no handle available for WAL checkpoint"),
            }
        }

        ctx.pool.shutdown().await;
        debug!("sqlite storage closed");
        Ok(())
    }
}
