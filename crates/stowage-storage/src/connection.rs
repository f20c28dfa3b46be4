// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`StorageConnection`] over one pooled SQLite handle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stowage_core::{
    ensure_not_empty, DistributedLock, FetchedJob, JobData, JobId, NewJob, ServerContext,
    StateData, StorageConnection, StowageError, WriteOnlyTransaction,
};
use tokio_util::sync::CancellationToken;

use crate::context::StorageContext;
use crate::lock::SqliteDistributedLock;
use crate::pool::PooledConnection;
use crate::queries;
use crate::queue::QueueProviderRegistry;
use crate::transaction::SqliteWriteOnlyTransaction;

/// A connection borrowed from [`SqliteStorage`](crate::SqliteStorage).
///
/// Direct reads and writes run on the borrowed handle. Locks, queue claims
/// and transaction commits take their own handles from the pool.
pub struct SqliteConnection {
    ctx: Arc<StorageContext>,
    providers: Arc<QueueProviderRegistry>,
    db: PooledConnection,
}

impl SqliteConnection {
    pub async fn open(
        ctx: Arc<StorageContext>,
        providers: Arc<QueueProviderRegistry>,
    ) -> Result<Self, StowageError> {
        let db = ctx.pool.acquire().await?;
        Ok(Self { ctx, providers, db })
    }

    /// Like [`StorageConnection::acquire_distributed_lock`], but interruptible.
    pub async fn acquire_distributed_lock_with_cancellation(
        &self,
        resource: &str,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<SqliteDistributedLock, StowageError> {
        SqliteDistributedLock::acquire_with_cancellation(
            &self.ctx,
            resource,
            timeout,
            self.ctx.lock.lease(),
            cancellation,
        )
        .await
    }
}

#[async_trait]
impl StorageConnection for SqliteConnection {
    async fn create_write_transaction(
        &self,
    ) -> Result<Box<dyn WriteOnlyTransaction>, StowageError> {
        Ok(Box::new(SqliteWriteOnlyTransaction::new(
            Arc::clone(&self.ctx),
            Arc::clone(&self.providers),
        )))
    }

    async fn acquire_distributed_lock(
        &self,
        resource: &str,
        timeout: Duration,
    ) -> Result<Box<dyn DistributedLock>, StowageError> {
        let lock =
            SqliteDistributedLock::acquire(&self.ctx, resource, timeout, self.ctx.lock.lease())
                .await?;
        Ok(Box::new(lock))
    }

    async fn acquire_default_distributed_lock(
        &self,
        resource: &str,
    ) -> Result<Box<dyn DistributedLock>, StowageError> {
        self.acquire_distributed_lock(resource, self.ctx.lock.default_timeout())
            .await
    }

    async fn fetch_next_job(
        &self,
        queues: &[String],
        cancellation: &CancellationToken,
    ) -> Result<Box<dyn FetchedJob>, StowageError> {
        let provider = self.providers.resolve_span(queues)?;
        provider
            .job_queue(&self.ctx)
            .dequeue(queues, cancellation)
            .await
    }

    async fn create_expired_job(
        &self,
        job: &NewJob,
        parameters: &HashMap<String, String>,
        created_at: DateTime<Utc>,
        expire_in: Duration,
    ) -> Result<JobId, StowageError> {
        queries::jobs::create_expired_job(
            &self.db,
            &self.ctx.tables,
            job,
            parameters,
            created_at,
            expire_in,
        )
        .await
    }

    async fn get_job_data(&self, job_id: JobId) -> Result<Option<JobData>, StowageError> {
        queries::jobs::get_job_data(&self.db, &self.ctx.tables, job_id).await
    }

    async fn set_job_parameter(
        &self,
        job_id: JobId,
        name: &str,
        value: &str,
    ) -> Result<(), StowageError> {
        queries::jobs::set_job_parameter(&self.db, &self.ctx.tables, job_id, name, value).await
    }

    async fn get_job_parameter(
        &self,
        job_id: JobId,
        name: &str,
    ) -> Result<Option<String>, StowageError> {
        queries::jobs::get_job_parameter(&self.db, &self.ctx.tables, job_id, name).await
    }

    async fn get_state_data(&self, job_id: JobId) -> Result<Option<StateData>, StowageError> {
        queries::jobs::get_state_data(&self.db, &self.ctx.tables, job_id).await
    }

    async fn announce_server(
        &self,
        server_id: &str,
        context: &ServerContext,
    ) -> Result<(), StowageError> {
        queries::servers::announce(&self.db, &self.ctx.tables, server_id, context).await
    }

    async fn heartbeat(&self, server_id: &str) -> Result<(), StowageError> {
        queries::servers::heartbeat(&self.db, &self.ctx.tables, server_id).await
    }

    async fn remove_server(&self, server_id: &str) -> Result<(), StowageError> {
        queries::servers::remove(&self.db, &self.ctx.tables, server_id).await
    }

    async fn remove_timed_out_servers(&self, timeout: Duration) -> Result<usize, StowageError> {
        queries::servers::remove_timed_out(&self.db, &self.ctx.tables, timeout).await
    }

    async fn get_all_items_from_set(&self, key: &str) -> Result<HashSet<String>, StowageError> {
        ensure_not_empty("key", key)?;
        queries::sets::get_all_items(&self.db, &self.ctx.tables, key).await
    }

    async fn get_first_by_lowest_score_from_set(
        &self,
        key: &str,
        from_score: f64,
        to_score: f64,
    ) -> Result<Option<String>, StowageError> {
        ensure_not_empty("key", key)?;
        queries::sets::get_first_by_lowest_score(
            &self.db,
            &self.ctx.tables,
            key,
            from_score,
            to_score,
        )
        .await
    }

    async fn get_set_count(&self, key: &str) -> Result<i64, StowageError> {
        ensure_not_empty("key", key)?;
        queries::sets::get_count(&self.db, &self.ctx.tables, key).await
    }

    async fn get_range_from_set(
        &self,
        key: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<String>, StowageError> {
        ensure_not_empty("key", key)?;
        queries::sets::get_range(&self.db, &self.ctx.tables, key, start, end).await
    }

    async fn get_set_ttl(&self, key: &str) -> Result<Option<Duration>, StowageError> {
        ensure_not_empty("key", key)?;
        queries::sets::get_ttl(&self.db, &self.ctx.tables, key).await
    }

    async fn set_range_in_hash(
        &self,
        key: &str,
        pairs: &[(String, String)],
    ) -> Result<(), StowageError> {
        queries::hashes::set_range(&self.db, &self.ctx.tables, key, pairs).await
    }

    async fn get_all_entries_from_hash(
        &self,
        key: &str,
    ) -> Result<Option<HashMap<String, String>>, StowageError> {
        ensure_not_empty("key", key)?;
        queries::hashes::get_all_entries(&self.db, &self.ctx.tables, key).await
    }

    async fn get_value_from_hash(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>, StowageError> {
        ensure_not_empty("key", key)?;
        ensure_not_empty("field", field)?;
        queries::hashes::get_value(&self.db, &self.ctx.tables, key, field).await
    }

    async fn get_hash_count(&self, key: &str) -> Result<i64, StowageError> {
        ensure_not_empty("key", key)?;
        queries::hashes::get_count(&self.db, &self.ctx.tables, key).await
    }

    async fn get_hash_ttl(&self, key: &str) -> Result<Option<Duration>, StowageError> {
        ensure_not_empty("key", key)?;
        queries::hashes::get_ttl(&self.db, &self.ctx.tables, key).await
    }

    async fn get_all_items_from_list(&self, key: &str) -> Result<Vec<String>, StowageError> {
        ensure_not_empty("key", key)?;
        queries::lists::get_all_items(&self.db, &self.ctx.tables, key).await
    }

    async fn get_range_from_list(
        &self,
        key: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<String>, StowageError> {
        ensure_not_empty("key", key)?;
        queries::lists::get_range(&self.db, &self.ctx.tables, key, start, end).await
    }

    async fn get_list_count(&self, key: &str) -> Result<i64, StowageError> {
        ensure_not_empty("key", key)?;
        queries::lists::get_count(&self.db, &self.ctx.tables, key).await
    }

    async fn get_list_ttl(&self, key: &str) -> Result<Option<Duration>, StowageError> {
        ensure_not_empty("key", key)?;
        queries::lists::get_ttl(&self.db, &self.ctx.tables, key).await
    }

    async fn get_counter(&self, key: &str) -> Result<i64, StowageError> {
        ensure_not_empty("key", key)?;
        queries::counters::get_counter(&self.db, &self.ctx.tables, key).await
    }
}
