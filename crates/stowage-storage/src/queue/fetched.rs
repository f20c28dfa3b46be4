// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A claimed `job_queue` row.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params;
use stowage_core::{FetchedJob, JobId, StowageError};
use tracing::{debug, warn};

use crate::models::UNCLAIMED;
use crate::pool::ConnectionPool;
use crate::schema::Tables;

/// A claimed entry. Dropping it unresolved requeues it.
pub struct SqliteFetchedJob {
    pool: Arc<ConnectionPool>,
    tables: Arc<Tables>,
    id: i64,
    job_id: JobId,
    queue: String,
    resolved: bool,
}

impl SqliteFetchedJob {
    pub(crate) fn new(
        pool: Arc<ConnectionPool>,
        tables: Arc<Tables>,
        id: i64,
        job_id: JobId,
        queue: String,
    ) -> Self {
        Self {
            pool,
            tables,
            id,
            job_id,
            queue,
            resolved: false,
        }
    }

    /// Row id of the queue entry.
    pub fn entry_id(&self) -> i64 {
        self.id
    }
}

#[async_trait]
impl FetchedJob for SqliteFetchedJob {
    fn job_id(&self) -> JobId {
        self.job_id
    }

    fn queue(&self) -> &str {
        &self.queue
    }

    async fn remove_from_queue(&mut self) -> Result<(), StowageError> {
        let db = self.pool.acquire().await?;
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.tables.job_queue);
        let id = self.id;
        db.call_with_retry(move |conn| conn.execute(&sql, params![id]))
            .await?;
        self.resolved = true;
        debug!(queue = %self.queue, job_id = self.job_id, "queue entry removed");
        Ok(())
    }

    async fn requeue(&mut self) -> Result<(), StowageError> {
        requeue_entry(&self.pool, &self.tables, self.id).await?;
        self.resolved = true;
        debug!(queue = %self.queue, job_id = self.job_id, "queue entry requeued");
        Ok(())
    }
}

impl Drop for SqliteFetchedJob {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        warn!(
            queue = %self.queue,
            job_id = self.job_id,
            "fetched job dropped without being removed or requeued, requeueing"
        );

        let pool = Arc::clone(&self.pool);
        let tables = Arc::clone(&self.tables);
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = requeue_entry(&pool, &tables, id).await {
                    warn!(entry_id = id, error = %e, "failed to requeue dropped job, it returns after the invisibility timeout");
                }
            });
        }
    }
}

impl std::fmt::Debug for SqliteFetchedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteFetchedJob")
            .field("id", &self.id)
            .field("job_id", &self.job_id)
            .field("queue", &self.queue)
            .field("resolved", &self.resolved)
            .finish()
    }
}

async fn requeue_entry(pool: &Arc<ConnectionPool>, tables: &Tables, id: i64) -> Result<(), StowageError> {
    let db = pool.acquire().await?;
    let sql = format!("UPDATE {} SET fetched_at = ?1 WHERE id = ?2", tables.job_queue);
    db.call_with_retry(move |conn| conn.execute(&sql, params![UNCLAIMED, id]))
        .await?;
    Ok(())
}
