// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only view over the `job_queue` table.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params;
use stowage_core::{JobId, StowageError};

use super::{EnqueuedAndFetchedCount, PersistentJobQueueMonitoringApi};
use crate::context::StorageContext;
use crate::models::UNCLAIMED;
use crate::pool::ConnectionPool;
use crate::schema::Tables;

pub struct SqliteJobQueueMonitoringApi {
    pool: Arc<ConnectionPool>,
    tables: Arc<Tables>,
}

impl SqliteJobQueueMonitoringApi {
    pub fn new(ctx: &StorageContext) -> Self {
        Self {
            pool: Arc::clone(&ctx.pool),
            tables: Arc::clone(&ctx.tables),
        }
    }

    async fn page(
        &self,
        queue: &str,
        claimed: bool,
        from: usize,
        per_page: usize,
    ) -> Result<Vec<JobId>, StowageError> {
        let db = self.pool.acquire().await?;
        let condition = if claimed { "<>" } else { "=" };
        let sql = format!(
            "SELECT job_id FROM {} WHERE queue = ?1 AND fetched_at {condition} ?2 \
             ORDER BY id LIMIT ?3 OFFSET ?4",
            self.tables.job_queue
        );
        let queue = queue.to_string();
        let limit = i64::try_from(per_page).unwrap_or(i64::MAX);
        let offset = i64::try_from(from).unwrap_or(i64::MAX);
        db.call_with_retry(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(params![queue, UNCLAIMED, limit, offset], |row| row.get(0))?
                .collect::<Result<Vec<JobId>, _>>()?;
            Ok(ids)
        })
        .await
    }
}

#[async_trait]
impl PersistentJobQueueMonitoringApi for SqliteJobQueueMonitoringApi {
    async fn queues(&self) -> Result<Vec<String>, StowageError> {
        let db = self.pool.acquire().await?;
        let sql = format!(
            "SELECT DISTINCT queue FROM {} ORDER BY queue",
            self.tables.job_queue
        );
        db.call_with_retry(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let queues = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(queues)
        })
        .await
    }

    async fn enqueued_job_ids(
        &self,
        queue: &str,
        from: usize,
        per_page: usize,
    ) -> Result<Vec<JobId>, StowageError> {
        self.page(queue, false, from, per_page).await
    }

    async fn fetched_job_ids(
        &self,
        queue: &str,
        from: usize,
        per_page: usize,
    ) -> Result<Vec<JobId>, StowageError> {
        self.page(queue, true, from, per_page).await
    }

    async fn enqueued_and_fetched_count(
        &self,
        queue: &str,
    ) -> Result<EnqueuedAndFetchedCount, StowageError> {
        let db = self.pool.acquire().await?;
        let sql = format!(
            "SELECT \
                COALESCE(SUM(CASE WHEN fetched_at = ?2 THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN fetched_at <> ?2 THEN 1 ELSE 0 END), 0) \
             FROM {} WHERE queue = ?1",
            self.tables.job_queue
        );
        let queue = queue.to_string();
        db.call_with_retry(move |conn| {
            conn.query_row(&sql, params![queue, UNCLAIMED], |row| {
                Ok(EnqueuedAndFetchedCount {
                    enqueued: row.get(0)?,
                    fetched: row.get(1)?,
                })
            })
        })
        .await
    }
}
