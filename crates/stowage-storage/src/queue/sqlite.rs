// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The built-in queue: one `job_queue` table polled with conditional updates.
//!
//! A claim selects the oldest candidate row and then updates it only if its
//! `fetched_at` is still the value that was read. Losing that race to another
//! process affects zero rows, and the scan of that queue starts over.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use stowage_core::{ensure_not_empty, FetchedJob, JobId, StowageError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::fetched::SqliteFetchedJob;
use super::monitoring::SqliteJobQueueMonitoringApi;
use super::{PersistentJobQueue, PersistentJobQueueMonitoringApi, PersistentJobQueueProvider};
use crate::context::StorageContext;
use crate::database::Database;
use crate::keyed::ClaimLocks;
use crate::models::{duration_millis, now_millis, UNCLAIMED};
use crate::pool::ConnectionPool;
use crate::schema::Tables;

/// Provider of [`SqliteJobQueue`]; the default of every registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteJobQueueProvider;

impl PersistentJobQueueProvider for SqliteJobQueueProvider {
    fn job_queue(&self, ctx: &Arc<StorageContext>) -> Arc<dyn PersistentJobQueue> {
        Arc::new(SqliteJobQueue::new(ctx))
    }

    fn monitoring_api(&self, ctx: &Arc<StorageContext>) -> Arc<dyn PersistentJobQueueMonitoringApi> {
        Arc::new(SqliteJobQueueMonitoringApi::new(ctx))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidates {
    /// Entries nobody has claimed.
    Unclaimed,
    /// Entries claimed longer ago than the invisibility timeout.
    Abandoned,
}

enum Claim {
    Won { id: i64, job_id: JobId },
    Lost,
    Empty,
}

pub struct SqliteJobQueue {
    pool: Arc<ConnectionPool>,
    tables: Arc<Tables>,
    claim_locks: Arc<ClaimLocks>,
    poll_interval: Duration,
    invisibility_timeout: Duration,
}

impl SqliteJobQueue {
    pub fn new(ctx: &StorageContext) -> Self {
        Self {
            pool: Arc::clone(&ctx.pool),
            tables: Arc::clone(&ctx.tables),
            claim_locks: Arc::clone(&ctx.claim_locks),
            poll_interval: ctx.queue.poll_interval(),
            invisibility_timeout: ctx.queue.invisibility_timeout(),
        }
    }

    /// One pass over `queues`: unclaimed entries of every queue first, then
    /// abandoned ones.
    async fn try_fetch(&self, queues: &[String]) -> Result<Option<SqliteFetchedJob>, StowageError> {
        let db = self.pool.acquire().await?;
        for candidates in [Candidates::Unclaimed, Candidates::Abandoned] {
            for queue in queues {
                let _section = self.claim_locks.enter(queue).await;
                loop {
                    match self.try_claim(&db, queue, candidates).await? {
                        Claim::Won { id, job_id } => {
                            debug!(queue = %queue, job_id, ?candidates, "job claimed");
                            return Ok(Some(SqliteFetchedJob::new(
                                Arc::clone(&self.pool),
                                Arc::clone(&self.tables),
                                id,
                                job_id,
                                queue.clone(),
                            )));
                        }
                        Claim::Lost => trace!(queue = %queue, "claim lost to another process, rescanning"),
                        Claim::Empty => break,
                    }
                }
            }
        }
        Ok(None)
    }

    async fn try_claim(
        &self,
        db: &Database,
        queue: &str,
        candidates: Candidates,
    ) -> Result<Claim, StowageError> {
        let t = &self.tables;
        let select = match candidates {
            Candidates::Unclaimed => format!(
                "SELECT id, job_id, fetched_at FROM {} \
                 WHERE queue = ?1 AND fetched_at = ?2 ORDER BY id LIMIT 1",
                t.job_queue
            ),
            Candidates::Abandoned => format!(
                "SELECT id, job_id, fetched_at FROM {} \
                 WHERE queue = ?1 AND fetched_at <> ?2 AND fetched_at < ?3 ORDER BY id LIMIT 1",
                t.job_queue
            ),
        };
        let update = format!(
            "UPDATE {} SET fetched_at = ?1 WHERE id = ?2 AND fetched_at = ?3",
            t.job_queue
        );
        let queue = queue.to_string();
        let invisibility_ms = duration_millis(self.invisibility_timeout);

        db.call_with_retry(move |conn| {
            let now = now_millis();
            let read = |row: &rusqlite::Row<'_>| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
            };
            let candidate = match candidates {
                Candidates::Unclaimed => conn
                    .query_row(&select, params![queue, UNCLAIMED], read)
                    .optional()?,
                Candidates::Abandoned => conn
                    .query_row(
                        &select,
                        params![queue, UNCLAIMED, now.saturating_sub(invisibility_ms)],
                        read,
                    )
                    .optional()?,
            };

            let Some((id, job_id, seen_fetched_at)) = candidate else {
                return Ok(Claim::Empty);
            };
            // A concurrent claim has already moved `fetched_at` off the value read.
            let updated = conn.execute(&update, params![now, id, seen_fetched_at])?;
            Ok(if updated == 1 {
                Claim::Won { id, job_id }
            } else {
                Claim::Lost
            })
        })
        .await
    }
}

#[async_trait]
impl PersistentJobQueue for SqliteJobQueue {
    async fn dequeue(
        &self,
        queues: &[String],
        cancellation: &CancellationToken,
    ) -> Result<Box<dyn FetchedJob>, StowageError> {
        if queues.is_empty() {
            return Err(StowageError::argument("queues", "at least one queue is required"));
        }
        for queue in queues {
            ensure_not_empty("queue", queue)?;
        }

        loop {
            if cancellation.is_cancelled() {
                return Err(StowageError::Cancelled);
            }
            if let Some(job) = self.try_fetch(queues).await? {
                return Ok(Box::new(job));
            }

            trace!(queues = ?queues, "no job available, polling again later");
            tokio::select! {
                _ = cancellation.cancelled() => return Err(StowageError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    fn enqueue(
        &self,
        conn: &rusqlite::Connection,
        queue: &str,
        job_id: JobId,
    ) -> rusqlite::Result<()> {
        let sql = format!(
            "INSERT INTO {} (job_id, queue, fetched_at) VALUES (?1, ?2, ?3)",
            self.tables.job_queue
        );
        conn.execute(&sql, params![job_id, queue, UNCLAIMED])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, test_context_with};
    use std::collections::HashSet;
    use stowage_config::QueueConfig;

    async fn enqueue(ctx: &StorageContext, queue: &str, job_id: JobId) {
        let db = ctx.pool.acquire().await.unwrap();
        let queue_impl = SqliteJobQueue::new(ctx);
        let queue = queue.to_string();
        db.call(move |conn| queue_impl.enqueue(conn, &queue, job_id))
            .await
            .unwrap();
    }

    fn names(queues: &[&str]) -> Vec<String> {
        queues.iter().map(|q| q.to_string()).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dequeue_returns_oldest_entry_first() {
        let (_dir, ctx) = test_context().await;
        enqueue(&ctx, "default", 1).await;
        enqueue(&ctx, "default", 2).await;

        let queue = SqliteJobQueue::new(&ctx);
        let mut job = queue
            .dequeue(&names(&["default"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(job.job_id(), 1);
        assert_eq!(job.queue(), "default");
        job.remove_from_queue().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn earlier_queue_wins_over_older_entry_in_later_queue() {
        let (_dir, ctx) = test_context().await;
        enqueue(&ctx, "default", 1).await;
        enqueue(&ctx, "critical", 2).await;

        let queue = SqliteJobQueue::new(&ctx);
        let mut job = queue
            .dequeue(&names(&["critical", "default"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(job.job_id(), 2);
        job.remove_from_queue().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_workers_never_claim_the_same_entry() {
        let (_dir, ctx) = test_context().await;
        let ctx = Arc::new(ctx);
        for job_id in 1..=20 {
            enqueue(&ctx, "default", job_id).await;
        }

        let mut workers = Vec::new();
        for _ in 0..4 {
            let ctx = Arc::clone(&ctx);
            workers.push(tokio::spawn(async move {
                let queue = SqliteJobQueue::new(&ctx);
                let mut claimed = Vec::new();
                for _ in 0..5 {
                    let mut job = queue
                        .dequeue(&["default".to_string()], &CancellationToken::new())
                        .await
                        .unwrap();
                    claimed.push(job.job_id());
                    job.remove_from_queue().await.unwrap();
                }
                claimed
            }));
        }

        let mut seen = HashSet::new();
        for worker in workers {
            for job_id in worker.await.unwrap() {
                assert!(seen.insert(job_id), "job {job_id} claimed twice");
            }
        }
        assert_eq!(seen.len(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn claimed_entry_is_invisible_until_timeout() {
        let (_dir, ctx) = test_context_with(QueueConfig {
            poll_interval_ms: 20,
            invisibility_timeout_secs: 1,
        })
        .await;
        enqueue(&ctx, "default", 7).await;

        let queue = SqliteJobQueue::new(&ctx);
        let _first = queue
            .dequeue(&names(&["default"]), &CancellationToken::new())
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });
        let hidden = queue.dequeue(&names(&["default"]), &cancel).await;
        assert!(matches!(hidden, Err(StowageError::Cancelled)));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let mut reclaimed = queue
            .dequeue(&names(&["default"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reclaimed.job_id(), 7);
        reclaimed.remove_from_queue().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn requeued_entry_is_claimable_again() {
        let (_dir, ctx) = test_context().await;
        enqueue(&ctx, "default", 3).await;

        let queue = SqliteJobQueue::new(&ctx);
        let mut job = queue
            .dequeue(&names(&["default"]), &CancellationToken::new())
            .await
            .unwrap();
        job.requeue().await.unwrap();

        let mut again = queue
            .dequeue(&names(&["default"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(again.job_id(), 3);
        again.remove_from_queue().await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_requires_a_queue() {
        let (_dir, ctx) = test_context().await;
        let queue = SqliteJobQueue::new(&ctx);
        let err = queue.dequeue(&[], &CancellationToken::new()).await.err().unwrap();
        assert!(matches!(err, StowageError::Argument { name: "queues", .. }));
    }

    #[tokio::test]
    async fn cancelled_token_returns_immediately() {
        let (_dir, ctx) = test_context().await;
        let queue = SqliteJobQueue::new(&ctx);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = queue.dequeue(&names(&["default"]), &cancel).await.err().unwrap();
        assert!(matches!(err, StowageError::Cancelled));
    }
}
