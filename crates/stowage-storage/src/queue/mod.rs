// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent job queues.
//!
//! A queue provider supplies the queue implementation and its monitoring
//! view. Every queue name resolves to exactly one provider through the
//! [`QueueProviderRegistry`]; the built-in SQLite provider is the default.

mod fetched;
mod monitoring;
mod registry;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use stowage_core::{FetchedJob, JobId, StowageError};
use tokio_util::sync::CancellationToken;

use crate::context::StorageContext;

pub use fetched::SqliteFetchedJob;
pub use monitoring::SqliteJobQueueMonitoringApi;
pub use registry::QueueProviderRegistry;
pub use sqlite::{SqliteJobQueue, SqliteJobQueueProvider};

/// A queue implementation.
#[async_trait]
pub trait PersistentJobQueue: Send + Sync {
    /// Claim the next entry from `queues`, earlier queues first, waiting
    /// until one is available or `cancellation` fires.
    async fn dequeue(
        &self,
        queues: &[String],
        cancellation: &CancellationToken,
    ) -> Result<Box<dyn FetchedJob>, StowageError>;

    /// Insert an entry. Runs on the committing handle of a write transaction.
    fn enqueue(
        &self,
        conn: &rusqlite::Connection,
        queue: &str,
        job_id: JobId,
    ) -> rusqlite::Result<()>;
}

/// Per-queue counts of waiting and claimed entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueuedAndFetchedCount {
    pub enqueued: i64,
    pub fetched: i64,
}

/// Read-only view of a provider's queues.
#[async_trait]
pub trait PersistentJobQueueMonitoringApi: Send + Sync {
    async fn queues(&self) -> Result<Vec<String>, StowageError>;

    /// Job ids waiting in `queue`, oldest first.
    async fn enqueued_job_ids(
        &self,
        queue: &str,
        from: usize,
        per_page: usize,
    ) -> Result<Vec<JobId>, StowageError>;

    /// Job ids claimed from `queue` and not yet acknowledged, oldest first.
    async fn fetched_job_ids(
        &self,
        queue: &str,
        from: usize,
        per_page: usize,
    ) -> Result<Vec<JobId>, StowageError>;

    async fn enqueued_and_fetched_count(
        &self,
        queue: &str,
    ) -> Result<EnqueuedAndFetchedCount, StowageError>;
}

/// Supplies a queue implementation and its monitoring view.
pub trait PersistentJobQueueProvider: Send + Sync {
    fn job_queue(&self, ctx: &Arc<StorageContext>) -> Arc<dyn PersistentJobQueue>;

    fn monitoring_api(&self, ctx: &Arc<StorageContext>) -> Arc<dyn PersistentJobQueueMonitoringApi>;
}
