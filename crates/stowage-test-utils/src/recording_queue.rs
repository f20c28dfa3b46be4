// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue provider that records every enqueue before delegating to SQLite.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stowage_core::{FetchedJob, JobId, StowageError};
use stowage_storage::{
    PersistentJobQueue, PersistentJobQueueMonitoringApi, PersistentJobQueueProvider,
    SqliteJobQueueProvider, StorageContext,
};
use tokio_util::sync::CancellationToken;

type Journal = Arc<Mutex<Vec<(String, JobId)>>>;

/// Records `(queue, job_id)` for every entry inserted through it.
#[derive(Default)]
pub struct RecordingQueueProvider {
    inner: SqliteJobQueueProvider,
    journal: Journal,
}

impl RecordingQueueProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything enqueued so far, in commit order.
    pub fn enqueued(&self) -> Vec<(String, JobId)> {
        self.journal
            .lock()
            .map(|journal| journal.clone())
            .unwrap_or_default()
    }
}

impl PersistentJobQueueProvider for RecordingQueueProvider {
    fn job_queue(&self, ctx: &Arc<StorageContext>) -> Arc<dyn PersistentJobQueue> {
        Arc::new(RecordingQueue {
            inner: self.inner.job_queue(ctx),
            journal: Arc::clone(&self.journal),
        })
    }

    fn monitoring_api(&self, ctx: &Arc<StorageContext>) -> Arc<dyn PersistentJobQueueMonitoringApi> {
        self.inner.monitoring_api(ctx)
    }
}

struct RecordingQueue {
    inner: Arc<dyn PersistentJobQueue>,
    journal: Journal,
}

#[async_trait]
impl PersistentJobQueue for RecordingQueue {
    async fn dequeue(
        &self,
        queues: &[String],
        cancellation: &CancellationToken,
    ) -> Result<Box<dyn FetchedJob>, StowageError> {
        self.inner.dequeue(queues, cancellation).await
    }

    fn enqueue(
        &self,
        conn: &rusqlite::Connection,
        queue: &str,
        job_id: JobId,
    ) -> rusqlite::Result<()> {
        self.inner.enqueue(conn, queue, job_id)?;
        if let Ok(mut journal) = self.journal.lock() {
            journal.push((queue.to_string(), job_id));
        }
        Ok(())
    }
}
