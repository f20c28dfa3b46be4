// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Claimed queue entries.

use async_trait::async_trait;

use crate::error::StowageError;
use crate::types::JobId;

/// A job claimed from a persistent queue.
///
/// Dropping an entry that was neither removed nor requeued requeues it, so a
/// crashed worker never loses a job (at-least-once delivery).
#[async_trait]
pub trait FetchedJob: Send + Sync {
    /// The claimed job.
    fn job_id(&self) -> JobId;

    /// Queue the entry was claimed from.
    fn queue(&self) -> &str;

    /// Acknowledge: delete the entry permanently.
    async fn remove_from_queue(&mut self) -> Result<(), StowageError>;

    /// Abandon: make the entry immediately claimable again.
    async fn requeue(&mut self) -> Result<(), StowageError>;
}
