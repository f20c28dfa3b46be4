// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-only transaction: a buffer of mutations applied in one pass.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StowageError;
use crate::types::{JobId, JobState};

/// Buffers mutations and applies them, in call order, on [`commit`](Self::commit).
///
/// Buffering calls never touch storage; they only validate their arguments.
/// `commit` may succeed once per transaction.
#[async_trait]
pub trait WriteOnlyTransaction: Send {
    /// Set an absolute expiry of `now + expire_in` on a job.
    fn expire_job(&mut self, job_id: JobId, expire_in: Duration) -> Result<(), StowageError>;

    /// Clear a job's expiry.
    fn persist_job(&mut self, job_id: JobId) -> Result<(), StowageError>;

    /// Append a state to the history and make it the job's current state.
    fn set_job_state(&mut self, job_id: JobId, state: &JobState) -> Result<(), StowageError>;

    /// Append a state to the history without changing the current state.
    fn add_job_state(&mut self, job_id: JobId, state: &JobState) -> Result<(), StowageError>;

    /// Enqueue a job through the provider responsible for `queue`.
    fn add_to_queue(&mut self, queue: &str, job_id: JobId) -> Result<(), StowageError>;

    fn increment_counter(&mut self, key: &str) -> Result<(), StowageError>;

    fn increment_counter_with_expiry(
        &mut self,
        key: &str,
        expire_in: Duration,
    ) -> Result<(), StowageError>;

    fn decrement_counter(&mut self, key: &str) -> Result<(), StowageError>;

    fn decrement_counter_with_expiry(
        &mut self,
        key: &str,
        expire_in: Duration,
    ) -> Result<(), StowageError>;

    /// Upsert `(key, value)` with a score of `0.0`.
    fn add_to_set(&mut self, key: &str, value: &str) -> Result<(), StowageError>;

    /// Upsert `(key, value)`; an existing member has its score replaced.
    fn add_to_set_with_score(
        &mut self,
        key: &str,
        value: &str,
        score: f64,
    ) -> Result<(), StowageError>;

    fn add_range_to_set(&mut self, key: &str, values: &[String]) -> Result<(), StowageError>;

    fn remove_from_set(&mut self, key: &str, value: &str) -> Result<(), StowageError>;

    fn remove_set(&mut self, key: &str) -> Result<(), StowageError>;

    /// Append a value; duplicates are kept.
    fn insert_to_list(&mut self, key: &str, value: &str) -> Result<(), StowageError>;

    /// Remove every entry of `key` equal to `value`.
    fn remove_from_list(&mut self, key: &str, value: &str) -> Result<(), StowageError>;

    /// Keep only the entries at 0-based positions `keep_starting_from..=keep_ending_at`
    /// counted from the most recently inserted one.
    fn trim_list(
        &mut self,
        key: &str,
        keep_starting_from: i64,
        keep_ending_at: i64,
    ) -> Result<(), StowageError>;

    fn set_range_in_hash(
        &mut self,
        key: &str,
        pairs: &[(String, String)],
    ) -> Result<(), StowageError>;

    fn remove_hash(&mut self, key: &str) -> Result<(), StowageError>;

    fn expire_set(&mut self, key: &str, expire_in: Duration) -> Result<(), StowageError>;

    fn expire_list(&mut self, key: &str, expire_in: Duration) -> Result<(), StowageError>;

    fn expire_hash(&mut self, key: &str, expire_in: Duration) -> Result<(), StowageError>;

    fn persist_set(&mut self, key: &str) -> Result<(), StowageError>;

    fn persist_list(&mut self, key: &str) -> Result<(), StowageError>;

    fn persist_hash(&mut self, key: &str) -> Result<(), StowageError>;

    /// Number of buffered commands not yet applied.
    fn pending_commands(&self) -> usize;

    /// Apply every buffered command in order against one connection.
    ///
    /// Commands applied before a failing one stay applied.
    async fn commit(&mut self) -> Result<(), StowageError>;
}
