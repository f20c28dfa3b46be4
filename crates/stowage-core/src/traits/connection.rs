// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-worker storage connection.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::StowageError;
use crate::traits::lock::DistributedLock;
use crate::traits::queue::FetchedJob;
use crate::traits::transaction::WriteOnlyTransaction;
use crate::types::{JobData, JobId, NewJob, ServerContext, StateData};

/// A connection borrowed from a [`JobStorage`](crate::JobStorage).
#[async_trait]
pub trait StorageConnection: Send + Sync {
    // --- Coordination ---

    async fn create_write_transaction(
        &self,
    ) -> Result<Box<dyn WriteOnlyTransaction>, StowageError>;

    /// Acquire a lock on `resource`, waiting at most `timeout`.
    async fn acquire_distributed_lock(
        &self,
        resource: &str,
        timeout: Duration,
    ) -> Result<Box<dyn DistributedLock>, StowageError>;

    /// Acquire a lock on `resource`, waiting the backend's configured default
    /// timeout.
    async fn acquire_default_distributed_lock(
        &self,
        resource: &str,
    ) -> Result<Box<dyn DistributedLock>, StowageError>;

    /// Claim the next job from `queues`, earlier queues first.
    ///
    /// Waits until a job is available or `cancellation` fires.
    async fn fetch_next_job(
        &self,
        queues: &[String],
        cancellation: &CancellationToken,
    ) -> Result<Box<dyn FetchedJob>, StowageError>;

    // --- Jobs ---

    async fn create_expired_job(
        &self,
        job: &NewJob,
        parameters: &HashMap<String, String>,
        created_at: DateTime<Utc>,
        expire_in: Duration,
    ) -> Result<JobId, StowageError>;

    async fn get_job_data(&self, job_id: JobId) -> Result<Option<JobData>, StowageError>;

    async fn set_job_parameter(
        &self,
        job_id: JobId,
        name: &str,
        value: &str,
    ) -> Result<(), StowageError>;

    async fn get_job_parameter(
        &self,
        job_id: JobId,
        name: &str,
    ) -> Result<Option<String>, StowageError>;

    async fn get_state_data(&self, job_id: JobId) -> Result<Option<StateData>, StowageError>;

    // --- Servers ---

    async fn announce_server(
        &self,
        server_id: &str,
        context: &ServerContext,
    ) -> Result<(), StowageError>;

    async fn heartbeat(&self, server_id: &str) -> Result<(), StowageError>;

    async fn remove_server(&self, server_id: &str) -> Result<(), StowageError>;

    /// Remove servers whose last heartbeat is older than `timeout`.
    async fn remove_timed_out_servers(&self, timeout: Duration) -> Result<usize, StowageError>;

    // --- Sets ---

    async fn get_all_items_from_set(&self, key: &str) -> Result<HashSet<String>, StowageError>;

    async fn get_first_by_lowest_score_from_set(
        &self,
        key: &str,
        from_score: f64,
        to_score: f64,
    ) -> Result<Option<String>, StowageError>;

    async fn get_set_count(&self, key: &str) -> Result<i64, StowageError>;

    async fn get_range_from_set(
        &self,
        key: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<String>, StowageError>;

    async fn get_set_ttl(&self, key: &str) -> Result<Option<Duration>, StowageError>;

    // --- Hashes ---

    async fn set_range_in_hash(
        &self,
        key: &str,
        pairs: &[(String, String)],
    ) -> Result<(), StowageError>;

    async fn get_all_entries_from_hash(
        &self,
        key: &str,
    ) -> Result<Option<HashMap<String, String>>, StowageError>;

    async fn get_value_from_hash(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>, StowageError>;

    async fn get_hash_count(&self, key: &str) -> Result<i64, StowageError>;

    async fn get_hash_ttl(&self, key: &str) -> Result<Option<Duration>, StowageError>;

    // --- Lists ---

    /// All values of a list, most recently inserted first.
    async fn get_all_items_from_list(&self, key: &str) -> Result<Vec<String>, StowageError>;

    async fn get_range_from_list(
        &self,
        key: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<String>, StowageError>;

    async fn get_list_count(&self, key: &str) -> Result<i64, StowageError>;

    async fn get_list_ttl(&self, key: &str) -> Result<Option<Duration>, StowageError>;

    // --- Counters ---

    /// Sum of the raw delta log and the aggregated value for `key`.
    async fn get_counter(&self, key: &str) -> Result<i64, StowageError>;
}
