// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lease-based distributed lock backed by a UNIQUE row per resource.
//!
//! Acquiring inserts `(resource, key, now + lease)`; the UNIQUE constraint on
//! `resource` makes at most one insert win. Expired rows are deleted before
//! each attempt, so a crashed holder blocks others for at most one lease. A
//! background task renews the lease every `lease / 5` while the lock is held.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::params;
use stowage_core::{ensure_not_empty, DistributedLock, StowageError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn, Instrument, Span};
use uuid::Uuid;

use crate::context::StorageContext;
use crate::database::is_constraint_violation;
use crate::keyed::ReleaseNotifier;
use crate::models::{duration_millis, now_millis};
use crate::pool::ConnectionPool;
use crate::schema::Tables;

const RELEASE_ATTEMPTS: u32 = 3;
const RELEASE_RETRY_DELAY: Duration = Duration::from_millis(100);
const MIN_WAIT_SLICE: Duration = Duration::from_millis(1);

/// A held distributed lock. Dropping it releases the lock in the background.
pub struct SqliteDistributedLock {
    resource: String,
    resource_key: String,
    pool: Arc<ConnectionPool>,
    tables: Arc<Tables>,
    notifier: Arc<ReleaseNotifier>,
    stop: CancellationToken,
    lost: CancellationToken,
    heartbeat: Option<JoinHandle<()>>,
    released: bool,
}

impl SqliteDistributedLock {
    /// Acquire `resource`, waiting up to `timeout`.
    pub async fn acquire(
        ctx: &StorageContext,
        resource: &str,
        timeout: Duration,
        lease: Duration,
    ) -> Result<Self, StowageError> {
        Self::acquire_with_cancellation(ctx, resource, timeout, lease, &CancellationToken::new())
            .await
    }

    /// Acquire `resource`, waiting up to `timeout` or until `cancellation` fires.
    pub async fn acquire_with_cancellation(
        ctx: &StorageContext,
        resource: &str,
        timeout: Duration,
        lease: Duration,
        cancellation: &CancellationToken,
    ) -> Result<Self, StowageError> {
        ensure_not_empty("resource", resource)?;
        if lease.is_zero() {
            return Err(StowageError::argument("lease", "must be greater than zero"));
        }

        let resource_key = Uuid::new_v4().to_string();
        let started = Instant::now();
        let slice = (timeout / 10).max(MIN_WAIT_SLICE);
        let notify = ctx.release_notifier.subscribe(resource);

        loop {
            if cancellation.is_cancelled() {
                return Err(StowageError::Cancelled);
            }

            // Registered before the attempt so a release in between still wakes us.
            let released = notify.notified();

            if try_insert(ctx, resource, &resource_key, lease).await? {
                debug!(resource, waited_ms = started.elapsed().as_millis() as u64, "distributed lock acquired");
                return Ok(Self::held(ctx, resource, resource_key, lease));
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                debug!(resource, "distributed lock acquisition timed out");
                return Err(StowageError::LockTimeout {
                    resource: resource.to_string(),
                    timeout,
                });
            }

            let wait = slice.min(timeout - elapsed);
            trace!(resource, wait_ms = wait.as_millis() as u64, "distributed lock contended, waiting");
            tokio::select! {
                _ = cancellation.cancelled() => return Err(StowageError::Cancelled),
                _ = released => trace!(resource, "woken by local release"),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn held(ctx: &StorageContext, resource: &str, resource_key: String, lease: Duration) -> Self {
        let stop = CancellationToken::new();
        let lost = CancellationToken::new();
        // The heartbeat logs under the acquirer's span.
        let heartbeat = tokio::spawn(
            renew_until_stopped(
                Arc::clone(&ctx.pool),
                Arc::clone(&ctx.tables),
                resource.to_string(),
                resource_key.clone(),
                lease,
                stop.clone(),
                lost.clone(),
            )
            .instrument(Span::current()),
        );

        Self {
            resource: resource.to_string(),
            resource_key,
            pool: Arc::clone(&ctx.pool),
            tables: Arc::clone(&ctx.tables),
            notifier: Arc::clone(&ctx.release_notifier),
            stop,
            lost,
            heartbeat: Some(heartbeat),
            released: false,
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Unique key written into the lock row by this holder.
    pub fn resource_key(&self) -> &str {
        &self.resource_key
    }

    pub fn is_lost(&self) -> bool {
        self.lost.is_cancelled()
    }

    /// Stop renewing, delete the lock row and wake local waiters.
    pub async fn release(mut self) {
        self.release_in_place().await;
    }

    async fn release_in_place(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stop.cancel();
        if let Some(heartbeat) = self.heartbeat.take()
            && let Err(e) = heartbeat.await
        {
            warn!(resource = %self.resource, error = %e, "lock heartbeat task failed");
        }

        delete_lock_row(
            &self.pool,
            &self.tables,
            &self.notifier,
            &self.resource,
            &self.resource_key,
        )
        .await;
    }
}

#[async_trait]
impl DistributedLock for SqliteDistributedLock {
    fn resource(&self) -> &str {
        &self.resource
    }

    fn is_lost(&self) -> bool {
        self.lost.is_cancelled()
    }

    fn lost_signal(&self) -> CancellationToken {
        self.lost.clone()
    }

    async fn release(mut self: Box<Self>) {
        self.release_in_place().await;
    }
}

impl Drop for SqliteDistributedLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.stop.cancel();

        let pool = Arc::clone(&self.pool);
        let tables = Arc::clone(&self.tables);
        let notifier = Arc::clone(&self.notifier);
        let resource = self.resource.clone();
        let resource_key = self.resource_key.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(
                    async move {
                        delete_lock_row(&pool, &tables, &notifier, &resource, &resource_key)
                            .await;
                    }
                    .instrument(Span::current()),
                );
            }
            Err(_) => warn!(
                resource = %self.resource,
                "distributed lock dropped outside a runtime; it will expire with its lease"
            ),
        }
    }
}

impl std::fmt::Debug for SqliteDistributedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDistributedLock")
            .field("resource", &self.resource)
            .field("resource_key", &self.resource_key)
            .field("lost", &self.is_lost())
            .finish()
    }
}

/// Delete an expired holder of `resource`, then try to become the holder.
async fn try_insert(
    ctx: &StorageContext,
    resource: &str,
    resource_key: &str,
    lease: Duration,
) -> Result<bool, StowageError> {
    let db = ctx.pool.acquire().await?;

    let cleanup = format!(
        "DELETE FROM {} WHERE resource = ?1 AND expire_at < ?2",
        ctx.tables.lock
    );
    let owned_resource = resource.to_string();
    if let Err(e) = db
        .call_with_retry(move |conn| conn.execute(&cleanup, params![owned_resource, now_millis()]))
        .await
    {
        warn!(resource, error = %e, "failed to delete expired lock rows");
    }

    let insert = format!(
        "INSERT INTO {} (resource, resource_key, expire_at) VALUES (?1, ?2, ?3)",
        ctx.tables.lock
    );
    let resource = resource.to_string();
    let resource_key = resource_key.to_string();
    let lease_ms = duration_millis(lease);
    db.call_with_retry(move |conn| {
        let expire_at = now_millis().saturating_add(lease_ms);
        match conn.execute(&insert, params![resource, resource_key, expire_at]) {
            Ok(inserted) => Ok(inserted == 1),
            Err(e) if is_constraint_violation(&e) => Ok(false),
            Err(e) => Err(e),
        }
    })
    .await
}

/// Renew the lease until `stop` fires or the row turns out to be gone.
async fn renew_until_stopped(
    pool: Arc<ConnectionPool>,
    tables: Arc<Tables>,
    resource: String,
    resource_key: String,
    lease: Duration,
    stop: CancellationToken,
    lost: CancellationToken,
) {
    let period = (lease / 5).max(MIN_WAIT_SLICE);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match renew(&pool, &tables, &resource, &resource_key, lease).await {
            Ok(true) => trace!(resource = %resource, "lock lease renewed"),
            Ok(false) => {
                if stop.is_cancelled() {
                    break;
                }
                warn!(resource = %resource, "distributed lock lost: lease renewal matched no row");
                lost.cancel();
                break;
            }
            Err(StowageError::Disposed { .. }) => {
                debug!(resource = %resource, "storage disposed, stopping lock heartbeat");
                break;
            }
            Err(e) => warn!(
                resource = %resource,
                error = %e,
                "failed to renew lock lease, retrying on next tick"
            ),
        }
    }
}

async fn renew(
    pool: &Arc<ConnectionPool>,
    tables: &Tables,
    resource: &str,
    resource_key: &str,
    lease: Duration,
) -> Result<bool, StowageError> {
    let db = pool.acquire().await?;
    let sql = format!(
        "UPDATE {} SET expire_at = ?1 WHERE resource = ?2 AND resource_key = ?3",
        tables.lock
    );
    let resource = resource.to_string();
    let resource_key = resource_key.to_string();
    let lease_ms = duration_millis(lease);
    db.call_with_retry(move |conn| {
        let expire_at = now_millis().saturating_add(lease_ms);
        conn.execute(&sql, params![expire_at, resource, resource_key])
            .map(|updated| updated == 1)
    })
    .await
}

async fn delete_lock_row(
    pool: &Arc<ConnectionPool>,
    tables: &Tables,
    notifier: &ReleaseNotifier,
    resource: &str,
    resource_key: &str,
) {
    for attempt in 1..=RELEASE_ATTEMPTS {
        match delete_once(pool, tables, resource, resource_key).await {
            Ok(()) => {
                notifier.notify_released(resource);
                debug!(resource, "distributed lock released");
                return;
            }
            Err(e) if attempt < RELEASE_ATTEMPTS => {
                warn!(resource, attempt, error = %e, "failed to release distributed lock, retrying");
                tokio::time::sleep(RELEASE_RETRY_DELAY).await;
            }
            Err(e) => error!(
                resource,
                error = %e,
                "giving up releasing distributed lock; it will expire with its lease"
            ),
        }
    }
}

async fn delete_once(
    pool: &Arc<ConnectionPool>,
    tables: &Tables,
    resource: &str,
    resource_key: &str,
) -> Result<(), StowageError> {
    let db = pool.acquire().await?;
    let sql = format!(
        "DELETE FROM {} WHERE resource = ?1 AND resource_key = ?2",
        tables.lock
    );
    let resource = resource.to_string();
    let resource_key = resource_key.to_string();
    db.call_with_retry(move |conn| conn.execute(&sql, params![resource, resource_key]))
        .await?;
    Ok(())
}
