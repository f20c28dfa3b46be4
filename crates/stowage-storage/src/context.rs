// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared state of one initialized storage instance.

use std::sync::Arc;

use stowage_config::{LockConfig, QueueConfig};

use crate::keyed::{ClaimLocks, ReleaseNotifier};
use crate::pool::ConnectionPool;
use crate::schema::Tables;

/// Everything connections, locks and queues of one storage instance share.
#[derive(Debug)]
pub struct StorageContext {
    pub pool: Arc<ConnectionPool>,
    pub tables: Arc<Tables>,
    pub release_notifier: Arc<ReleaseNotifier>,
    pub claim_locks: Arc<ClaimLocks>,
    pub lock: LockConfig,
    pub queue: QueueConfig,
}

impl StorageContext {
    pub fn new(
        pool: Arc<ConnectionPool>,
        tables: Tables,
        lock: LockConfig,
        queue: QueueConfig,
    ) -> Self {
        Self {
            pool,
            tables: Arc::new(tables),
            release_notifier: Arc::new(ReleaseNotifier::new()),
            claim_locks: Arc::new(ClaimLocks::new()),
            lock,
            queue,
        }
    }
}
