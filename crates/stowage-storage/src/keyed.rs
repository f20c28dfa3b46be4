// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local coordination keyed by name.
//!
//! Both maps only speed things up inside one process. Cross-process
//! correctness always comes from the rows in the database.

use std::ops::Deref;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, Notify, OwnedMutexGuard};

/// Wakes local lock waiters when a resource is released in this process.
#[derive(Debug, Default)]
pub struct ReleaseNotifier {
    waiters: DashMap<String, Arc<Notify>>,
}

impl ReleaseNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// The notifier for `resource`, created on first use.
    ///
    /// The entry is dropped from the map once the last subscription goes away.
    pub fn subscribe(&self, resource: &str) -> ReleaseSubscription<'_> {
        let notify = self
            .waiters
            .entry(resource.to_string())
            .or_default()
            .value()
            .clone();
        ReleaseSubscription {
            notifier: self,
            resource: resource.to_string(),
            notify,
        }
    }

    /// Wake everyone currently waiting on `resource`.
    pub fn notify_released(&self, resource: &str) {
        if let Some(notify) = self.waiters.get(resource) {
            notify.notify_waiters();
        }
        self.prune(resource);
    }

    /// Number of resources with a live notifier.
    pub fn tracked(&self) -> usize {
        self.waiters.len()
    }

    // Only the map itself holds the notifier: nobody is waiting.
    fn prune(&self, resource: &str) {
        self.waiters
            .remove_if(resource, |_, notify| Arc::strong_count(notify) == 1);
    }
}

/// A registration on the release notifier of one resource.
pub struct ReleaseSubscription<'a> {
    notifier: &'a ReleaseNotifier,
    resource: String,
    notify: Arc<Notify>,
}

impl Deref for ReleaseSubscription<'_> {
    type Target = Notify;

    fn deref(&self) -> &Notify {
        &self.notify
    }
}

impl Drop for ReleaseSubscription<'_> {
    fn drop(&mut self) {
        // Two references left: the map's and ours.
        self.notifier.waiters.remove_if(&self.resource, |_, notify| {
            Arc::ptr_eq(notify, &self.notify) && Arc::strong_count(notify) == 2
        });
    }
}

/// Serializes local claim attempts per queue so workers of one process do not
/// race each other for the same row.
#[derive(Debug, Default)]
pub struct ClaimLocks {
    sections: DashMap<String, Arc<Mutex<()>>>,
}

impl ClaimLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the critical section of `queue`; leaving it is dropping the guard.
    pub async fn enter(&self, queue: &str) -> OwnedMutexGuard<()> {
        let section = self
            .sections
            .entry(queue.to_string())
            .or_default()
            .value()
            .clone();
        section.lock_owned().await
    }
}
