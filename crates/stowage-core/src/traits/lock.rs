// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distributed lock handle.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A held lease on a named resource.
///
/// The lease is renewed in the background until [`release`](Self::release)
/// is called or the handle is dropped.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Name of the protected resource.
    fn resource(&self) -> &str;

    /// Whether a renewal found the lock row gone or owned by someone else.
    fn is_lost(&self) -> bool;

    /// Token cancelled the moment the lock is found to be lost.
    fn lost_signal(&self) -> CancellationToken;

    /// Stops renewal and deletes the lock row.
    ///
    /// Failures are logged, never returned: lease expiry is the backstop.
    async fn release(self: Box<Self>);
}
