// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage facade trait.

use async_trait::async_trait;

use crate::error::StowageError;
use crate::traits::connection::StorageConnection;
use crate::types::HealthStatus;

/// Entry point of a storage backend.
///
/// Owns the connection pool and the process-local coordination state, and
/// hands out [`StorageConnection`]s to workers.
#[async_trait]
pub trait JobStorage: Send + Sync + 'static {
    /// Returns the human-readable name of this backend.
    fn name(&self) -> &str;

    /// Opens the backing store and prepares the schema.
    async fn initialize(&self) -> Result<(), StowageError>;

    /// Borrows a connection. The underlying handle goes back to the pool when
    /// the returned value is dropped.
    async fn connection(&self) -> Result<Box<dyn StorageConnection>, StowageError>;

    /// Performs a health check and returns the current status.
    async fn health_check(&self) -> Result<HealthStatus, StowageError>;

    /// Closes the backend. Every later call fails with [`StowageError::Disposed`].
    async fn close(&self) -> Result<(), StowageError>;
}
