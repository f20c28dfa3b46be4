// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end storage tests.
//!
//! `TestStorage` owns a temp directory holding the SQLite file and an
//! initialized [`SqliteStorage`] over it. [`TestStorage::open_peer`] opens a
//! second, independent storage on the same file, which behaves like another
//! process: separate pool, no shared in-process wakeups.

use std::sync::Arc;
use std::time::Duration;

use stowage_config::{LockConfig, QueueConfig, StorageConfig, StowageConfig};
use stowage_core::{JobStorage, StorageConnection, StowageError};
use stowage_storage::{QueueProviderRegistry, SqliteStorage};

/// Builder for creating test storages with configurable timings.
pub struct TestStorageBuilder {
    pool_size: usize,
    table_prefix: String,
    lease: Duration,
    lock_timeout: Duration,
    poll_interval: Duration,
    invisibility_timeout_secs: u64,
    providers: Option<QueueProviderRegistry>,
}

impl TestStorageBuilder {
    fn new() -> Self {
        Self {
            pool_size: 4,
            table_prefix: String::new(),
            lease: Duration::from_millis(300),
            lock_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(25),
            invisibility_timeout_secs: 1,
            providers: None,
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Lock lease; renewal happens every fifth of it.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Wait used by `acquire_default_distributed_lock`.
    pub fn with_default_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_invisibility_timeout_secs(mut self, secs: u64) -> Self {
        self.invisibility_timeout_secs = secs;
        self
    }

    /// Route queues through a custom registry instead of the default one.
    pub fn with_queue_providers(mut self, providers: QueueProviderRegistry) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Create the temp directory and initialize storage in it.
    pub async fn build(self) -> Result<TestStorage, StowageError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| StowageError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("stowage-test.db");

        let config = StowageConfig {
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                pool_size: self.pool_size,
                table_prefix: self.table_prefix,
                ..StorageConfig::default()
            },
            lock: LockConfig {
                lease_ms: self.lease.as_millis() as u64,
                default_timeout_ms: self.lock_timeout.as_millis() as u64,
            },
            queue: QueueConfig {
                poll_interval_ms: self.poll_interval.as_millis() as u64,
                invisibility_timeout_secs: self.invisibility_timeout_secs,
            },
        };

        let storage = match self.providers {
            Some(providers) => SqliteStorage::with_queue_providers(config.clone(), providers),
            None => SqliteStorage::new(config.clone()),
        };
        storage.initialize().await?;

        Ok(TestStorage {
            storage: Arc::new(storage),
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// An initialized storage over a SQLite file in a temp directory.
///
/// The directory is deleted when the harness is dropped.
pub struct TestStorage {
    pub storage: Arc<SqliteStorage>,
    config: StowageConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestStorage {
    pub fn builder() -> TestStorageBuilder {
        TestStorageBuilder::new()
    }

    /// A harness with default test timings.
    pub async fn new() -> Result<Self, StowageError> {
        Self::builder().build().await
    }

    pub fn config(&self) -> &StowageConfig {
        &self.config
    }

    pub async fn connection(&self) -> Result<Box<dyn StorageConnection>, StowageError> {
        self.storage.connection().await
    }

    /// A second storage on the same file, standing in for another process.
    /// Schema preparation is skipped; the tables already exist.
    pub async fn open_peer(&self) -> Result<SqliteStorage, StowageError> {
        let mut config = self.config.clone();
        config.storage.prepare_schema = false;
        let peer = SqliteStorage::new(config);
        peer.initialize().await?;
        Ok(peer)
    }
}
