// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Stowage job storage engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages. The engine
//! reads these values once and never changes them at runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Stowage configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StowageConfig {
    /// Backing store and connection pool settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Distributed lock settings.
    #[serde(default)]
    pub lock: LockConfig,

    /// Persistent job queue settings.
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Maximum number of idle handles the pool keeps open.
    ///
    /// This bounds retention, not concurrency: more handles may be open at
    /// once, surplus ones are closed on release.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Prefix applied to every table and index name.
    #[serde(default)]
    pub table_prefix: String,

    /// How long SQLite waits on a locked database file before reporting busy.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Run schema migrations during initialization.
    #[serde(default = "default_prepare_schema")]
    pub prepare_schema: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            pool_size: default_pool_size(),
            table_prefix: String::new(),
            busy_timeout_ms: default_busy_timeout_ms(),
            prepare_schema: default_prepare_schema(),
        }
    }
}

impl StorageConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("stowage").join("stowage.db"))
        .unwrap_or_else(|| "stowage.db".into())
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_pool_size() -> usize {
    10
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_prepare_schema() -> bool {
    true
}

/// Distributed lock configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    /// How long a lock stays valid without renewal. The holder renews it every
    /// `lease_ms / 5`.
    #[serde(default = "default_lease_ms")]
    pub lease_ms: u64,

    /// Acquisition timeout used when the caller does not pass one.
    #[serde(default = "default_lock_timeout_ms")]
    pub default_timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ms: default_lease_ms(),
            default_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl LockConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

fn default_lease_ms() -> u64 {
    30_000
}

fn default_lock_timeout_ms() -> u64 {
    30_000
}

/// Persistent job queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Pause between two empty scans of the requested queues.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a claimed entry stays hidden before any worker may reclaim it.
    #[serde(default = "default_invisibility_timeout_secs")]
    pub invisibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            invisibility_timeout_secs: default_invisibility_timeout_secs(),
        }
    }
}

impl QueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn invisibility_timeout(&self) -> Duration {
        Duration::from_secs(self.invisibility_timeout_secs)
    }
}

fn default_poll_interval_ms() -> u64 {
    15_000
}

fn default_invisibility_timeout_secs() -> u64 {
    30 * 60
}
