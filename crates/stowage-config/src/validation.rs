// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as non-empty paths, non-zero timings, and SQL-safe table prefixes.

use crate::diagnostic::ConfigError;
use crate::model::StowageConfig;

/// Shortest lease that still leaves a non-zero heartbeat interval (`lease / 5`).
pub const MIN_LEASE_MS: u64 = 5;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &StowageConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.storage.pool_size == 0 {
        fail("storage.pool_size must be at least 1".to_string());
    }

    // The prefix is spliced into quoted identifiers; keep it to a safe alphabet.
    let prefix = &config.storage.table_prefix;
    if !prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        fail(format!(
            "storage.table_prefix `{prefix}` may only contain ASCII letters, digits and `_`"
        ));
    }

    if config.lock.lease_ms < MIN_LEASE_MS {
        fail(format!(
            "lock.lease_ms must be at least {MIN_LEASE_MS}, got {}",
            config.lock.lease_ms
        ));
    }

    if config.lock.default_timeout_ms == 0 {
        fail("lock.default_timeout_ms must be greater than 0".to_string());
    }

    if config.queue.poll_interval_ms == 0 {
        fail("queue.poll_interval_ms must be greater than 0".to_string());
    }

    if config.queue.invisibility_timeout_secs == 0 {
        fail("queue.invisibility_timeout_secs must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
