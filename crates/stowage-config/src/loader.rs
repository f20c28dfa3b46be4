// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./stowage.toml` > `~/.config/stowage/stowage.toml` > `/etc/stowage/stowage.toml`
//! with environment variable overrides via `STOWAGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::StowageConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/stowage/stowage.toml` (system-wide)
/// 3. `~/.config/stowage/stowage.toml` (user XDG config)
/// 4. `./stowage.toml` (local directory)
/// 5. `STOWAGE_*` environment variables
pub fn load_config() -> Result<StowageConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<StowageConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StowageConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<StowageConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StowageConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for XDG loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(StowageConfig::default()))
        .merge(Toml::file("/etc/stowage/stowage.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("stowage/stowage.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("stowage.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `STOWAGE_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")`: keys such as
/// `poll_interval_ms` contain underscores themselves. The key reaches `map`
/// with its original (upper) case, so it is lowercased before matching.
fn env_provider() -> Env {
    Env::prefixed("STOWAGE_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("storage_", "storage.", 1)
            .replacen("lock_", "lock.", 1)
            .replacen("queue_", "queue.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_map_into_every_section() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("STOWAGE_STORAGE_POOL_SIZE", "3");
            jail.set_env("STOWAGE_LOCK_LEASE_MS", "750");
            jail.set_env("STOWAGE_QUEUE_INVISIBILITY_TIMEOUT_SECS", "90");

            let config: StowageConfig = Figment::new()
                .merge(Serialized::defaults(StowageConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.storage.pool_size, 3);
            assert_eq!(config.lock.lease_ms, 750);
            assert_eq!(config.queue.invisibility_timeout_secs, 90);
            Ok(())
        });
    }
}
