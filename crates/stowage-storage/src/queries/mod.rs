// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Direct (non-transactional) reads and writes, one module per data kind.

pub mod counters;
pub mod hashes;
pub mod jobs;
pub mod lists;
pub mod servers;
pub mod sets;

use std::time::Duration;

use rusqlite::params;
use stowage_core::StowageError;

use crate::database::Database;
use crate::models::time_to_live;

/// Remaining lifetime of the soonest-expiring row of `key` in `table`.
pub(crate) async fn key_ttl(
    db: &Database,
    table: &str,
    key: &str,
) -> Result<Option<Duration>, StowageError> {
    let sql = format!("SELECT MIN(expire_at) FROM {table} WHERE key = ?1");
    let key = key.to_string();
    let expire_at: Option<i64> = db
        .call_with_retry(move |conn| conn.query_row(&sql, params![key], |row| row.get(0)))
        .await?;
    Ok(time_to_live(expire_at))
}

/// Row count of `key` in `table`.
pub(crate) async fn key_count(db: &Database, table: &str, key: &str) -> Result<i64, StowageError> {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE key = ?1");
    let key = key.to_string();
    db.call_with_retry(move |conn| conn.query_row(&sql, params![key], |row| row.get(0)))
        .await
}

/// LIMIT/OFFSET for the inclusive 0-based range `start..=end`; `None` when
/// the range is empty.
pub(crate) fn limit_offset(start: usize, end: usize) -> Option<(i64, i64)> {
    if end < start {
        return None;
    }
    let limit = i64::try_from(end - start).map_or(i64::MAX, |n| n.saturating_add(1));
    let offset = i64::try_from(start).unwrap_or(i64::MAX);
    Some((limit, offset))
}
