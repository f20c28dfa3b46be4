// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! List reads. Position 0 is the most recently inserted entry.

use std::time::Duration;

use rusqlite::params;
use stowage_core::StowageError;

use super::{key_count, key_ttl, limit_offset};
use crate::database::Database;
use crate::schema::Tables;

pub async fn get_all_items(
    db: &Database,
    tables: &Tables,
    key: &str,
) -> Result<Vec<String>, StowageError> {
    let sql = format!(
        "SELECT value FROM {} WHERE key = ?1 ORDER BY id DESC",
        tables.list
    );
    let key = key.to_string();
    db.call_with_retry(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map(params![key], |row| {
                Ok(row.get::<_, Option<String>>(0)?.unwrap_or_default())
            })?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    })
    .await
}

pub async fn get_range(
    db: &Database,
    tables: &Tables,
    key: &str,
    start: usize,
    end: usize,
) -> Result<Vec<String>, StowageError> {
    let Some((limit, offset)) = limit_offset(start, end) else {
        return Ok(Vec::new());
    };
    let sql = format!(
        "SELECT value FROM {} WHERE key = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
        tables.list
    );
    let key = key.to_string();
    db.call_with_retry(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map(params![key, limit, offset], |row| {
                Ok(row.get::<_, Option<String>>(0)?.unwrap_or_default())
            })?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    })
    .await
}

pub async fn get_count(db: &Database, tables: &Tables, key: &str) -> Result<i64, StowageError> {
    key_count(db, &tables.list, key).await
}

pub async fn get_ttl(
    db: &Database,
    tables: &Tables,
    key: &str,
) -> Result<Option<Duration>, StowageError> {
    key_ttl(db, &tables.list, key).await
}
