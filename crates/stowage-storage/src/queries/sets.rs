// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scored set reads.

use std::collections::HashSet;
use std::time::Duration;

use rusqlite::{params, OptionalExtension};
use stowage_core::StowageError;

use super::{key_count, key_ttl, limit_offset};
use crate::database::Database;
use crate::schema::Tables;

pub async fn get_all_items(
    db: &Database,
    tables: &Tables,
    key: &str,
) -> Result<HashSet<String>, StowageError> {
    let sql = format!("SELECT value FROM {} WHERE key = ?1", tables.set);
    let key = key.to_string();
    db.call_with_retry(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map(params![key], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(values)
    })
    .await
}

/// The member with the lowest score in `from_score..=to_score`.
pub async fn get_first_by_lowest_score(
    db: &Database,
    tables: &Tables,
    key: &str,
    from_score: f64,
    to_score: f64,
) -> Result<Option<String>, StowageError> {
    if from_score.is_nan() {
        return Err(StowageError::argument("from_score", "must be a number"));
    }
    if to_score.is_nan() {
        return Err(StowageError::argument("to_score", "must be a number"));
    }
    if to_score < from_score {
        return Err(StowageError::argument(
            "to_score",
            "must not be lower than from_score",
        ));
    }

    let sql = format!(
        "SELECT value FROM {} WHERE key = ?1 AND score BETWEEN ?2 AND ?3 \
         ORDER BY score, id LIMIT 1",
        tables.set
    );
    let key = key.to_string();
    db.call_with_retry(move |conn| {
        conn.query_row(&sql, params![key, from_score, to_score], |row| row.get(0))
            .optional()
    })
    .await
}

pub async fn get_count(db: &Database, tables: &Tables, key: &str) -> Result<i64, StowageError> {
    key_count(db, &tables.set, key).await
}

/// Members at 0-based positions `start..=end` in insertion order.
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
        "SELECT value FROM {} WHERE key = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
        tables.set
    );
    let key = key.to_string();
    db.call_with_retry(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map(params![key, limit, offset], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(values)
    })
    .await
}

pub async fn get_ttl(
    db: &Database,
    tables: &Tables,
    key: &str,
) -> Result<Option<Duration>, StowageError> {
    key_ttl(db, &tables.set, key).await
}
