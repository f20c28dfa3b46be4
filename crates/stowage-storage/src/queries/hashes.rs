// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hash reads and the direct upsert used outside transactions.

use std::collections::HashMap;
use std::time::Duration;

use rusqlite::{params, OptionalExtension};
use stowage_core::{ensure_not_empty, StowageError};

use super::{key_count, key_ttl};
use crate::database::Database;
use crate::models::NEVER_EXPIRES;
use crate::schema::Tables;

pub(crate) fn upsert_sql(tables: &Tables) -> String {
    format!(
        "INSERT INTO {} (key, field, value, expire_at) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (key, field) DO UPDATE SET value = excluded.value",
        tables.hash
    )
}

/// Upsert every `(field, value)` pair of `key` in one SQLite transaction.
pub async fn set_range(
    db: &Database,
    tables: &Tables,
    key: &str,
    pairs: &[(String, String)],
) -> Result<(), StowageError> {
    ensure_not_empty("key", key)?;
    for (field, _) in pairs {
        ensure_not_empty("field", field)?;
    }
    if pairs.is_empty() {
        return Ok(());
    }

    let sql = upsert_sql(tables);
    let key = key.to_string();
    let pairs = pairs.to_vec();
    db.call_with_retry(move |conn| {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for (field, value) in &pairs {
                stmt.execute(params![key, field, value, NEVER_EXPIRES])?;
            }
        }
        tx.commit()
    })
    .await
}

/// Every field of `key`, `None` when the hash has no fields.
pub async fn get_all_entries(
    db: &Database,
    tables: &Tables,
    key: &str,
) -> Result<Option<HashMap<String, String>>, StowageError> {
    let sql = format!("SELECT field, value FROM {} WHERE key = ?1", tables.hash);
    let key = key.to_string();
    let entries = db
        .call_with_retry(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params![key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    ))
                })?
                .collect::<Result<HashMap<_, _>, _>>()?;
            Ok(entries)
        })
        .await?;
    Ok((!entries.is_empty()).then_some(entries))
}

pub async fn get_value(
    db: &Database,
    tables: &Tables,
    key: &str,
    field: &str,
) -> Result<Option<String>, StowageError> {
    let sql = format!(
        "SELECT value FROM {} WHERE key = ?1 AND field = ?2",
        tables.hash
    );
    let key = key.to_string();
    let field = field.to_string();
    let value = db
        .call_with_retry(move |conn| {
            conn.query_row(&sql, params![key, field], |row| row.get::<_, Option<String>>(0))
                .optional()
        })
        .await?;
    Ok(value.flatten())
}

pub async fn get_count(db: &Database, tables: &Tables, key: &str) -> Result<i64, StowageError> {
    key_count(db, &tables.hash, key).await
}

pub async fn get_ttl(
    db: &Database,
    tables: &Tables,
    key: &str,
) -> Result<Option<Duration>, StowageError> {
    key_ttl(db, &tables.hash, key).await
}
