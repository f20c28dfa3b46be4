// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counter reads. Writes only happen through write transactions, as
//! appended `+1`/`-1` rows.

use rusqlite::params;
use stowage_core::StowageError;

use crate::database::Database;
use crate::schema::Tables;

/// Raw deltas plus the aggregated value of `key`.
pub async fn get_counter(db: &Database, tables: &Tables, key: &str) -> Result<i64, StowageError> {
    let sql = format!(
        "SELECT \
            (SELECT COALESCE(SUM(value), 0) FROM {counter} WHERE key = ?1) + \
            (SELECT COALESCE(SUM(value), 0) FROM {aggregated} WHERE key = ?1)",
        counter = tables.counter,
        aggregated = tables.aggregated_counter,
    );
    let key = key.to_string();
    db.call_with_retry(move |conn| conn.query_row(&sql, params![key], |row| row.get(0)))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NEVER_EXPIRES;
    use crate::testing::test_context;

    #[tokio::test]
    async fn missing_counter_is_zero() {
        let (_dir, ctx) = test_context().await;
        let db = ctx.pool.acquire().await.unwrap();
        assert_eq!(get_counter(&db, &ctx.tables, "stats:succeeded").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deltas_and_aggregate_are_summed() {
        let (_dir, ctx) = test_context().await;
        let db = ctx.pool.acquire().await.unwrap();
        let raw = format!(
            "INSERT INTO {} (key, value, expire_at) VALUES ('c', ?1, ?2)",
            ctx.tables.counter
        );
        let aggregated = format!(
            "INSERT INTO {} (key, value, expire_at) VALUES ('c', 40, ?1)",
            ctx.tables.aggregated_counter
        );
        db.call(move |conn| {
            conn.execute(&raw, params![1, NEVER_EXPIRES])?;
            conn.execute(&raw, params![1, NEVER_EXPIRES])?;
            conn.execute(&raw, params![-1, NEVER_EXPIRES])?;
            conn.execute(&aggregated, params![NEVER_EXPIRES])?;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(get_counter(&db, &ctx.tables, "c").await.unwrap(), 41);
    }
}
