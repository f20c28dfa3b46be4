// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Processing server registry.

use std::time::Duration;

use rusqlite::params;
use stowage_core::{ensure_not_empty, ServerContext, StowageError};
use tracing::{debug, info};

use crate::database::Database;
use crate::models::{duration_millis, now_millis};
use crate::schema::Tables;

/// Register a server, or refresh its data and heartbeat if already known.
pub async fn announce(
    db: &Database,
    tables: &Tables,
    server_id: &str,
    context: &ServerContext,
) -> Result<(), StowageError> {
    ensure_not_empty("server_id", server_id)?;
    let data = serde_json::to_string(context)?;
    let sql = format!(
        "INSERT INTO {} (id, data, last_heartbeat) VALUES (?1, ?2, ?3) \
         ON CONFLICT (id) DO UPDATE SET data = excluded.data, last_heartbeat = excluded.last_heartbeat",
        tables.server
    );
    let server_id = server_id.to_string();
    let id = server_id.clone();
    db.call_with_retry(move |conn| conn.execute(&sql, params![id, data, now_millis()]))
        .await?;
    debug!(server_id = %server_id, "server announced");
    Ok(())
}

pub async fn heartbeat(db: &Database, tables: &Tables, server_id: &str) -> Result<(), StowageError> {
    ensure_not_empty("server_id", server_id)?;
    let sql = format!("UPDATE {} SET last_heartbeat = ?1 WHERE id = ?2", tables.server);
    let server_id = server_id.to_string();
    db.call_with_retry(move |conn| conn.execute(&sql, params![now_millis(), server_id]))
        .await?;
    Ok(())
}

pub async fn remove(db: &Database, tables: &Tables, server_id: &str) -> Result<(), StowageError> {
    ensure_not_empty("server_id", server_id)?;
    let sql = format!("DELETE FROM {} WHERE id = ?1", tables.server);
    let server_id = server_id.to_string();
    db.call_with_retry(move |conn| conn.execute(&sql, params![server_id]))
        .await?;
    Ok(())
}

/// Delete servers silent for longer than `timeout`; returns how many.
pub async fn remove_timed_out(
    db: &Database,
    tables: &Tables,
    timeout: Duration,
) -> Result<usize, StowageError> {
    let sql = format!("DELETE FROM {} WHERE last_heartbeat < ?1", tables.server);
    let timeout_ms = duration_millis(timeout);
    let removed = db
        .call_with_retry(move |conn| {
            conn.execute(&sql, params![now_millis().saturating_sub(timeout_ms)])
        })
        .await?;
    if removed > 0 {
        info!(removed, "removed timed out servers");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;

    async fn server_count(db: &Database, tables: &Tables) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {}", tables.server);
        db.call(move |conn| conn.query_row(&sql, [], |row| row.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn announce_twice_keeps_one_row() {
        let (_dir, ctx) = test_context().await;
        let db = ctx.pool.acquire().await.unwrap();
        let context = ServerContext {
            worker_count: 4,
            queues: vec!["default".into()],
        };

        announce(&db, &ctx.tables, "server-1", &context).await.unwrap();
        announce(&db, &ctx.tables, "server-1", &context).await.unwrap();
        heartbeat(&db, &ctx.tables, "server-1").await.unwrap();
        assert_eq!(server_count(&db, &ctx.tables).await, 1);

        remove(&db, &ctx.tables, "server-1").await.unwrap();
        assert_eq!(server_count(&db, &ctx.tables).await, 0);
    }

    #[tokio::test]
    async fn silent_servers_are_removed() {
        let (_dir, ctx) = test_context().await;
        let db = ctx.pool.acquire().await.unwrap();
        announce(&db, &ctx.tables, "fresh", &ServerContext::default()).await.unwrap();
        let stale = format!(
            "INSERT INTO {} (id, data, last_heartbeat) VALUES ('stale', '{{}}', ?1)",
            ctx.tables.server
        );
        db.call(move |conn| conn.execute(&stale, params![now_millis() - 60_000]))
            .await
            .unwrap();

        let removed = remove_timed_out(&db, &ctx.tables, Duration::from_secs(30)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(server_count(&db, &ctx.tables).await, 1);
    }
}
