// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Buffered write-only transaction.
//!
//! Every mutation becomes a closure over owned parameters; `commit` runs them
//! in order on one pooled handle. Commands are applied without an enclosing
//! SQLite transaction, so a failure leaves the earlier commands applied.
//!
//! Each command is a single statement or a run of upserts, so a command
//! rejected by a busy file applied nothing harmful and is retried in place.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use stowage_core::{ensure_not_empty, JobId, JobState, StowageError, WriteOnlyTransaction};
use tracing::{debug, trace, warn};

use crate::context::StorageContext;
use crate::database::{is_busy, TRANSIENT_RETRY_ATTEMPTS, TRANSIENT_RETRY_DELAY};
use crate::models::{expire_at, now_millis, NEVER_EXPIRES};
use crate::queries::hashes::upsert_sql;
use crate::queue::QueueProviderRegistry;
use crate::schema::Tables;

type Command = Box<dyn Fn(&rusqlite::Connection) -> rusqlite::Result<()> + Send>;

pub struct SqliteWriteOnlyTransaction {
    ctx: Arc<StorageContext>,
    providers: Arc<QueueProviderRegistry>,
    commands: Vec<Command>,
    committed: bool,
}

impl SqliteWriteOnlyTransaction {
    pub fn new(ctx: Arc<StorageContext>, providers: Arc<QueueProviderRegistry>) -> Self {
        Self {
            ctx,
            providers,
            commands: Vec::new(),
            committed: false,
        }
    }

    fn tables(&self) -> &Tables {
        &self.ctx.tables
    }

    fn push(&mut self, command: Command) -> Result<(), StowageError> {
        if self.committed {
            return Err(StowageError::AlreadyCommitted);
        }
        self.commands.push(command);
        Ok(())
    }

    /// Buffer one statement with owned parameters.
    fn execute(&mut self, sql: String, values: Vec<Value>) -> Result<(), StowageError> {
        self.push(Box::new(move |conn| {
            conn.execute(&sql, params_from_iter(values.iter()))?;
            Ok(())
        }))
    }

    fn append_counter(
        &mut self,
        key: &str,
        delta: i64,
        expire_in: Option<Duration>,
    ) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        let sql = format!(
            "INSERT INTO {} (key, value, expire_at) VALUES (?1, ?2, ?3)",
            self.tables().counter
        );
        let expiry = expire_in.map_or(NEVER_EXPIRES, expire_at);
        self.execute(
            sql,
            vec![Value::Text(key.to_string()), Value::Integer(delta), Value::Integer(expiry)],
        )
    }

    fn set_key_expiry(
        &mut self,
        table: &str,
        key: &str,
        expiry: i64,
    ) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        let sql = format!("UPDATE {table} SET expire_at = ?1 WHERE key = ?2");
        self.execute(sql, vec![Value::Integer(expiry), Value::Text(key.to_string())])
    }

    fn insert_state(&mut self, job_id: JobId, state: &JobState, make_current: bool) -> Result<(), StowageError> {
        ensure_not_empty("state name", &state.name)?;
        let data = serde_json::to_string(&state.data)?;
        let insert = format!(
            "INSERT INTO {} (job_id, name, reason, created_at, data) VALUES (?1, ?2, ?3, ?4, ?5)",
            self.tables().state
        );
        let created_at = now_millis();
        self.execute(
            insert,
            vec![
                Value::Integer(job_id),
                Value::Text(state.name.clone()),
                state.reason.clone().map_or(Value::Null, Value::Text),
                Value::Integer(created_at),
                Value::Text(data),
            ],
        )?;
        if make_current {
            // Runs right after the insert on the same handle.
            let update = format!(
                "UPDATE {} SET state_id = last_insert_rowid(), state_name = ?1 WHERE id = ?2",
                self.tables().job
            );
            self.execute(update, vec![Value::Text(state.name.clone()), Value::Integer(job_id)])?;
        }
        Ok(())
    }
}

#[async_trait]
impl WriteOnlyTransaction for SqliteWriteOnlyTransaction {
    fn expire_job(&mut self, job_id: JobId, expire_in: Duration) -> Result<(), StowageError> {
        let sql = format!("UPDATE {} SET expire_at = ?1 WHERE id = ?2", self.tables().job);
        self.execute(sql, vec![Value::Integer(expire_at(expire_in)), Value::Integer(job_id)])
    }

    fn persist_job(&mut self, job_id: JobId) -> Result<(), StowageError> {
        let sql = format!("UPDATE {} SET expire_at = ?1 WHERE id = ?2", self.tables().job);
        self.execute(sql, vec![Value::Integer(NEVER_EXPIRES), Value::Integer(job_id)])
    }

    fn set_job_state(&mut self, job_id: JobId, state: &JobState) -> Result<(), StowageError> {
        self.insert_state(job_id, state, true)
    }

    fn add_job_state(&mut self, job_id: JobId, state: &JobState) -> Result<(), StowageError> {
        self.insert_state(job_id, state, false)
    }

    fn add_to_queue(&mut self, queue: &str, job_id: JobId) -> Result<(), StowageError> {
        ensure_not_empty("queue", queue)?;
        let job_queue = self.providers.resolve(queue).job_queue(&self.ctx);
        let queue = queue.to_string();
        self.push(Box::new(move |conn| job_queue.enqueue(conn, &queue, job_id)))
    }

    fn increment_counter(&mut self, key: &str) -> Result<(), StowageError> {
        self.append_counter(key, 1, None)
    }

    fn increment_counter_with_expiry(
        &mut self,
        key: &str,
        expire_in: Duration,
    ) -> Result<(), StowageError> {
        self.append_counter(key, 1, Some(expire_in))
    }

    fn decrement_counter(&mut self, key: &str) -> Result<(), StowageError> {
        self.append_counter(key, -1, None)
    }

    fn decrement_counter_with_expiry(
        &mut self,
        key: &str,
        expire_in: Duration,
    ) -> Result<(), StowageError> {
        self.append_counter(key, -1, Some(expire_in))
    }

    fn add_to_set(&mut self, key: &str, value: &str) -> Result<(), StowageError> {
        self.add_to_set_with_score(key, value, 0.0)
    }

    fn add_to_set_with_score(
        &mut self,
        key: &str,
        value: &str,
        score: f64,
    ) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        let sql = format!(
            "INSERT INTO {} (key, value, score, expire_at) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT (key, value) DO UPDATE SET score = excluded.score",
            self.tables().set
        );
        self.execute(
            sql,
            vec![
                Value::Text(key.to_string()),
                Value::Text(value.to_string()),
                Value::Real(score),
                Value::Integer(NEVER_EXPIRES),
            ],
        )
    }

    fn add_range_to_set(&mut self, key: &str, values: &[String]) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        let sql = format!(
            "INSERT INTO {} (key, value, score, expire_at) VALUES (?1, ?2, 0.0, ?3) \
             ON CONFLICT (key, value) DO UPDATE SET score = excluded.score",
            self.tables().set
        );
        let key = key.to_string();
        let values = values.to_vec();
        self.push(Box::new(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            for value in &values {
                stmt.execute(params![key, value, NEVER_EXPIRES])?;
            }
            Ok(())
        }))
    }

    fn remove_from_set(&mut self, key: &str, value: &str) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        let sql = format!("DELETE FROM {} WHERE key = ?1 AND value = ?2", self.tables().set);
        self.execute(sql, vec![Value::Text(key.to_string()), Value::Text(value.to_string())])
    }

    fn remove_set(&mut self, key: &str) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        let sql = format!("DELETE FROM {} WHERE key = ?1", self.tables().set);
        self.execute(sql, vec![Value::Text(key.to_string())])
    }

    fn insert_to_list(&mut self, key: &str, value: &str) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        let sql = format!(
            "INSERT INTO {} (key, value, expire_at) VALUES (?1, ?2, ?3)",
            self.tables().list
        );
        self.execute(
            sql,
            vec![
                Value::Text(key.to_string()),
                Value::Text(value.to_string()),
                Value::Integer(NEVER_EXPIRES),
            ],
        )
    }

    fn remove_from_list(&mut self, key: &str, value: &str) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        let sql = format!("DELETE FROM {} WHERE key = ?1 AND value = ?2", self.tables().list);
        self.execute(sql, vec![Value::Text(key.to_string()), Value::Text(value.to_string())])
    }

    fn trim_list(
        &mut self,
        key: &str,
        keep_starting_from: i64,
        keep_ending_at: i64,
    ) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        // Positions count from the newest entry; an inverted range keeps nothing.
        let sql = format!(
            "DELETE FROM {list} WHERE key = ?1 AND id NOT IN ( \
                SELECT id FROM ( \
                    SELECT id, ROW_NUMBER() OVER (ORDER BY id DESC) - 1 AS position \
                    FROM {list} WHERE key = ?1 \
                ) WHERE position BETWEEN ?2 AND ?3 \
             )",
            list = self.tables().list
        );
        self.execute(
            sql,
            vec![
                Value::Text(key.to_string()),
                Value::Integer(keep_starting_from),
                Value::Integer(keep_ending_at),
            ],
        )
    }

    fn set_range_in_hash(
        &mut self,
        key: &str,
        pairs: &[(String, String)],
    ) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        for (field, _) in pairs {
            ensure_not_empty("field", field)?;
        }
        let sql = upsert_sql(self.tables());
        let key = key.to_string();
        let pairs = pairs.to_vec();
        self.push(Box::new(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            for (field, value) in &pairs {
                stmt.execute(params![key, field, value, NEVER_EXPIRES])?;
            }
            Ok(())
        }))
    }

    fn remove_hash(&mut self, key: &str) -> Result<(), StowageError> {
        ensure_not_empty("key", key)?;
        let sql = format!("DELETE FROM {} WHERE key = ?1", self.tables().hash);
        self.execute(sql, vec![Value::Text(key.to_string())])
    }

    fn expire_set(&mut self, key: &str, expire_in: Duration) -> Result<(), StowageError> {
        let table = self.tables().set.clone();
        self.set_key_expiry(&table, key, expire_at(expire_in))
    }

    fn expire_list(&mut self, key: &str, expire_in: Duration) -> Result<(), StowageError> {
        let table = self.tables().list.clone();
        self.set_key_expiry(&table, key, expire_at(expire_in))
    }

    fn expire_hash(&mut self, key: &str, expire_in: Duration) -> Result<(), StowageError> {
        let table = self.tables().hash.clone();
        self.set_key_expiry(&table, key, expire_at(expire_in))
    }

    fn persist_set(&mut self, key: &str) -> Result<(), StowageError> {
        let table = self.tables().set.clone();
        self.set_key_expiry(&table, key, NEVER_EXPIRES)
    }

    fn persist_list(&mut self, key: &str) -> Result<(), StowageError> {
        let table = self.tables().list.clone();
        self.set_key_expiry(&table, key, NEVER_EXPIRES)
    }

    fn persist_hash(&mut self, key: &str) -> Result<(), StowageError> {
        let table = self.tables().hash.clone();
        self.set_key_expiry(&table, key, NEVER_EXPIRES)
    }

    fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    async fn commit(&mut self) -> Result<(), StowageError> {
        if self.committed {
            return Err(StowageError::AlreadyCommitted);
        }
        self.committed = true;

        let commands = std::mem::take(&mut self.commands);
        if commands.is_empty() {
            trace!("empty write transaction, nothing to commit");
            return Ok(());
        }

        let count = commands.len();
        let db = self.ctx.pool.acquire().await?;
        db.call(move |conn| {
            for command in &commands {
                apply_with_retry(conn, command)?;
            }
            Ok(())
        })
        .await?;
        debug!(commands = count, "write transaction committed");
        Ok(())
    }
}

/// Run one command, retrying it while the database file is busy.
fn apply_with_retry(conn: &rusqlite::Connection, command: &Command) -> rusqlite::Result<()> {
    let mut attempt = 1;
    loop {
        match command(conn) {
            Err(e) if is_busy(&e) && attempt < TRANSIENT_RETRY_ATTEMPTS => {
                warn!(attempt, error = %e, "write command hit a busy database, retrying");
                attempt += 1;
                // Blocks only the handle's own background thread.
                std::thread::sleep(TRANSIENT_RETRY_DELAY);
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries;
    use crate::testing::test_context;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use stowage_core::NewJob;

    async fn transaction() -> (tempfile::TempDir, Arc<StorageContext>, SqliteWriteOnlyTransaction) {
        let (dir, ctx) = test_context().await;
        let ctx = Arc::new(ctx);
        let tx = SqliteWriteOnlyTransaction::new(Arc::clone(&ctx), Arc::new(QueueProviderRegistry::default()));
        (dir, ctx, tx)
    }

    async fn list(ctx: &StorageContext, key: &str) -> Vec<String> {
        let db = ctx.pool.acquire().await.unwrap();
        queries::lists::get_all_items(&db, &ctx.tables, key).await.unwrap()
    }

    #[tokio::test]
    async fn buffering_does_not_touch_storage() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.increment_counter("stats:succeeded").unwrap();
        assert_eq!(tx.pending_commands(), 1);

        let db = ctx.pool.acquire().await.unwrap();
        assert_eq!(queries::counters::get_counter(&db, &ctx.tables, "stats:succeeded").await.unwrap(), 0);

        tx.commit().await.unwrap();
        assert_eq!(queries::counters::get_counter(&db, &ctx.tables, "stats:succeeded").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn counter_increments_accumulate() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.increment_counter("c").unwrap();
        tx.increment_counter("c").unwrap();
        tx.increment_counter_with_expiry("c", Duration::from_secs(60)).unwrap();
        tx.decrement_counter("c").unwrap();
        tx.commit().await.unwrap();

        let db = ctx.pool.acquire().await.unwrap();
        assert_eq!(queries::counters::get_counter(&db, &ctx.tables, "c").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn second_commit_is_rejected() {
        let (_dir, _ctx, mut tx) = transaction().await;
        tx.increment_counter("c").unwrap();
        tx.commit().await.unwrap();

        assert!(matches!(tx.commit().await, Err(StowageError::AlreadyCommitted)));
        assert!(matches!(tx.increment_counter("c"), Err(StowageError::AlreadyCommitted)));
    }

    #[tokio::test]
    async fn empty_commit_succeeds_once() {
        let (_dir, _ctx, mut tx) = transaction().await;
        tx.commit().await.unwrap();
        assert!(matches!(tx.commit().await, Err(StowageError::AlreadyCommitted)));
    }

    #[tokio::test]
    async fn add_to_set_is_an_upsert() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.add_to_set_with_score("schedule", "job:1", 5.0).unwrap();
        tx.add_to_set_with_score("schedule", "job:1", 1.0).unwrap();
        tx.add_range_to_set("schedule", &["job:2".to_string(), "job:1".to_string()]).unwrap();
        tx.commit().await.unwrap();

        let db = ctx.pool.acquire().await.unwrap();
        assert_eq!(queries::sets::get_count(&db, &ctx.tables, "schedule").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn upsert_replaces_the_score() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.add_to_set_with_score("s", "a", 5.0).unwrap();
        tx.add_to_set_with_score("s", "b", 3.0).unwrap();
        tx.add_to_set_with_score("s", "a", 1.0).unwrap();
        tx.commit().await.unwrap();

        let db = ctx.pool.acquire().await.unwrap();
        let lowest = queries::sets::get_first_by_lowest_score(&db, &ctx.tables, "s", 0.0, 10.0)
            .await
            .unwrap();
        assert_eq!(lowest.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn remove_from_set_and_remove_set() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.add_to_set("a", "1").unwrap();
        tx.add_to_set("a", "2").unwrap();
        tx.add_to_set("b", "1").unwrap();
        tx.remove_from_set("a", "1").unwrap();
        tx.remove_set("b").unwrap();
        tx.commit().await.unwrap();

        let db = ctx.pool.acquire().await.unwrap();
        let a = queries::sets::get_all_items(&db, &ctx.tables, "a").await.unwrap();
        assert_eq!(a.into_iter().collect::<Vec<_>>(), vec!["2".to_string()]);
        assert_eq!(queries::sets::get_count(&db, &ctx.tables, "b").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn trim_list_keeps_the_requested_window() {
        let (_dir, ctx, mut tx) = transaction().await;
        for value in ["0", "1", "2", "3", "4"] {
            tx.insert_to_list("log", value).unwrap();
        }
        // Newest first: 4 3 2 1 0 -> keep positions 1..=2.
        tx.trim_list("log", 1, 2).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(list(&ctx, "log").await, vec!["3", "2"]);
    }

    #[tokio::test]
    async fn trim_list_with_inverted_range_clears_the_list() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.insert_to_list("log", "a").unwrap();
        tx.insert_to_list("log", "b").unwrap();
        tx.trim_list("log", 1, 0).unwrap();
        tx.commit().await.unwrap();

        assert!(list(&ctx, "log").await.is_empty());
    }

    #[tokio::test]
    async fn trim_list_past_the_end_keeps_everything_in_range() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.insert_to_list("log", "a").unwrap();
        tx.insert_to_list("log", "b").unwrap();
        tx.trim_list("log", 0, 10).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(list(&ctx, "log").await, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn trim_list_leaves_other_keys_alone() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.insert_to_list("log", "a").unwrap();
        tx.insert_to_list("other", "x").unwrap();
        tx.insert_to_list("log", "b").unwrap();
        tx.trim_list("log", 0, 0).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(list(&ctx, "log").await, vec!["b"]);
        assert_eq!(list(&ctx, "other").await, vec!["x"]);
    }

    #[tokio::test]
    async fn remove_from_list_removes_every_copy() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.insert_to_list("log", "dup").unwrap();
        tx.insert_to_list("log", "keep").unwrap();
        tx.insert_to_list("log", "dup").unwrap();
        tx.remove_from_list("log", "dup").unwrap();
        tx.commit().await.unwrap();

        assert_eq!(list(&ctx, "log").await, vec!["keep"]);
    }

    #[tokio::test]
    async fn set_job_state_becomes_current() {
        let (_dir, ctx, mut tx) = transaction().await;
        let db = ctx.pool.acquire().await.unwrap();
        let job_id = queries::jobs::create_expired_job(
            &db,
            &ctx.tables,
            &NewJob::default(),
            &HashMap::new(),
            chrono::Utc::now(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        tx.add_job_state(job_id, &JobState::named("Processing")).unwrap();
        tx.set_job_state(job_id, &JobState::named("Enqueued").with_reason("retry").with_data("Queue", "critical"))
            .unwrap();
        tx.add_job_state(job_id, &JobState::named("Ignored")).unwrap();
        tx.persist_job(job_id).unwrap();
        tx.commit().await.unwrap();

        let data = queries::jobs::get_job_data(&db, &ctx.tables, job_id).await.unwrap().unwrap();
        assert_eq!(data.state_name.as_deref(), Some("Enqueued"));

        let state = queries::jobs::get_state_data(&db, &ctx.tables, job_id).await.unwrap().unwrap();
        assert_eq!(state.name, "Enqueued");
        assert_eq!(state.reason.as_deref(), Some("retry"));
        assert_eq!(state.data.get("Queue").map(String::as_str), Some("critical"));
    }

    #[tokio::test]
    async fn hash_and_expiry_commands() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.set_range_in_hash("h", &[("a".to_string(), "1".to_string())]).unwrap();
        tx.expire_hash("h", Duration::from_secs(60)).unwrap();
        tx.insert_to_list("l", "x").unwrap();
        tx.expire_list("l", Duration::from_secs(60)).unwrap();
        tx.persist_list("l").unwrap();
        tx.commit().await.unwrap();

        let db = ctx.pool.acquire().await.unwrap();
        assert!(queries::hashes::get_ttl(&db, &ctx.tables, "h").await.unwrap().is_some());
        assert_eq!(queries::lists::get_ttl(&db, &ctx.tables, "l").await.unwrap(), None);

        let mut tx = SqliteWriteOnlyTransaction::new(Arc::clone(&ctx), Arc::new(QueueProviderRegistry::default()));
        tx.remove_hash("h").unwrap();
        tx.commit().await.unwrap();
        assert_eq!(queries::hashes::get_all_entries(&db, &ctx.tables, "h").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failing_command_keeps_earlier_ones_applied() {
        let (_dir, ctx, mut tx) = transaction().await;
        tx.increment_counter("c").unwrap();
        tx.push(Box::new(|conn| {
            conn.execute("INSERT INTO missing_table VALUES (1)", [])?;
            Ok(())
        }))
        .unwrap();
        tx.increment_counter("c").unwrap();

        assert!(tx.commit().await.is_err());
        let db = ctx.pool.acquire().await.unwrap();
        assert_eq!(queries::counters::get_counter(&db, &ctx.tables, "c").await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn commit_waits_out_a_briefly_locked_database() {
        use crate::database::{Database, OpenOptions};
        use crate::testing::test_context_with_options;
        use stowage_config::QueueConfig;

        let options = OpenOptions {
            wal_mode: true,
            busy_timeout: Duration::ZERO,
        };
        let (dir, ctx) = test_context_with_options(QueueConfig::default(), options.clone()).await;
        let ctx = Arc::new(ctx);
        let path = dir.path().join("test.db");
        let holder = Database::open_with(path.to_str().unwrap(), &options).await.unwrap();
        holder.call(|conn| conn.execute_batch("BEGIN IMMEDIATE;")).await.unwrap();

        let unlock = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            holder.call(|conn| conn.execute_batch("COMMIT;")).await.unwrap();
        });

        let mut tx = SqliteWriteOnlyTransaction::new(Arc::clone(&ctx), Arc::new(QueueProviderRegistry::default()));
        tx.increment_counter("stats:succeeded").unwrap();
        tx.commit().await.unwrap();
        unlock.await.unwrap();

        let db = ctx.pool.acquire().await.unwrap();
        assert_eq!(queries::counters::get_counter(&db, &ctx.tables, "stats:succeeded").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn set_job_state_points_the_job_at_the_newest_state() {
        let (_dir, ctx, mut tx) = transaction().await;
        let db = ctx.pool.acquire().await.unwrap();
        let job_id = queries::jobs::create_expired_job(
            &db,
            &ctx.tables,
            &NewJob::default(),
            &HashMap::new(),
            chrono::Utc::now(),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        tx.set_job_state(job_id, &JobState::named("Enqueued")).unwrap();
        tx.add_job_state(job_id, &JobState::named("Processing")).unwrap();
        tx.set_job_state(job_id, &JobState::named("Succeeded")).unwrap();
        tx.commit().await.unwrap();

        let state = queries::jobs::get_state_data(&db, &ctx.tables, job_id).await.unwrap().unwrap();
        assert_eq!(state.name, "Succeeded");
    }

    #[tokio::test]
    async fn empty_key_is_rejected_while_buffering() {
        let (_dir, _ctx, mut tx) = transaction().await;
        assert!(matches!(tx.increment_counter(""), Err(StowageError::Argument { .. })));
        assert!(matches!(tx.add_to_queue("", 1), Err(StowageError::Argument { .. })));
        assert_eq!(tx.pending_commands(), 0);
    }

    fn expected_window(len: i64, start: i64, end: i64) -> Vec<String> {
        // Newest first, i.e. values len-1 down to 0.
        (0..len)
            .rev()
            .enumerate()
            .filter(|(position, _)| (*position as i64) >= start && (*position as i64) <= end)
            .map(|(_, value)| value.to_string())
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn trim_list_matches_positional_window(len in 0i64..8, start in 0i64..9, end in -1i64..9) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let kept = rt.block_on(async {
                let (_dir, ctx, mut tx) = transaction().await;
                for value in 0..len {
                    tx.insert_to_list("log", &value.to_string()).unwrap();
                }
                tx.trim_list("log", start, end).unwrap();
                tx.commit().await.unwrap();
                list(&ctx, "log").await
            });
            prop_assert_eq!(kept, expected_window(len, start, end));
        }
    }
}
