// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations, run through refinery.
//!
//! The table prefix is only known at runtime, so migrations are rendered from
//! templates and handed to refinery as unapplied migrations instead of being
//! embedded at compile time. The history table carries the prefix as well,
//! which lets several prefixed schemas share one database file.

use refinery::{Migration, Runner};
use stowage_core::StowageError;
use tracing::info;

use crate::models::{NEVER_EXPIRES, UNCLAIMED};
use crate::schema::Tables;

fn initial_schema(t: &Tables) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {job} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    state_id INTEGER NULL,
    state_name TEXT NULL,
    invocation_data TEXT NOT NULL,
    arguments TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expire_at INTEGER NOT NULL DEFAULT {never}
);
CREATE INDEX IF NOT EXISTS {ix_job_state} ON {job} (state_name);
CREATE INDEX IF NOT EXISTS {ix_job_expire} ON {job} (expire_at);

CREATE TABLE IF NOT EXISTS {job_parameter} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES {job} (id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    value TEXT NULL,
    UNIQUE (job_id, name)
);

CREATE TABLE IF NOT EXISTS {state} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES {job} (id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    reason TEXT NULL,
    created_at INTEGER NOT NULL,
    data TEXT NULL
);
CREATE INDEX IF NOT EXISTS {ix_state_job} ON {state} (job_id);

CREATE TABLE IF NOT EXISTS {job_queue} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL,
    queue TEXT NOT NULL,
    fetched_at INTEGER NOT NULL DEFAULT {unclaimed}
);
CREATE INDEX IF NOT EXISTS {ix_job_queue_fetch} ON {job_queue} (queue, fetched_at, id);

CREATE TABLE IF NOT EXISTS {lock} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    resource TEXT NOT NULL UNIQUE,
    resource_key TEXT NOT NULL,
    expire_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS {counter} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    value INTEGER NOT NULL,
    expire_at INTEGER NOT NULL DEFAULT {never}
);
CREATE INDEX IF NOT EXISTS {ix_counter_key} ON {counter} (key);

CREATE TABLE IF NOT EXISTS {aggregated_counter} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL UNIQUE,
    value INTEGER NOT NULL,
    expire_at INTEGER NOT NULL DEFAULT {never}
);

CREATE TABLE IF NOT EXISTS {set} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    score REAL NOT NULL DEFAULT 0,
    expire_at INTEGER NOT NULL DEFAULT {never},
    UNIQUE (key, value)
);
CREATE INDEX IF NOT EXISTS {ix_set_score} ON {set} (key, score);

CREATE TABLE IF NOT EXISTS {hash} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    field TEXT NOT NULL,
    value TEXT NULL,
    expire_at INTEGER NOT NULL DEFAULT {never},
    UNIQUE (key, field)
);

CREATE TABLE IF NOT EXISTS {list} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    value TEXT NULL,
    expire_at INTEGER NOT NULL DEFAULT {never}
);
CREATE INDEX IF NOT EXISTS {ix_list_key} ON {list} (key, id);

CREATE TABLE IF NOT EXISTS {server} (
    id TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    last_heartbeat INTEGER NOT NULL
);
"#,
        job = t.job,
        job_parameter = t.job_parameter,
        state = t.state,
        job_queue = t.job_queue,
        lock = t.lock,
        counter = t.counter,
        aggregated_counter = t.aggregated_counter,
        set = t.set,
        hash = t.hash,
        list = t.list,
        server = t.server,
        ix_job_state = t.index("job_state_name"),
        ix_job_expire = t.index("job_expire_at"),
        ix_state_job = t.index("state_job_id"),
        ix_job_queue_fetch = t.index("job_queue_fetch"),
        ix_counter_key = t.index("counter_key"),
        ix_set_score = t.index("set_score"),
        ix_list_key = t.index("list_key"),
        never = NEVER_EXPIRES,
        unclaimed = UNCLAIMED,
    )
}

/// Run all pending migrations against the given connection.
pub fn run_migrations(conn: &mut rusqlite::Connection, tables: &Tables) -> Result<(), StowageError> {
    let migration = Migration::unapplied("V1__initial_schema", &initial_schema(tables))
        .map_err(migration_err)?;
    let migrations = [migration];
    let mut runner = Runner::new(&migrations);
    runner.set_migration_table_name(tables.migration_history());

    let report = runner.run(conn).map_err(migration_err)?;
    info!(
        prefix = tables.prefix(),
        applied = report.applied_migrations().len(),
        "schema migrations complete"
    );
    Ok(())
}

fn migration_err(e: refinery::Error) -> StowageError {
    StowageError::Storage {
        source: e.to_string().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &rusqlite::Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn migrations_create_every_table() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let tables = Tables::new("").unwrap();
        run_migrations(&mut conn, &tables).unwrap();

        let names = table_names(&conn);
        for expected in [
            "job",
            "job_parameter",
            "state",
            "job_queue",
            "lock",
            "counter",
            "aggregated_counter",
            "set",
            "hash",
            "list",
            "server",
            "schema_history",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing table {expected}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let tables = Tables::new("").unwrap();
        run_migrations(&mut conn, &tables).unwrap();
        run_migrations(&mut conn, &tables).unwrap();
    }

    #[test]
    fn prefixed_schemas_coexist_in_one_file() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        run_migrations(&mut conn, &Tables::new("a_").unwrap()).unwrap();
        run_migrations(&mut conn, &Tables::new("b_").unwrap()).unwrap();

        let names = table_names(&conn);
        assert!(names.iter().any(|n| n == "a_job_queue"));
        assert!(names.iter().any(|n| n == "b_job_queue"));
        assert!(names.iter().any(|n| n == "a_schema_history"));
        assert!(names.iter().any(|n| n == "b_schema_history"));
    }
}
