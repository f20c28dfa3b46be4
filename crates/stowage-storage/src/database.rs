// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single handle to the backing SQLite file.
//!
//! Each [`Database`] owns one `tokio-rusqlite` connection, and with it one
//! background thread on which every closure passed to [`Database::call`] runs.
//! Handles are pooled by [`ConnectionPool`](crate::pool::ConnectionPool);
//! concurrency across handles is arbitrated by SQLite's own file locking.

use std::time::Duration;

use rusqlite::ErrorCode;
use stowage_config::StorageConfig;
use stowage_core::StowageError;
use tracing::debug;

/// How many times a busy/locked failure is attempted in total.
pub const TRANSIENT_RETRY_ATTEMPTS: u32 = 3;

/// Fixed pause between two attempts of a transient failure.
pub const TRANSIENT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// PRAGMA settings applied to every handle on open.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub wal_mode: bool,
    pub busy_timeout: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            wal_mode: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&StorageConfig> for OpenOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            wal_mode: config.wal_mode,
            busy_timeout: config.busy_timeout(),
        }
    }
}

/// An open handle to the backing store.
///
/// Clones share the same underlying connection and thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Open (or create) the database at `path` with default PRAGMAs.
    pub async fn open(path: &str) -> Result<Self, StowageError> {
        Self::open_with(path, &OpenOptions::default()).await
    }

    /// Open (or create) the database at `path`.
    pub async fn open_with(path: &str, options: &OpenOptions) -> Result<Self, StowageError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| StowageError::Connection {
                source: Box::new(e),
            })?;

        let wal_mode = options.wal_mode;
        let busy_timeout = options.busy_timeout;
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(busy_timeout)?;
            if wal_mode {
                // Returns the resulting mode as a row.
                conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))?;
            }
            conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;")
        })
        .await
        .map_err(|e| StowageError::Connection {
            source: Box::new(e),
        })?;

        debug!(path, wal_mode, "database handle opened");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Run `function` on the handle's thread, keeping errors it reports as-is.
    pub async fn run<F, R>(&self, function: F) -> Result<R, StowageError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, StowageError> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok::<_, rusqlite::Error>(function(conn)))
            .await
            .map_err(map_tr_err)?
    }

    /// Run `function` on the handle's thread, classifying SQLite errors.
    pub async fn call<F, R>(&self, function: F) -> Result<R, StowageError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.run(move |conn| function(conn).map_err(map_sqlite_err))
            .await
    }

    /// Like [`call`](Self::call), but retries busy/locked failures
    /// [`TRANSIENT_RETRY_ATTEMPTS`] times with a fixed delay.
    pub async fn call_with_retry<F, R>(&self, function: F) -> Result<R, StowageError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<R> + Clone + Send + 'static,
        R: Send + 'static,
    {
        let mut attempt = 1;
        loop {
            match self.call(function.clone()).await {
                Err(err) if err.is_transient() && attempt < TRANSIENT_RETRY_ATTEMPTS => {
                    debug!(attempt, error = %err, "transient storage error, retrying");
                    attempt += 1;
                    tokio::time::sleep(TRANSIENT_RETRY_DELAY).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Close the handle, waiting for its background thread to finish.
    pub async fn close(self) -> Result<(), StowageError> {
        self.conn
            .close()
            .await
            .map_err(|e| StowageError::Storage {
                source: Box::new(e),
            })
    }
}

/// Convert tokio-rusqlite transport errors (closed handle) to StowageError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> StowageError {
    StowageError::Storage {
        source: Box::new(e),
    }
}

/// Classify a SQLite failure: busy/locked files are transient, the rest is not.
pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> StowageError {
    if is_busy(&e) {
        StowageError::Transient {
            source: Box::new(e),
        }
    } else {
        StowageError::Storage {
            source: Box::new(e),
        }
    }
}

/// Whether the database file was busy or locked by another handle.
pub(crate) fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Whether a statement was rejected by a UNIQUE (or other) constraint.
pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}
