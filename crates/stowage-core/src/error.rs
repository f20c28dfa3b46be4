// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Stowage job storage engine.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Stowage traits and storage operations.
#[derive(Debug, Error)]
pub enum StowageError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// A required identifier was empty or a range was inverted.
    ///
    /// Raised before any storage I/O happens.
    #[error("invalid argument `{name}`: {message}")]
    Argument { name: &'static str, message: String },

    /// The backing store could not be opened.
    #[error("connection error: {source}")]
    Connection {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Storage backend errors (query failure, constraint violation, closed handle).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A busy or locked database file. Retried a fixed number of times before
    /// it reaches the caller.
    #[error("transient storage error: {source}")]
    Transient {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The pool or storage facade has been shut down.
    #[error("{resource} has been disposed")]
    Disposed { resource: &'static str },

    /// A distributed lock could not be acquired within the caller's timeout.
    #[error("timed out after {timeout:?} waiting for distributed lock on `{resource}`")]
    LockTimeout { resource: String, timeout: Duration },

    /// A blocking wait observed its cancellation token.
    #[error("operation was cancelled")]
    Cancelled,

    /// `commit` was called on a transaction that has already been committed.
    #[error("transaction has already been committed")]
    AlreadyCommitted,

    /// A dequeue spans queues that resolve to different queue providers.
    #[error("queues [{queues}] are served by more than one queue provider")]
    ProviderConflict { queues: String },

    /// State or server payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StowageError {
    /// Shorthand for an [`StowageError::Argument`] error.
    pub fn argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::Argument {
            name,
            message: message.into(),
        }
    }

    /// Whether this error is worth retrying after a short delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Fail with an argument error when `value` is empty or whitespace.
pub fn ensure_not_empty(name: &'static str, value: &str) -> Result<(), StowageError> {
    if value.trim().is_empty() {
        return Err(StowageError::argument(name, "must not be empty"));
    }
    Ok(())
}
