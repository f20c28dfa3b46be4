// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Stowage job storage engine.
//!
//! This crate provides the backend-agnostic contracts used throughout the
//! Stowage workspace: the error taxonomy, value types exchanged with the job
//! runtime, and the storage traits every backend implements.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ensure_not_empty, StowageError};
pub use types::{HealthStatus, JobData, JobId, JobState, NewJob, ServerContext, StateData};

pub use traits::{
    DistributedLock, FetchedJob, JobStorage, StorageConnection, WriteOnlyTransaction,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stowage_error_has_all_variants() {
        let _config = StowageError::Config("test".into());
        let _argument = StowageError::argument("key", "must not be empty");
        let _connection = StowageError::Connection {
            source: Box::new(std::io::Error::other("test")),
        };
        let _storage = StowageError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _transient = StowageError::Transient {
            source: Box::new(std::io::Error::other("busy")),
        };
        let _disposed = StowageError::Disposed {
            resource: "connection pool",
        };
        let _timeout = StowageError::LockTimeout {
            resource: "job:recurring".into(),
            timeout: std::time::Duration::from_secs(5),
        };
        let _cancelled = StowageError::Cancelled;
        let _committed = StowageError::AlreadyCommitted;
        let _conflict = StowageError::ProviderConflict {
            queues: "critical, default".into(),
        };
        let _internal = StowageError::Internal("test".into());
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        let transient = StowageError::Transient {
            source: Box::new(std::io::Error::other("database is locked")),
        };
        assert!(transient.is_transient());
        assert!(!StowageError::Cancelled.is_transient());
        assert!(!StowageError::Storage {
            source: Box::new(std::io::Error::other("syntax error")),
        }
        .is_transient());
    }

    #[test]
    fn lock_timeout_names_the_resource() {
        let err = StowageError::LockTimeout {
            resource: "job:recurring".into(),
            timeout: std::time::Duration::from_secs(5),
        };
        assert!(err.to_string().contains("job:recurring"));
    }

    #[test]
    fn ensure_not_empty_rejects_blank_identifiers() {
        assert!(ensure_not_empty("key", "counter:a").is_ok());
        let err = ensure_not_empty("key", "  ").unwrap_err();
        assert!(matches!(err, StowageError::Argument { name: "key", .. }));
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_job_storage<T: JobStorage>() {}
        fn _assert_connection<T: StorageConnection>() {}
        fn _assert_transaction<T: WriteOnlyTransaction>() {}
        fn _assert_fetched_job<T: FetchedJob>() {}
        fn _assert_lock<T: DistributedLock>() {}
    }
}
