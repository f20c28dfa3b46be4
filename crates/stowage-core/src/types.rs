// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common value types exchanged between the job-processing runtime and storage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database identifier of a job.
pub type JobId = i64;

/// Health status reported by storage health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Storage is fully operational.
    Healthy,
    /// Storage is operational but experiencing issues.
    Degraded(String),
    /// Storage is not operational.
    Unhealthy(String),
}

/// A job about to be created.
///
/// Both payload fields are opaque to storage; encoding the invocation is the
/// runtime's business.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewJob {
    pub invocation_data: String,
    pub arguments: String,
}

/// A stored job as read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobData {
    pub id: JobId,
    /// Name of the current state, `None` until the first state is set.
    pub state_name: Option<String>,
    pub invocation_data: String,
    pub arguments: String,
    pub created_at: DateTime<Utc>,
}

/// A state transition to record against a job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobState {
    pub name: String,
    pub reason: Option<String>,
    pub data: HashMap<String, String>,
}

impl JobState {
    /// A state with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attach a human readable reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach a data entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// The current state of a job as read back from the state history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateData {
    pub name: String,
    pub reason: Option<String>,
    pub data: HashMap<String, String>,
}

/// What a processing server announces about itself.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerContext {
    pub worker_count: u32,
    pub queues: Vec<String>,
}
