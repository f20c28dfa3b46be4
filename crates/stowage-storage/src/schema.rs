// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table names with the configured prefix applied.

use stowage_core::StowageError;

/// Quoted, prefixed identifiers for every table the engine owns.
///
/// Queries interpolate these with `format!`; only the prefix is
/// user-supplied, and it is restricted to `[A-Za-z0-9_]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    prefix: String,
    pub job: String,
    pub job_parameter: String,
    pub state: String,
    pub job_queue: String,
    pub lock: String,
    pub counter: String,
    pub aggregated_counter: String,
    pub set: String,
    pub hash: String,
    pub list: String,
    pub server: String,
}

impl Tables {
    pub fn new(prefix: &str) -> Result<Self, StowageError> {
        if !prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StowageError::argument(
                "table_prefix",
                format!("`{prefix}` may only contain ASCII letters, digits and `_`"),
            ));
        }

        let quoted = |name: &str| format!("\"{prefix}{name}\"");
        Ok(Self {
            prefix: prefix.to_string(),
            job: quoted("job"),
            job_parameter: quoted("job_parameter"),
            state: quoted("state"),
            job_queue: quoted("job_queue"),
            lock: quoted("lock"),
            counter: quoted("counter"),
            aggregated_counter: quoted("aggregated_counter"),
            set: quoted("set"),
            hash: quoted("hash"),
            list: quoted("list"),
            server: quoted("server"),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Quoted index name, prefixed like the tables.
    pub fn index(&self, name: &str) -> String {
        format!("\"{}ix_{name}\"", self.prefix)
    }

    /// Unquoted name of refinery's bookkeeping table.
    pub fn migration_history(&self) -> String {
        format!("{}schema_history", self.prefix)
    }
}
