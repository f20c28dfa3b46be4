// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row-level conventions shared by every query.
//!
//! Timestamps are stored as INTEGER Unix milliseconds. Two sentinels keep the
//! hot columns NOT NULL so they index cleanly.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// `fetched_at` of a queue entry nobody has claimed.
pub const UNCLAIMED: i64 = i64::MIN;

/// `expire_at` of a row without an expiry.
pub const NEVER_EXPIRES: i64 = i64::MAX;

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Absolute expiry `expire_in` from now.
pub fn expire_at(expire_in: Duration) -> i64 {
    now_millis().saturating_add(duration_millis(expire_in))
}

/// Remaining lifetime of a row, `None` when it never expires.
pub fn time_to_live(expire_at: Option<i64>) -> Option<Duration> {
    match expire_at {
        None | Some(NEVER_EXPIRES) => None,
        Some(at) => {
            let remaining = at.saturating_sub(now_millis()).max(0);
            Some(Duration::from_millis(remaining as u64))
        }
    }
}
