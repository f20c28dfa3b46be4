// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Stowage integration tests.
//!
//! Provides a temp-directory storage harness and a recording queue provider
//! for fast, deterministic, CI-runnable tests against real SQLite files.
//!
//! # Components
//!
//! - [`TestStorage`] - Initialized storage in a temp dir with short timings
//! - [`RecordingQueueProvider`] - SQLite queue provider that records enqueues

pub mod harness;
pub mod recording_queue;

pub use harness::{TestStorage, TestStorageBuilder};
pub use recording_queue::RecordingQueueProvider;
