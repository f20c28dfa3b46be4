// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions the job-processing runtime programs against.
//!
//! Every trait uses `#[async_trait]` so storage backends can be handed around
//! as trait objects.

pub mod connection;
pub mod lock;
pub mod queue;
pub mod storage;
pub mod transaction;

pub use connection::StorageConnection;
pub use lock::DistributedLock;
pub use queue::FetchedJob;
pub use storage::JobStorage;
pub use transaction::WriteOnlyTransaction;
