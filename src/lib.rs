// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of SeqVault.
//
// SeqVault is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// SeqVault is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with SeqVault. If not, see <https://www.gnu.org/licenses/>.

//! # SeqVault
//!
//! Restartable, non-blocking storage tasks over a Cassandra-style store,
//! built for genomic blob and sequence annotation records.
//!
//! The workspace is split into independent crates, re-exported here:
//! - [`queue`]: fixed-capacity lock-free MPMC ring buffer
//! - [`driver`]: connection and paged-query abstraction with an in-memory
//!   cluster for tests and examples
//! - [`tasks`]: fetch, insert and fullscan task state machines, plus the
//!   blocking, async and executor runtimes
//! - [`common`]: environment helpers and tracing setup
//!
//! ## Examples
//! ```rust
//! use seqvault::testing::{Fixture, SAMPLE_SAT_KEYS};
//! use seqvault::{drive_blocking, FetchStatusHistory, TaskState};
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fixture = Fixture::new()?;
//! let seen = Arc::new(Mutex::new(0));
//! let counter = Arc::clone(&seen);
//! let mut task = FetchStatusHistory::builder(
//!     fixture.connection(),
//!     fixture.keyspace(),
//!     SAMPLE_SAT_KEYS[0],
//! )
//! .config(fixture.task_config())
//! .build(move |_, is_last| {
//!     if !is_last {
//!         *counter.lock().unwrap() += 1;
//!     }
//!     true
//! });
//! assert_eq!(drive_blocking(&mut task, Duration::from_secs(1))?, TaskState::Done);
//! assert_eq!(*seen.lock().unwrap(), 3);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub use seqvault_common as common;
pub use seqvault_driver as driver;
pub use seqvault_queue as queue;
pub use seqvault_tasks as tasks;

// Seeded cluster for examples and end-to-end tests
pub mod testing;

pub use driver::memory::MemoryCluster;
pub use driver::{Connection, Consistency, DriverConfig, DriverError, Value};
pub use queue::{BoundedQueue, PushError};
pub use tasks::{
    drive, drive_blocking, BioseqInfoRecord, BlobChunksInsertTask, BlobRecord, Completion,
    ContractError, DriveError, ErrorCode, ExecutorConfig, FetchBioseqInfo, FetchSpec,
    FetchSplitHistory, FetchStatusHistory, FetchTask, FullscanPlanner, FullscanTask,
    InsertBlobTask, RetryPolicy, ScanFilter, ScanPlan, SplitHistoryRecord, StatusHistoryRecord,
    Task, TaskConfig, TaskError, TaskExecutor, TaskState,
};
