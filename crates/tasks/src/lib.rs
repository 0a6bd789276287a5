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

//! # SeqVault Tasks
//!
//! ## Purpose
//! Restartable, non-blocking storage operations over a Cassandra-style
//! store. Each operation is a [`Task`]: a state machine advanced by
//! [`Task::wait1`], which never blocks and returns the state reached.
//!
//! ## Key Components
//!
//! - [`fetch`]: paged partition reads ([`FetchStatusHistory`],
//!   [`FetchSplitHistory`], [`FetchBioseqInfo`])
//! - [`insert`]: blob writes with chunk payload and change-log entry
//!   ([`InsertBlobTask`], [`BlobChunksInsertTask`])
//! - [`fullscan`]: size estimation, token-range planning and concurrent
//!   range scans ([`FullscanPlanner`], [`FullscanTask`])
//! - [`runtime`]: blocking and async drivers
//! - [`executor`]: poller thread with a completion queue
//!
//! ## Failure Handling
//! Transient driver failures (timeouts, unavailability) and stale
//! completions restart the task from `Init`, resuming paged reads where they
//! stopped. After `max_retries` restarts the task fails with a
//! [`TaskError`]. Misuse of the API returns a [`ContractError`] instead.
//!
//! ## Examples
//! ```rust
//! use seqvault_driver::memory::MemoryCluster;
//! use seqvault_tasks::{drive_blocking, schema, FetchStatusHistory, TaskState};
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cluster = MemoryCluster::default();
//! schema::create_tables(&cluster, "ks")?;
//!
//! let rows = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&rows);
//! let mut task = FetchStatusHistory::builder(Arc::new(cluster), "ks", 42)
//!     .max_retries(2)
//!     .build(move |record, is_last| {
//!         if !is_last {
//!             sink.lock().unwrap().push(record);
//!         }
//!         true
//!     });
//! assert_eq!(drive_blocking(&mut task, Duration::from_secs(1))?, TaskState::Done);
//! assert!(rows.lock().unwrap().is_empty());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod fullscan;
pub mod insert;
pub mod machine;
pub mod records;
pub mod retry;
pub mod runtime;
pub mod schema;
pub mod state;
pub mod statement;
pub mod task;

pub use config::TaskConfig;
pub use error::{
    ConfigError, ContractError, ContractResult, DriveError, ErrorCode, RestartCause, Severity,
    TaskError,
};
pub use executor::{Completion, ExecutorConfig, ExecutorError, TaskExecutor};
pub use fetch::{FetchBioseqInfo, FetchSpec, FetchSplitHistory, FetchStatusHistory, FetchTask};
pub use fullscan::{
    FullscanPlanTask, FullscanPlanner, FullscanTask, ScanFilter, ScanPlan, ScanQuery,
};
pub use insert::{BlobChunksInsertTask, InsertBlobTask};
pub use machine::TaskCore;
pub use records::{
    BioseqInfoRecord, BlobRecord, ChangeLogOp, ChangeLogRecord, FromRow, RawRow,
    SplitHistoryRecord, StatusHistoryRecord,
};
pub use retry::RetryPolicy;
pub use runtime::{drive, drive_blocking};
pub use state::{Progress, TaskState};
pub use statement::Statement;
pub use task::{ConsumeCallback, ErrorCallback, Task, TaskBuilder, TaskId};
