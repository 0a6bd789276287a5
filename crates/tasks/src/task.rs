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

//! The `Task` trait, task ids, callbacks and the common builder.

use crate::config::TaskConfig;
use crate::error::{ContractResult, TaskError};
use crate::machine::TaskCore;
use crate::retry::RetryPolicy;
use crate::state::{Progress, TaskState};
use seqvault_driver::{Connection, Consistency, DataReadyCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

/// Unique task identifier (ULID, sortable by creation time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Ulid);

impl TaskId {
    /// Fresh id.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-row consumer. Called with `(record, false)` for each row and once with
/// `(R::default(), true)` at the end. Returning `false` stops delivery.
pub type ConsumeCallback<R> = Box<dyn FnMut(R, bool) -> bool + Send>;

/// Error consumer, called at most once.
pub type ErrorCallback = Box<dyn FnOnce(TaskError) + Send>;

/// One storage operation driven to completion by repeated, non-blocking
/// calls to [`wait1`](Task::wait1).
///
/// Implementors supply [`step`](Task::step), a single transition of their
/// state machine, and expose their [`TaskCore`].
pub trait Task: Send {
    /// Shared state and machinery.
    fn core(&self) -> &TaskCore;

    /// Mutable access to the shared core.
    fn core_mut(&mut self) -> &mut TaskCore;

    /// Perform one transition. Never blocks.
    fn step(&mut self) -> ContractResult<Progress>;

    /// Advance the task as far as possible without blocking and return the
    /// resulting state. A no-op on terminal tasks.
    fn wait1(&mut self) -> ContractResult<TaskState> {
        loop {
            let state = self.core().state();
            if state.is_terminal() {
                return Ok(state);
            }
            if self.step()? == Progress::Wait {
                return Ok(self.core().state());
            }
        }
    }

    /// Current state.
    fn state(&self) -> TaskState {
        self.core().state()
    }

    /// Task id.
    fn id(&self) -> TaskId {
        self.core().id()
    }

    /// Restarts so far.
    fn restart_count(&self) -> u32 {
        self.core().restarts()
    }

    /// Failure, once the task reached `Error`.
    fn error(&self) -> Option<&TaskError> {
        self.core().error()
    }

    /// Install the wake-up callback. Only allowed before the first step.
    fn set_data_ready_cb(&mut self, callback: DataReadyCallback) -> ContractResult<()> {
        self.core_mut().set_data_ready(callback)
    }

    /// Time until a pending backoff delay elapses, if the task is waiting on
    /// one rather than on the store.
    fn wake_after(&self) -> Option<Duration> {
        self.core().wake_after()
    }
}

/// Settings shared by every task kind.
pub(crate) struct TaskOptions {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub consistency: Consistency,
    pub page_size: u32,
    pub min_partitions_for_subrange_scan: i64,
    pub max_active_queries: usize,
    pub data_ready: Option<DataReadyCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl TaskOptions {
    fn from_config(config: &TaskConfig) -> Self {
        Self {
            timeout: config.query_timeout(),
            retry: config.retry_policy(),
            consistency: config.consistency,
            page_size: config.page_size,
            min_partitions_for_subrange_scan: config.min_partitions_for_subrange_scan,
            max_active_queries: config.max_active_queries.max(1),
            data_ready: None,
            on_error: None,
        }
    }
}

/// Builder for a task of kind `P`. Common settings live here; kind-specific
/// keys and filters are set through methods on the concrete builder type.
pub struct TaskBuilder<P> {
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) keyspace: String,
    pub(crate) params: P,
    pub(crate) options: TaskOptions,
}

impl<P> TaskBuilder<P> {
    pub(crate) fn new(connection: Arc<dyn Connection>, keyspace: &str, params: P) -> Self {
        Self {
            connection,
            keyspace: keyspace.to_string(),
            params,
            options: TaskOptions::from_config(&TaskConfig::default()),
        }
    }

    /// Apply every setting from `config`: timeout, retry policy, consistency,
    /// page size and the fullscan split threshold and concurrency. Settings
    /// made earlier on this builder are replaced; callbacks are kept. The
    /// keyspace is the one the builder was created with.
    pub fn config(mut self, config: &TaskConfig) -> Self {
        let TaskOptions {
            data_ready,
            on_error,
            ..
        } = self.options;
        self.options = TaskOptions {
            data_ready,
            on_error,
            ..TaskOptions::from_config(config)
        };
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Restart budget and backoff.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.options.retry = policy;
        self
    }

    /// Restart budget, keeping the backoff settings.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.options.retry.max_retries = max_retries;
        self
    }

    /// Consistency level.
    pub fn consistency(mut self, consistency: Consistency) -> Self {
        self.options.consistency = consistency;
        self
    }

    /// Rows per page for paged reads.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.options.page_size = page_size;
        self
    }

    /// Wake-up callback, invoked whenever the task may make progress.
    pub fn on_data_ready(mut self, callback: DataReadyCallback) -> Self {
        self.options.data_ready = Some(callback);
        self
    }

    /// Error consumer.
    pub fn on_error(mut self, callback: impl FnOnce(TaskError) + Send + 'static) -> Self {
        self.options.on_error = Some(Box::new(callback));
        self
    }
}
