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

//! Machinery shared by every task: query handles, readiness checks,
//! restarts, terminal transitions and callbacks.
//!
//! ## Generations
//! The restart counter doubles as a generation number. Every handle records
//! the counter at the time it was issued; a handle whose snapshot no longer
//! matches is stale and reported as needing a restart.
//!
//! ## Resuming paged reads
//! A handle remembers the paging state of the last page boundary it crossed
//! and how many rows it read since. A restart re-issues the read from that
//! paging state and skips the rows already read, so no row is delivered
//! twice.

use crate::config::TaskConfig;
use crate::error::{ContractError, ContractResult, RestartCause, TaskError};
use crate::records::FromRow;
use crate::retry::RetryPolicy;
use crate::state::TaskState;
use crate::statement::Statement;
use crate::task::{ErrorCallback, TaskBuilder, TaskId, TaskOptions};
use seqvault_driver::{
    Connection, Consistency, DataReadyCallback, DriverError, DriverResult, ExecuteOptions,
    PagingState, Query, RowState,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Index of a handle owned by a [`TaskCore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct HandleId(usize);

/// Where a paged read picks up after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResumePoint {
    pub state: Option<PagingState>,
    pub skip: usize,
}

/// Result of checking a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Readiness {
    Pending,
    Ready,
    NeedRestart(RestartCause),
    Failed(DriverError),
}

/// Result of pulling from a ready handle.
#[derive(Debug)]
pub(crate) enum Pull<R> {
    Row(R),
    /// Page boundary; the next page was requested
    Page,
    Eof,
}

struct QueryHandle {
    query: Box<dyn Query>,
    generation: u32,
    resume: Option<PagingState>,
    read_since_resume: usize,
    skip: usize,
    closed: bool,
}

impl QueryHandle {
    fn close(&mut self) {
        if !self.closed {
            self.query.close();
            self.closed = true;
        }
    }
}

/// State and machinery shared by all task kinds.
pub struct TaskCore {
    id: TaskId,
    kind: &'static str,
    connection: Arc<dyn Connection>,
    keyspace: String,
    table: String,
    state: TaskState,
    started: bool,
    restarts: u32,
    timeout: Duration,
    retry: RetryPolicy,
    consistency: Consistency,
    page_size: u32,
    data_ready: Option<DataReadyCallback>,
    on_error: Option<ErrorCallback>,
    handles: Vec<Option<QueryHandle>>,
    not_before: Option<Instant>,
    error: Option<TaskError>,
}

impl TaskCore {
    /// Core for a task of `kind` (used in logs and metrics) whose primary
    /// table is `table`. Returns the builder's kind-specific parameters.
    pub(crate) fn from_builder<P>(
        kind: &'static str,
        table: &str,
        builder: TaskBuilder<P>,
    ) -> (Self, P) {
        let TaskBuilder {
            connection,
            keyspace,
            params,
            options,
        } = builder;
        (Self::new(kind, table, connection, keyspace, options), params)
    }

    pub(crate) fn new(
        kind: &'static str,
        table: &str,
        connection: Arc<dyn Connection>,
        keyspace: String,
        options: TaskOptions,
    ) -> Self {
        Self {
            id: TaskId::new(),
            kind,
            connection,
            keyspace,
            table: table.to_string(),
            state: TaskState::Init,
            started: false,
            restarts: 0,
            timeout: options.timeout,
            retry: options.retry,
            consistency: options.consistency,
            page_size: options.page_size,
            data_ready: options.data_ready,
            on_error: options.on_error,
            handles: Vec::new(),
            not_before: None,
            error: None,
        }
    }

    /// Task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Task kind.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Restarts so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Keyspace.
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Primary table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Failure, once in `Error`.
    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    /// Whether the task issued anything yet.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub(crate) fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub(crate) fn data_ready(&self) -> Option<DataReadyCallback> {
        self.data_ready.clone()
    }

    pub(crate) fn options(&self) -> TaskOptions {
        let defaults = TaskConfig::default();
        TaskOptions {
            timeout: self.timeout,
            retry: self.retry,
            consistency: self.consistency,
            page_size: self.page_size,
            min_partitions_for_subrange_scan: defaults.min_partitions_for_subrange_scan,
            max_active_queries: defaults.max_active_queries.max(1),
            data_ready: self.data_ready.clone(),
            on_error: None,
        }
    }

    pub(crate) fn set_state(&mut self, state: TaskState) {
        self.state = state;
    }

    pub(crate) fn set_data_ready(&mut self, callback: DataReadyCallback) -> ContractResult<()> {
        if self.started || self.state != TaskState::Init {
            return Err(ContractError::DataReadyAfterStart { state: self.state });
        }
        self.data_ready = Some(callback);
        Ok(())
    }

    /// Whether a pending backoff delay has elapsed. Clears it once it has.
    pub(crate) fn may_start(&mut self) -> bool {
        match self.not_before {
            Some(at) if Instant::now() < at => false,
            _ => {
                self.not_before = None;
                true
            }
        }
    }

    pub(crate) fn wake_after(&self) -> Option<Duration> {
        if self.state != TaskState::Init {
            return None;
        }
        self.not_before
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn execute_options(&self, paged: bool, resume: Option<PagingState>) -> ExecuteOptions {
        let options = if paged && self.page_size > 0 {
            ExecuteOptions::paged(self.page_size)
        } else {
            ExecuteOptions::default()
        };
        options.with_timeout(self.timeout).resume_from(resume)
    }

    fn prepare(&self, statement: &Statement) -> DriverResult<Box<dyn Query>> {
        let mut query = self.connection.new_query();
        query.set_on_data_ready(self.data_ready.clone());
        query.set_sql(statement.sql(), statement.params().len());
        for (index, value) in statement.params().iter().enumerate() {
            query.bind(index, value.clone())?;
        }
        Ok(query)
    }

    fn push_handle(&mut self, query: Box<dyn Query>, resume: ResumePoint) -> HandleId {
        self.handles.push(Some(QueryHandle {
            query,
            generation: self.restarts,
            resume: resume.state,
            read_since_resume: 0,
            skip: resume.skip,
            closed: false,
        }));
        HandleId(self.handles.len() - 1)
    }

    /// Issue a statement. Paged reads resume from `resume`.
    pub(crate) fn issue(
        &mut self,
        statement: &Statement,
        paged: bool,
        resume: ResumePoint,
    ) -> DriverResult<HandleId> {
        self.started = true;
        let mut query = self.prepare(statement)?;
        debug!(
            task_id = %self.id,
            table = %self.table,
            restarts = self.restarts,
            statement = %statement,
            "issuing query"
        );
        let options = self.execute_options(paged, resume.state.clone());
        if let Err(err) = query.execute(self.consistency, options) {
            query.close();
            return Err(err);
        }
        Ok(self.push_handle(query, resume))
    }

    /// Issue statements as one atomic batch.
    pub(crate) fn issue_batch(&mut self, statements: &[Statement]) -> DriverResult<HandleId> {
        self.started = true;
        let mut query = self.connection.new_query();
        query.set_on_data_ready(self.data_ready.clone());
        let result = (|| -> DriverResult<()> {
            query.new_batch()?;
            for statement in statements {
                query.set_sql(statement.sql(), statement.params().len());
                for (index, value) in statement.params().iter().enumerate() {
                    query.bind(index, value.clone())?;
                }
                query.execute(self.consistency, ExecuteOptions::default())?;
            }
            debug!(
                task_id = %self.id,
                table = %self.table,
                restarts = self.restarts,
                statements = statements.len(),
                "issuing batch"
            );
            query.run_batch(self.consistency, self.execute_options(false, None))
        })();
        if let Err(err) = result {
            query.close();
            return Err(err);
        }
        Ok(self.push_handle(query, ResumePoint::default()))
    }

    /// Check whether a handle completed, and whether its result still
    /// belongs to the current generation.
    pub(crate) fn check_ready(&mut self, id: HandleId) -> Readiness {
        let restarts = self.restarts;
        let Some(handle) = self.handles.get_mut(id.0).and_then(Option::as_mut) else {
            return Readiness::Failed(DriverError::NotActive(format!("no query handle {}", id.0)));
        };
        if handle.generation != restarts {
            handle.close();
            return Readiness::NeedRestart(RestartCause::StaleCompletion);
        }
        match handle.query.is_ready() {
            Ok(true) => Readiness::Ready,
            Ok(false) => Readiness::Pending,
            Err(err) if err.is_retryable() => Readiness::NeedRestart(RestartCause::Driver(err)),
            Err(err) => Readiness::Failed(err),
        }
    }

    /// Read the next row of a ready handle, skipping rows delivered by an
    /// earlier attempt.
    pub(crate) fn pull<R: FromRow>(&mut self, id: HandleId) -> DriverResult<Pull<R>> {
        let handle = self
            .handles
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| DriverError::NotActive(format!("no query handle {}", id.0)))?;
        loop {
            match handle.query.next_row()? {
                RowState::Ready => {
                    handle.read_since_resume += 1;
                    if handle.skip > 0 {
                        handle.skip -= 1;
                        continue;
                    }
                    return Ok(Pull::Row(R::from_row(handle.query.as_ref())));
                }
                RowState::NotReady => {
                    if handle.read_since_resume > 0 {
                        handle.resume = handle.query.paging_state();
                        handle.read_since_resume = 0;
                    }
                    return Ok(Pull::Page);
                }
                RowState::Eof => return Ok(Pull::Eof),
            }
        }
    }

    /// Resume point of a handle, for re-issuing its read after a restart.
    pub(crate) fn resume_point(&self, id: HandleId) -> ResumePoint {
        self.handles
            .get(id.0)
            .and_then(Option::as_ref)
            .map(|h| ResumePoint {
                state: h.resume.clone(),
                skip: h.read_since_resume,
            })
            .unwrap_or_default()
    }

    /// Close one handle and free its query. The id is never reused.
    pub(crate) fn release(&mut self, id: HandleId) {
        if let Some(mut handle) = self.handles.get_mut(id.0).and_then(Option::take) {
            handle.close();
        }
    }

    /// Close every handle. Closed handles stay addressable so that a task
    /// still holding an old id sees a stale completion.
    pub(crate) fn close_all(&mut self) {
        for handle in self.handles.iter_mut().flatten() {
            handle.close();
        }
    }

    /// Drop all handles and go back to `Init`, or to `Error` once the retry
    /// budget is spent.
    pub(crate) fn restart(&mut self, cause: RestartCause) {
        self.close_all();
        self.restarts += 1;
        metrics::counter!("seqvault_task_restarts_total", "task" => self.kind).increment(1);

        if self.restarts > self.retry.max_retries {
            let err = TaskError::retries_exhausted(
                &cause,
                self.restarts,
                &format!("{}.{}", self.keyspace, self.table),
            );
            self.fail(err);
            return;
        }
        let delay = self.retry.delay_for(self.restarts);
        debug!(
            task_id = %self.id,
            table = %self.table,
            restarts = self.restarts,
            delay_ms = delay.as_millis() as u64,
            cause = %cause,
            "restarting task"
        );
        self.not_before = (!delay.is_zero()).then(|| Instant::now() + delay);
        self.state = TaskState::Init;
    }

    /// Route a driver error: restart when transient, fail otherwise.
    pub(crate) fn on_driver_error(&mut self, err: DriverError) {
        if err.is_retryable() {
            self.restart(RestartCause::Driver(err));
        } else {
            self.fail(TaskError::from_driver(&err));
        }
    }

    /// Terminal failure. Invokes the error callback once.
    pub(crate) fn fail(&mut self, err: TaskError) {
        if self.state.is_terminal() {
            return;
        }
        self.close_all();
        self.handles.clear();
        self.state = TaskState::Error;
        warn!(
            task_id = %self.id,
            table = %self.table,
            restarts = self.restarts,
            code = %err.code,
            status = err.status,
            "task failed: {}",
            err.message
        );
        metrics::counter!(
            "seqvault_task_errors_total",
            "task" => self.kind,
            "code" => err.code.as_str()
        )
        .increment(1);
        self.error = Some(err.clone());
        if let Some(callback) = self.on_error.take() {
            callback(err);
        }
    }

    /// Terminal success.
    pub(crate) fn finish(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.close_all();
        self.handles.clear();
        self.state = TaskState::Done;
        debug!(
            task_id = %self.id,
            table = %self.table,
            restarts = self.restarts,
            "task done"
        );
        metrics::counter!("seqvault_task_completed_total", "task" => self.kind).increment(1);
    }

    #[cfg(test)]
    pub(crate) fn bump_generation_for_test(&mut self) {
        self.restarts += 1;
    }
}

impl std::fmt::Debug for TaskCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCore")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("keyspace", &self.keyspace)
            .field("table", &self.table)
            .field("state", &self.state)
            .field("restarts", &self.restarts)
            .field("handles", &self.handles.iter().flatten().count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RawRow;
    use crate::task::TaskBuilder;
    use seqvault_driver::memory::{FaultRule, MemoryCluster, TableSchema};
    use seqvault_driver::Value;
    use std::sync::Mutex;

    fn cluster(rows: i32) -> MemoryCluster {
        let cluster = MemoryCluster::default();
        cluster
            .create_table(TableSchema::new("ks", "t").columns(&["pk", "v"]).partition_key(&["pk"]))
            .unwrap();
        for pk in 0..rows {
            cluster
                .insert_row("ks", "t", &[("pk", Value::Int32(pk)), ("v", Value::Int32(pk))])
                .unwrap();
        }
        cluster
    }

    fn core(cluster: &MemoryCluster, retries: u32) -> TaskCore {
        let builder = TaskBuilder::new(Arc::new(cluster.clone()), "ks", ())
            .retry(RetryPolicy::immediate(retries))
            .page_size(2);
        TaskCore::from_builder("test", "t", builder).0
    }

    #[test]
    fn test_stale_generation_needs_restart() {
        let cluster = cluster(1);
        let mut core = core(&cluster, 3);
        let handle = core
            .issue(&Statement::new("SELECT * FROM ks.t"), false, ResumePoint::default())
            .unwrap();
        assert_eq!(core.check_ready(handle), Readiness::Ready);
        core.bump_generation_for_test();
        assert_eq!(
            core.check_ready(handle),
            Readiness::NeedRestart(RestartCause::StaleCompletion)
        );
    }

    #[test]
    fn test_restart_budget() {
        let cluster = cluster(0);
        let mut core = core(&cluster, 2);
        core.restart(RestartCause::StaleCompletion);
        core.restart(RestartCause::StaleCompletion);
        assert_eq!(core.state(), TaskState::Init);
        core.restart(RestartCause::StaleCompletion);
        assert_eq!(core.state(), TaskState::Error);
        assert_eq!(core.restarts(), 3);
        assert_eq!(core.error().map(|e| e.status), Some(502));
    }

    #[test]
    fn test_error_callback_fires_once() {
        let cluster = cluster(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let builder = TaskBuilder::new(Arc::new(cluster), "ks", ())
            .on_error(move |err| sink.lock().unwrap().push(err.code));
        let (mut core, ()) = TaskCore::from_builder("test", "t", builder);
        core.fail(TaskError::from_driver(&DriverError::Backend("disk".into())));
        core.fail(TaskError::from_driver(&DriverError::Backend("again".into())));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_data_ready_only_before_start() {
        let cluster = cluster(1);
        let mut core = core(&cluster, 0);
        assert!(core.set_data_ready(Arc::new(|| {})).is_ok());
        core.issue(&Statement::new("SELECT * FROM ks.t"), false, ResumePoint::default())
            .unwrap();
        assert!(matches!(
            core.set_data_ready(Arc::new(|| {})),
            Err(ContractError::DataReadyAfterStart { .. })
        ));
    }

    #[test]
    fn test_resume_point_tracks_page_boundaries() {
        let cluster = cluster(5);
        let mut core = core(&cluster, 3);
        let handle = core
            .issue(&Statement::new("SELECT pk FROM ks.t"), true, ResumePoint::default())
            .unwrap();
        assert_eq!(core.check_ready(handle), Readiness::Ready);
        assert!(matches!(core.pull::<RawRow>(handle).unwrap(), Pull::Row(_)));
        assert_eq!(core.resume_point(handle).skip, 1);
        assert!(matches!(core.pull::<RawRow>(handle).unwrap(), Pull::Row(_)));
        assert!(matches!(core.pull::<RawRow>(handle).unwrap(), Pull::Page));
        let point = core.resume_point(handle);
        assert!(point.state.is_some());
        assert_eq!(point.skip, 0);
    }

    #[test]
    fn test_resumed_handle_skips_rows_already_read() {
        let cluster = cluster(3);
        let mut core = core(&cluster, 3);
        let resume = ResumePoint {
            state: None,
            skip: 2,
        };
        let handle = core
            .issue(&Statement::new("SELECT pk FROM ks.t"), false, resume)
            .unwrap();
        let mut rows = 0;
        while let Pull::Row(RawRow(_)) = core.pull::<RawRow>(handle).unwrap() {
            rows += 1;
        }
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_transient_failure_needs_restart() {
        let cluster = cluster(1);
        cluster.inject_fault(FaultRule::unavailable().times(1));
        let mut core = core(&cluster, 3);
        let handle = core
            .issue(&Statement::new("SELECT * FROM ks.t"), false, ResumePoint::default())
            .unwrap();
        assert!(matches!(
            core.check_ready(handle),
            Readiness::NeedRestart(RestartCause::Driver(DriverError::Unavailable(_)))
        ));
    }
}
