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

use super::plan::{ScanPlan, ScanQuery};
use crate::error::{ContractError, ContractResult, RestartCause, TaskError};
use crate::machine::{HandleId, Pull, Readiness, ResumePoint, TaskCore};
use crate::records::{FromRow, RawRow};
use crate::state::{Progress, TaskState};
use crate::task::{ConsumeCallback, Task, TaskBuilder};
use seqvault_driver::{Connection, DriverError};
use std::sync::Arc;

/// Plan executed by a [`FullscanTask`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRun {
    plan: ScanPlan,
}

struct Active {
    query: ScanQuery,
    handle: HandleId,
}

/// Executes a [`ScanPlan`]: several range queries in flight, every row sent
/// to one consumer, one `is_last` call after the last range.
///
/// A restart re-issues the ranges that were in flight from where they
/// stopped. Finished ranges are not read again.
pub struct FullscanTask<R: FromRow> {
    core: TaskCore,
    pending: Vec<(ScanQuery, ResumePoint)>,
    active: Vec<Active>,
    max_active_queries: usize,
    completed: usize,
    consume: ConsumeCallback<R>,
}

impl FullscanTask<RawRow> {
    /// Builder for executing `plan`. The row type is chosen by `build`.
    pub fn builder(
        connection: Arc<dyn Connection>,
        keyspace: &str,
        plan: ScanPlan,
    ) -> TaskBuilder<ScanRun> {
        TaskBuilder::new(
            connection,
            keyspace,
            ScanRun { plan },
        )
    }
}

impl<R: FromRow> FullscanTask<R> {
    const KIND: &'static str = "fullscan";

    /// Ranges read to the end so far.
    pub fn completed_ranges(&self) -> usize {
        self.completed
    }

    /// Ranges not yet finished, in flight or queued.
    pub fn remaining_ranges(&self) -> usize {
        self.pending.len() + self.active.len()
    }

    fn restart(&mut self, cause: RestartCause) {
        for active in std::mem::take(&mut self.active) {
            let resume = self.core.resume_point(active.handle);
            self.pending.push((active.query, resume));
        }
        self.core.restart(cause);
    }

    fn on_driver_error(&mut self, err: DriverError) {
        if err.is_retryable() {
            self.restart(RestartCause::Driver(err));
        } else {
            self.active.clear();
            self.core.fail(TaskError::from_driver(&err));
        }
    }

    fn finish(&mut self, deliver_last: bool) {
        if deliver_last {
            (self.consume)(R::default(), true);
        }
        self.active.clear();
        self.pending.clear();
        self.core.finish();
    }

    /// Issue queued ranges until the limit is reached. `false` when an issue
    /// failed and the task restarted or failed.
    fn fill(&mut self) -> bool {
        while self.active.len() < self.max_active_queries {
            let Some((query, resume)) = self.pending.pop() else {
                break;
            };
            match self.core.issue(&query.statement, true, resume.clone()) {
                Ok(handle) => self.active.push(Active { query, handle }),
                Err(err) => {
                    self.pending.push((query, resume));
                    self.on_driver_error(err);
                    return false;
                }
            }
        }
        true
    }

    fn start(&mut self) -> ContractResult<Progress> {
        if !self.core.may_start() {
            return Ok(Progress::Wait);
        }
        if self.pending.is_empty() {
            self.finish(true);
            return Ok(Progress::Continue);
        }
        if self.fill() {
            self.core.set_state(TaskState::FetchStarted);
        }
        Ok(Progress::Continue)
    }

    fn pump(&mut self) -> ContractResult<Progress> {
        let mut progressed = false;
        let mut i = 0;
        while i < self.active.len() {
            let handle = self.active[i].handle;
            match self.core.check_ready(handle) {
                Readiness::Pending => {
                    i += 1;
                    continue;
                }
                Readiness::Ready => {}
                Readiness::NeedRestart(cause) => {
                    self.restart(cause);
                    return Ok(Progress::Continue);
                }
                Readiness::Failed(err) => {
                    self.active.clear();
                    self.core.fail(TaskError::from_driver(&err));
                    return Ok(Progress::Continue);
                }
            }
            loop {
                match self.core.pull::<R>(handle) {
                    Ok(Pull::Row(record)) => {
                        if !(self.consume)(record, false) {
                            self.finish(false);
                            return Ok(Progress::Continue);
                        }
                    }
                    Ok(Pull::Page) => {
                        progressed = true;
                        i += 1;
                        break;
                    }
                    Ok(Pull::Eof) => {
                        self.core.release(handle);
                        self.active.swap_remove(i);
                        self.completed += 1;
                        progressed = true;
                        if !self.fill() {
                            return Ok(Progress::Continue);
                        }
                        break;
                    }
                    Err(err) => {
                        self.on_driver_error(err);
                        return Ok(Progress::Continue);
                    }
                }
            }
        }

        if self.active.is_empty() && self.pending.is_empty() {
            self.finish(true);
            return Ok(Progress::Continue);
        }
        self.core.set_state(TaskState::WaitingForFetch);
        Ok(if progressed {
            Progress::Continue
        } else {
            Progress::Wait
        })
    }
}

impl<R: FromRow> Task for FullscanTask<R> {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn step(&mut self) -> ContractResult<Progress> {
        match self.core.state() {
            TaskState::Init => self.start(),
            TaskState::FetchStarted | TaskState::WaitingForFetch => self.pump(),
            state => Err(ContractError::UnexpectedState { state }),
        }
    }
}

impl TaskBuilder<ScanRun> {
    /// Range queries kept in flight at once. At least one.
    pub fn max_active_queries(mut self, max: usize) -> Self {
        self.options.max_active_queries = max.max(1);
        self
    }

    /// Finish with the consume callback. Rows are read as `R`, so the plan's
    /// columns must be `R`'s columns in order.
    pub fn build<R: FromRow>(
        self,
        consume: impl FnMut(R, bool) -> bool + Send + 'static,
    ) -> FullscanTask<R> {
        let table = self.params.plan.table().to_string();
        let max_active_queries = self.options.max_active_queries.max(1);
        let (core, run) = TaskCore::from_builder(FullscanTask::<R>::KIND, &table, self);
        let ScanRun { mut plan } = run;
        let mut pending = Vec::with_capacity(plan.len());
        while let Some(query) = plan.pop() {
            pending.push((query, ResumePoint::default()));
        }
        pending.reverse();
        FullscanTask {
            core,
            pending,
            active: Vec::new(),
            max_active_queries,
            completed: 0,
            consume: Box::new(consume),
        }
    }
}
