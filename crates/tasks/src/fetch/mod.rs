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

//! Paginated reads of one partition.
//!
//! A [`FetchTask`] issues one paged `SELECT`, drains every page into the
//! consume callback and signals the end with a single `is_last` call. What is
//! read is described by a [`FetchSpec`]; the stock variants are
//! [`FetchStatusHistory`], [`FetchSplitHistory`] and [`FetchBioseqInfo`].

mod bioseq_info;
mod split_history;
mod status_history;

pub use bioseq_info::{BioseqInfoQuery, FetchBioseqInfo};
pub use split_history::{FetchSplitHistory, SplitHistoryQuery};
pub use status_history::{FetchStatusHistory, StatusHistoryQuery};

use crate::error::{ContractError, ContractResult, RestartCause, TaskError};
use crate::machine::{HandleId, Pull, Readiness, ResumePoint, TaskCore};
use crate::records::FromRow;
use crate::state::{Progress, TaskState};
use crate::statement::Statement;
use crate::task::{ConsumeCallback, Task, TaskBuilder};
use seqvault_driver::Connection;
use std::sync::Arc;

/// What a [`FetchTask`] reads.
pub trait FetchSpec: Send + 'static {
    /// Row type delivered to the consumer.
    type Record: FromRow;

    /// Task kind, used in logs and metrics.
    const KIND: &'static str;

    /// Table read.
    const TABLE: &'static str;

    /// The statement, selecting `Record`'s columns in order.
    fn statement(&self, keyspace: &str) -> Statement;

    /// Client-side filter for conditions the store cannot evaluate.
    fn accept(&self, _record: &Self::Record) -> bool {
        true
    }
}

/// Paged read delivering `S::Record`s to a consume callback.
pub struct FetchTask<S: FetchSpec> {
    core: TaskCore,
    spec: S,
    consume: ConsumeCallback<S::Record>,
    handle: Option<HandleId>,
    resume: ResumePoint,
}

impl<S: FetchSpec> FetchTask<S> {
    /// Builder for reading what `spec` describes.
    pub fn with_spec(connection: Arc<dyn Connection>, keyspace: &str, spec: S) -> TaskBuilder<S> {
        TaskBuilder::new(connection, keyspace, spec)
    }

    /// Build a task from a builder carrying its [`FetchSpec`].
    pub fn new(
        builder: TaskBuilder<S>,
        consume: impl FnMut(S::Record, bool) -> bool + Send + 'static,
    ) -> Self {
        let (core, spec) = TaskCore::from_builder(S::KIND, S::TABLE, builder);
        Self {
            core,
            spec,
            consume: Box::new(consume),
            handle: None,
            resume: ResumePoint::default(),
        }
    }

    /// The read description.
    pub fn spec(&self) -> &S {
        &self.spec
    }

    fn start(&mut self) -> ContractResult<Progress> {
        if !self.core.may_start() {
            return Ok(Progress::Wait);
        }
        let statement = self.spec.statement(self.core.keyspace());
        match self.core.issue(&statement, true, self.resume.clone()) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.core.set_state(TaskState::FetchStarted);
            }
            Err(err) => self.core.on_driver_error(err),
        }
        Ok(Progress::Continue)
    }

    fn restart(&mut self, handle: HandleId, cause: RestartCause) {
        self.resume = self.core.resume_point(handle);
        self.handle = None;
        self.core.restart(cause);
    }

    fn drain(&mut self) -> ContractResult<Progress> {
        let Some(handle) = self.handle else {
            return Err(ContractError::UnexpectedState {
                state: self.core.state(),
            });
        };
        match self.core.check_ready(handle) {
            Readiness::Pending => return Ok(Progress::Wait),
            Readiness::Ready => {}
            Readiness::NeedRestart(cause) => {
                self.restart(handle, cause);
                return Ok(Progress::Continue);
            }
            Readiness::Failed(err) => {
                self.handle = None;
                self.core.fail(TaskError::from_driver(&err));
                return Ok(Progress::Continue);
            }
        }

        self.core.set_state(TaskState::WaitingForFetch);
        loop {
            match self.core.pull::<S::Record>(handle) {
                Ok(Pull::Row(record)) => {
                    if self.spec.accept(&record) && !(self.consume)(record, false) {
                        self.handle = None;
                        self.core.finish();
                        return Ok(Progress::Continue);
                    }
                }
                Ok(Pull::Page) => return Ok(Progress::Continue),
                Ok(Pull::Eof) => {
                    (self.consume)(S::Record::default(), true);
                    self.handle = None;
                    self.core.finish();
                    return Ok(Progress::Continue);
                }
                Err(err) if err.is_retryable() => {
                    self.restart(handle, RestartCause::Driver(err));
                    return Ok(Progress::Continue);
                }
                Err(err) => {
                    self.handle = None;
                    self.core.fail(TaskError::from_driver(&err));
                    return Ok(Progress::Continue);
                }
            }
        }
    }
}

impl<S: FetchSpec> Task for FetchTask<S> {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn step(&mut self) -> ContractResult<Progress> {
        match self.core.state() {
            TaskState::Init => self.start(),
            TaskState::FetchStarted | TaskState::WaitingForFetch => self.drain(),
            state => Err(ContractError::UnexpectedState { state }),
        }
    }
}

impl<S: FetchSpec + std::fmt::Debug> std::fmt::Debug for FetchTask<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchTask")
            .field("core", &self.core)
            .field("spec", &self.spec)
            .finish()
    }
}
