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

//! Writes with a dependent write.
//!
//! [`InsertBlobTask`] stores a blob: the chunk payloads first (through an
//! embedded [`BlobChunksInsertTask`]), then the properties together with a
//! change-log entry as one atomic batch.

mod blob_chunks;

pub use blob_chunks::{BlobChunks, BlobChunksInsertTask};

use crate::error::{ContractError, ContractResult, ErrorCode, Severity, TaskError};
use crate::machine::{HandleId, Readiness, TaskCore};
use crate::records::{column_list, BlobRecord, ChangeLogOp, ChangeLogRecord};
use crate::schema::{BLOB_CHUNK, BLOB_PROP, BLOB_PROP_CHANGE_LOG};
use crate::state::{Progress, TaskState};
use crate::statement::Statement;
use crate::task::{Task, TaskBuilder};
use seqvault_driver::{Connection, Value};
use std::sync::Arc;
use std::time::Duration;

/// `INSERT INTO keyspace.table (columns) VALUES (?, ...)` bound to `values`.
pub(crate) fn insert_statement(
    keyspace: &str,
    table: &str,
    columns: &[&str],
    values: Vec<Value>,
) -> Statement {
    let placeholders = vec!["?"; columns.len()].join(", ");
    let mut statement = Statement::new(format!(
        "INSERT INTO {keyspace}.{table} ({}) VALUES ({placeholders})",
        column_list(columns)
    ));
    for value in values {
        statement.push(value);
    }
    statement
}

/// Stores a blob's payload, properties and change-log entry.
pub struct InsertBlobTask {
    core: TaskCore,
    blob: BlobRecord,
    chunks: Vec<Vec<u8>>,
    payload: Option<BlobChunksInsertTask>,
    payload_written: bool,
    handle: Option<HandleId>,
}

impl InsertBlobTask {
    const KIND: &'static str = "insert_blob";

    /// Builder for storing `blob`. Chunks attached to it are written first.
    pub fn builder(
        connection: Arc<dyn Connection>,
        keyspace: &str,
        blob: BlobRecord,
    ) -> TaskBuilder<BlobRecord> {
        TaskBuilder::new(connection, keyspace, blob)
    }

    /// Whether the chunk payload is stored.
    pub fn payload_written(&self) -> bool {
        self.payload_written
    }

    fn batch(&self) -> Vec<Statement> {
        let keyspace = self.core.keyspace();
        let change = ChangeLogRecord {
            updated_time: ChangeLogRecord::minute_bucket(chrono::Utc::now().timestamp_millis()),
            sat_key: self.blob.sat_key,
            last_modified: self.blob.last_modified,
            op: ChangeLogOp::Update,
        };
        vec![
            insert_statement(keyspace, BLOB_PROP, BlobRecord::COLUMNS, self.blob.prop_values()),
            insert_statement(
                keyspace,
                BLOB_PROP_CHANGE_LOG,
                ChangeLogRecord::COLUMNS,
                change.values(),
            ),
        ]
    }

    fn start(&mut self) -> ContractResult<Progress> {
        if !self.core.may_start() {
            return Ok(Progress::Wait);
        }
        if !self.payload_written && !self.chunks.is_empty() {
            let core = TaskCore::new(
                BlobChunksInsertTask::KIND,
                BLOB_CHUNK,
                Arc::clone(self.core.connection()),
                self.core.keyspace().to_string(),
                self.core.options(),
            );
            let payload = BlobChunks {
                sat_key: self.blob.sat_key,
                last_modified: self.blob.last_modified,
                chunks: std::mem::take(&mut self.chunks),
            };
            self.payload = Some(BlobChunksInsertTask::with_core(core, payload));
            self.core.set_state(TaskState::InsertingPayload);
            return Ok(Progress::Continue);
        }
        match self.core.issue_batch(&self.batch()) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.core.set_state(TaskState::InsertStarted);
            }
            Err(err) => self.core.on_driver_error(err),
        }
        Ok(Progress::Continue)
    }

    fn drive_payload(&mut self) -> ContractResult<Progress> {
        let Some(payload) = self.payload.as_mut() else {
            return Err(ContractError::UnexpectedState {
                state: self.core.state(),
            });
        };
        match payload.wait1()? {
            TaskState::Done => {
                self.payload = None;
                self.payload_written = true;
                self.core.set_state(TaskState::Init);
                Ok(Progress::Continue)
            }
            TaskState::Error => {
                let err = payload.error().cloned().unwrap_or_else(|| {
                    TaskError::new(
                        502,
                        ErrorCode::Backend,
                        Severity::Error,
                        "blob chunk write failed",
                    )
                });
                self.payload = None;
                self.core.fail(err);
                Ok(Progress::Continue)
            }
            _ => Ok(Progress::Wait),
        }
    }

    fn collect(&mut self) -> ContractResult<Progress> {
        let Some(handle) = self.handle else {
            return Err(ContractError::UnexpectedState {
                state: self.core.state(),
            });
        };
        match self.core.check_ready(handle) {
            Readiness::Pending => {
                self.core.set_state(TaskState::WaitingInserted);
                return Ok(Progress::Wait);
            }
            Readiness::Ready => self.core.finish(),
            Readiness::NeedRestart(cause) => self.core.restart(cause),
            Readiness::Failed(err) => self.core.fail(TaskError::from_driver(&err)),
        }
        self.handle = None;
        Ok(Progress::Continue)
    }
}

impl Task for InsertBlobTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn step(&mut self) -> ContractResult<Progress> {
        match self.core.state() {
            TaskState::Init => self.start(),
            TaskState::InsertingPayload => self.drive_payload(),
            TaskState::InsertStarted | TaskState::WaitingInserted => self.collect(),
            state => Err(ContractError::UnexpectedState { state }),
        }
    }

    fn wake_after(&self) -> Option<Duration> {
        match &self.payload {
            Some(payload) => payload.wake_after(),
            None => self.core.wake_after(),
        }
    }
}

impl TaskBuilder<BlobRecord> {
    /// Finish building.
    pub fn build(self) -> InsertBlobTask {
        let (core, mut blob) = TaskCore::from_builder(InsertBlobTask::KIND, BLOB_PROP, self);
        let chunks = std::mem::take(&mut blob.chunks);
        if !chunks.is_empty() {
            blob.n_chunks = i32::try_from(chunks.len()).unwrap_or(i32::MAX);
        }
        InsertBlobTask {
            core,
            blob,
            chunks,
            payload: None,
            payload_written: false,
            handle: None,
        }
    }
}
