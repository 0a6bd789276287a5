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

use super::insert_statement;
use crate::error::{ContractError, ContractResult, TaskError};
use crate::machine::{HandleId, Readiness, TaskCore};
use crate::schema::{BLOB_CHUNK, BLOB_CHUNK_COLUMNS};
use crate::state::{Progress, TaskState};
use crate::statement::Statement;
use crate::task::{Task, TaskBuilder};
use seqvault_driver::{Connection, Value};
use std::sync::Arc;

/// Payload of a [`BlobChunksInsertTask`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobChunks {
    /// Blob key
    pub sat_key: i32,
    /// Blob version
    pub last_modified: i64,
    /// Chunk payloads; chunk `i` is stored as `chunk_no = i`
    pub chunks: Vec<Vec<u8>>,
}

impl BlobChunks {
    fn statements(&self, keyspace: &str) -> Vec<Statement> {
        self.chunks
            .iter()
            .enumerate()
            .map(|(chunk_no, data)| {
                insert_statement(
                    keyspace,
                    BLOB_CHUNK,
                    BLOB_CHUNK_COLUMNS,
                    vec![
                        Value::Int32(self.sat_key),
                        Value::Int64(self.last_modified),
                        Value::Int32(i32::try_from(chunk_no).unwrap_or(i32::MAX)),
                        Value::Blob(data.clone()),
                    ],
                )
            })
            .collect()
    }
}

/// Writes every chunk of a blob, all inserts in flight at once. A restart
/// re-issues every chunk; the writes are idempotent upserts.
pub struct BlobChunksInsertTask {
    core: TaskCore,
    payload: BlobChunks,
    pending: Vec<HandleId>,
}

impl BlobChunksInsertTask {
    pub(crate) const KIND: &'static str = "insert_blob_chunks";

    /// Builder for writing `chunks` of blob `(sat_key, last_modified)`.
    pub fn builder(
        connection: Arc<dyn Connection>,
        keyspace: &str,
        sat_key: i32,
        last_modified: i64,
        chunks: Vec<Vec<u8>>,
    ) -> TaskBuilder<BlobChunks> {
        TaskBuilder::new(
            connection,
            keyspace,
            BlobChunks {
                sat_key,
                last_modified,
                chunks,
            },
        )
    }

    pub(crate) fn with_core(core: TaskCore, payload: BlobChunks) -> Self {
        Self {
            core,
            payload,
            pending: Vec::new(),
        }
    }

    /// Number of chunks written.
    pub fn chunk_count(&self) -> usize {
        self.payload.chunks.len()
    }

    fn start(&mut self) -> ContractResult<Progress> {
        if !self.core.may_start() {
            return Ok(Progress::Wait);
        }
        if self.payload.chunks.is_empty() {
            self.core.finish();
            return Ok(Progress::Continue);
        }
        for statement in self.payload.statements(self.core.keyspace()) {
            match self.core.issue(&statement, false, Default::default()) {
                Ok(handle) => self.pending.push(handle),
                Err(err) => {
                    self.pending.clear();
                    self.core.on_driver_error(err);
                    return Ok(Progress::Continue);
                }
            }
        }
        self.core.set_state(TaskState::InsertStarted);
        Ok(Progress::Continue)
    }

    fn collect(&mut self) -> ContractResult<Progress> {
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for handle in std::mem::take(&mut self.pending) {
            match self.core.check_ready(handle) {
                Readiness::Pending => still_pending.push(handle),
                Readiness::Ready => self.core.release(handle),
                Readiness::NeedRestart(cause) => {
                    self.core.restart(cause);
                    return Ok(Progress::Continue);
                }
                Readiness::Failed(err) => {
                    self.core.fail(TaskError::from_driver(&err));
                    return Ok(Progress::Continue);
                }
            }
        }
        if still_pending.is_empty() {
            self.core.finish();
            return Ok(Progress::Continue);
        }
        self.pending = still_pending;
        self.core.set_state(TaskState::WaitingInserted);
        Ok(Progress::Wait)
    }
}

impl Task for BlobChunksInsertTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn step(&mut self) -> ContractResult<Progress> {
        match self.core.state() {
            TaskState::Init => self.start(),
            TaskState::InsertStarted | TaskState::WaitingInserted => self.collect(),
            state => Err(ContractError::UnexpectedState { state }),
        }
    }
}

impl TaskBuilder<BlobChunks> {
    /// Finish building.
    pub fn build(self) -> BlobChunksInsertTask {
        let (core, payload) =
            TaskCore::from_builder(BlobChunksInsertTask::KIND, BLOB_CHUNK, self);
        BlobChunksInsertTask::with_core(core, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_tables;
    use seqvault_driver::memory::{FaultRule, MemoryCluster, StatementKind};

    fn cluster() -> MemoryCluster {
        let cluster = MemoryCluster::default();
        create_tables(&cluster, "ks").unwrap();
        cluster
    }

    #[test]
    fn test_writes_every_chunk() {
        let cluster = cluster();
        let chunks = vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec()];
        let mut task =
            BlobChunksInsertTask::builder(Arc::new(cluster.clone()), "ks", 1, 100, chunks).build();
        assert_eq!(task.wait1().unwrap(), TaskState::Done);
        assert_eq!(cluster.row_count("ks", BLOB_CHUNK).unwrap(), 3);
    }

    #[test]
    fn test_no_chunks_is_done() {
        let cluster = cluster();
        let mut task =
            BlobChunksInsertTask::builder(Arc::new(cluster.clone()), "ks", 1, 100, Vec::new())
                .build();
        assert_eq!(task.wait1().unwrap(), TaskState::Done);
        assert!(cluster.statements().is_empty());
    }

    #[test]
    fn test_restart_reissues_all_chunks() {
        let cluster = cluster();
        cluster.inject_fault(
            FaultRule::timeout()
                .on_table(BLOB_CHUNK)
                .on(StatementKind::Insert)
                .times(1),
        );
        let chunks = vec![b"ab".to_vec(), b"cd".to_vec()];
        let mut task =
            BlobChunksInsertTask::builder(Arc::new(cluster.clone()), "ks", 1, 100, chunks).build();
        assert_eq!(task.wait1().unwrap(), TaskState::Done);
        assert_eq!(task.restart_count(), 1);
        let inserts = cluster
            .statements()
            .iter()
            .filter(|s| s.kind == StatementKind::Insert)
            .count();
        assert_eq!(inserts, 4);
        assert_eq!(cluster.row_count("ks", BLOB_CHUNK).unwrap(), 2);
    }
}
