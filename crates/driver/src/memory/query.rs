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

//! `Query` implementation for the in-memory cluster.
//!
//! Every execution carries a generation number. Completions scheduled on a
//! background thread (simulated latency, hung requests) are dropped when the
//! generation moved on, so a closed or re-executed query never observes a
//! stale result.

use super::cql::{self, Insert, Select, Statement};
use super::faults::{FaultKind, StatementKind};
use super::ClusterInner;
use crate::{
    Consistency, DataReadyCallback, DriverError, DriverResult, ExecuteOptions, PagingState, Query,
    RowState, Value,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    Idle,
    Pending,
    Ready,
    Failed(DriverError),
    Closed,
}

struct Exec {
    generation: u64,
    phase: Phase,
    rows: Vec<Vec<Value>>,
    page_size: usize,
    page_start: usize,
    page_end: usize,
    cursor: usize,
    eof: bool,
    timeout: Duration,
    callback: Option<DataReadyCallback>,
}

impl Exec {
    fn seal_page(&mut self) {
        let len = self.rows.len();
        self.page_start = self.page_start.min(len);
        self.page_end = if self.page_size == 0 {
            len
        } else {
            (self.page_start + self.page_size).min(len)
        };
        self.cursor = self.page_start;
    }
}

struct BatchEntry {
    sql: String,
    insert: Insert,
    params: Vec<Option<Value>>,
}

enum Work {
    Select {
        select: Select,
        params: Vec<Option<Value>>,
        offset: usize,
    },
    Write(Vec<(Insert, Vec<Option<Value>>)>),
    NextPage,
}

enum Outcome {
    Run(Work),
    Fail(DriverError),
    Hang,
}

impl Outcome {
    fn new(fault: Option<FaultKind>, work: Work, timeout: Duration) -> Self {
        match fault {
            None => Outcome::Run(work),
            Some(FaultKind::Timeout) => Outcome::Fail(DriverError::Timeout(timeout)),
            Some(FaultKind::Unavailable) => Outcome::Fail(DriverError::Unavailable(
                "Cannot achieve consistency level".to_string(),
            )),
            Some(FaultKind::Backend(message)) => Outcome::Fail(DriverError::Backend(message)),
            Some(FaultKind::Hang) => Outcome::Hang,
        }
    }
}

fn encode_paging_state(offset: usize) -> PagingState {
    PagingState((offset as u64).to_be_bytes().to_vec())
}

fn decode_paging_state(state: Option<&PagingState>) -> DriverResult<usize> {
    match state {
        None => Ok(0),
        Some(PagingState(bytes)) => {
            let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                DriverError::InvalidQuery("malformed paging state".to_string())
            })?;
            Ok(u64::from_be_bytes(raw) as usize)
        }
    }
}

/// Apply a finished unit of work unless the query moved to another
/// generation. Returns the callback to fire.
fn complete(
    cluster: &ClusterInner,
    shared: &Mutex<Exec>,
    generation: u64,
    work: Work,
) -> Option<DataReadyCallback> {
    let result = match &work {
        Work::Select { select, params, .. } => cluster.select(select, params).map(Some),
        Work::Write(entries) => cluster.apply(entries).map(|_| Some(Vec::new())),
        Work::NextPage => Ok(None),
    };
    let mut exec = shared.lock();
    if exec.generation != generation {
        return None;
    }
    match result {
        Err(err) => exec.phase = Phase::Failed(err),
        Ok(rows) => {
            if let Some(rows) = rows {
                exec.rows = rows;
                exec.page_start = match work {
                    Work::Select { offset, .. } => offset,
                    _ => 0,
                };
            }
            exec.seal_page();
            exec.phase = Phase::Ready;
        }
    }
    exec.callback.clone()
}

fn fail(shared: &Mutex<Exec>, generation: u64, err: DriverError) -> Option<DataReadyCallback> {
    let mut exec = shared.lock();
    if exec.generation != generation {
        return None;
    }
    exec.phase = Phase::Failed(err);
    exec.callback.clone()
}

fn notify(callback: Option<DataReadyCallback>) {
    if let Some(callback) = callback {
        callback();
    }
}

/// Query handle issued by [`MemoryCluster`](super::MemoryCluster).
pub struct MemoryQuery {
    cluster: Arc<ClusterInner>,
    sql: String,
    params: Vec<Option<Value>>,
    batch: Option<Vec<BatchEntry>>,
    shared: Arc<Mutex<Exec>>,
    current: Vec<Value>,
}

impl MemoryQuery {
    pub(crate) fn new(cluster: Arc<ClusterInner>) -> Self {
        Self {
            cluster,
            sql: String::new(),
            params: Vec::new(),
            batch: None,
            shared: Arc::new(Mutex::new(Exec {
                generation: 0,
                phase: Phase::Idle,
                rows: Vec::new(),
                page_size: 0,
                page_start: 0,
                page_end: 0,
                cursor: 0,
                eof: false,
                timeout: crate::query::DEFAULT_QUERY_TIMEOUT,
                callback: None,
            })),
            current: Vec::new(),
        }
    }

    /// Start a new generation; results of earlier ones are discarded.
    fn begin(&mut self, options: &ExecuteOptions) -> u64 {
        self.current.clear();
        let mut exec = self.shared.lock();
        exec.generation += 1;
        exec.phase = Phase::Pending;
        exec.rows.clear();
        exec.page_size = if options.pageable {
            options.page_size as usize
        } else {
            0
        };
        exec.page_start = 0;
        exec.page_end = 0;
        exec.cursor = 0;
        exec.eof = false;
        exec.timeout = options.timeout;
        exec.generation
    }

    fn dispatch(
        &self,
        generation: u64,
        outcome: Outcome,
        timeout: Duration,
        is_async: bool,
    ) -> DriverResult<()> {
        let latency = self.cluster.config.latency();
        let (delay, outcome) = match (outcome, latency) {
            (Outcome::Hang, _) => (Some(timeout), Outcome::Fail(DriverError::Timeout(timeout))),
            (_, Some(latency)) if latency >= timeout => {
                (Some(timeout), Outcome::Fail(DriverError::Timeout(timeout)))
            }
            (outcome, latency) => (latency, outcome),
        };

        let cluster = Arc::clone(&self.cluster);
        let shared = Arc::clone(&self.shared);
        let job = move || {
            let callback = match outcome {
                Outcome::Run(work) => complete(&cluster, &shared, generation, work),
                Outcome::Fail(err) => fail(&shared, generation, err),
                Outcome::Hang => None,
            };
            notify(callback);
        };

        match delay {
            None => {
                job();
                Ok(())
            }
            Some(delay) if !is_async => {
                thread::sleep(delay);
                job();
                Ok(())
            }
            Some(delay) => {
                let spawned = thread::Builder::new()
                    .name("seqvault-memory-io".to_string())
                    .spawn(move || {
                        thread::sleep(delay);
                        job();
                    });
                if let Err(err) = spawned {
                    let err = DriverError::Backend(format!("cannot schedule completion: {err}"));
                    fail(&self.shared, generation, err.clone());
                    return Err(err);
                }
                Ok(())
            }
        }
    }
}

impl Query for MemoryQuery {
    fn set_sql(&mut self, sql: &str, param_count: usize) {
        self.sql = sql.to_string();
        self.params = vec![None; param_count];
    }

    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, index: usize, value: Value) -> DriverResult<()> {
        let count = self.params.len();
        let slot = self.params.get_mut(index).ok_or_else(|| {
            DriverError::Bind(format!("parameter index {index} out of range ({count} declared)"))
        })?;
        *slot = Some(value);
        Ok(())
    }

    fn execute(&mut self, consistency: Consistency, options: ExecuteOptions) -> DriverResult<()> {
        let statement = cql::parse(&self.sql)?;

        if let Some(batch) = self.batch.as_mut() {
            let Statement::Insert(insert) = statement else {
                return Err(DriverError::InvalidQuery(
                    "only INSERT statements can be batched".to_string(),
                ));
            };
            for operand in &insert.values {
                operand.resolve(&self.params)?;
            }
            batch.push(BatchEntry {
                sql: self.sql.clone(),
                insert,
                params: self.params.clone(),
            });
            return Ok(());
        }

        let (keyspace, table) = {
            let (ks, t) = statement.target();
            (ks.to_string(), t.to_string())
        };
        let kind = match statement {
            Statement::Select(_) => StatementKind::Select,
            Statement::Insert(_) => StatementKind::Insert,
        };
        debug!(
            table = %format!("{keyspace}.{table}"),
            kind = %kind,
            consistency = %consistency,
            "memory cluster statement"
        );
        self.cluster.record(kind, &keyspace, &table, &self.sql, &self.params);

        let work = match statement {
            Statement::Select(select) => Work::Select {
                select,
                params: self.params.clone(),
                offset: decode_paging_state(options.paging_state.as_ref())?,
            },
            Statement::Insert(insert) => Work::Write(vec![(insert, self.params.clone())]),
        };
        let fault = self.cluster.take_fault(&keyspace, &table, kind);
        let generation = self.begin(&options);
        self.dispatch(
            generation,
            Outcome::new(fault, work, options.timeout),
            options.timeout,
            options.is_async,
        )
    }

    fn new_batch(&mut self) -> DriverResult<()> {
        self.batch = Some(Vec::new());
        Ok(())
    }

    fn run_batch(&mut self, consistency: Consistency, options: ExecuteOptions) -> DriverResult<()> {
        let entries = self
            .batch
            .take()
            .ok_or_else(|| DriverError::NotActive("run_batch without new_batch".to_string()))?;
        if entries.is_empty() {
            return Err(DriverError::InvalidQuery("empty batch".to_string()));
        }
        debug!(
            statements = entries.len(),
            consistency = %consistency,
            "memory cluster batch"
        );
        for entry in &entries {
            self.cluster.record(
                StatementKind::Batch,
                &entry.insert.keyspace,
                &entry.insert.table,
                &entry.sql,
                &entry.params,
            );
        }
        let fault = entries.iter().find_map(|entry| {
            self.cluster
                .take_fault(&entry.insert.keyspace, &entry.insert.table, StatementKind::Batch)
        });
        let work = Work::Write(
            entries
                .into_iter()
                .map(|entry| (entry.insert, entry.params))
                .collect(),
        );
        let generation = self.begin(&options);
        self.dispatch(
            generation,
            Outcome::new(fault, work, options.timeout),
            options.timeout,
            options.is_async,
        )
    }

    fn is_ready(&mut self) -> DriverResult<bool> {
        let exec = self.shared.lock();
        match &exec.phase {
            Phase::Idle | Phase::Closed => {
                Err(DriverError::NotActive("query was not executed".to_string()))
            }
            Phase::Pending => Ok(false),
            Phase::Ready => Ok(true),
            Phase::Failed(err) => Err(err.clone()),
        }
    }

    fn next_row(&mut self) -> DriverResult<RowState> {
        let (generation, timeout) = {
            let mut exec = self.shared.lock();
            match &exec.phase {
                Phase::Idle | Phase::Closed => {
                    return Err(DriverError::NotActive("query was not executed".to_string()))
                }
                Phase::Pending => return Ok(RowState::NotReady),
                Phase::Failed(err) => return Err(err.clone()),
                Phase::Ready => {}
            }
            if exec.cursor < exec.page_end {
                self.current = exec.rows[exec.cursor].clone();
                exec.cursor += 1;
                return Ok(RowState::Ready);
            }
            self.current.clear();
            if exec.page_end >= exec.rows.len() {
                exec.eof = true;
                return Ok(RowState::Eof);
            }
            exec.page_start = exec.page_end;
            exec.phase = Phase::Pending;
            (exec.generation, exec.timeout)
        };

        let statement = cql::parse(&self.sql)?;
        let (keyspace, table) = statement.target();
        self.cluster
            .record(StatementKind::PageFetch, keyspace, table, &self.sql, &[]);
        let fault = self
            .cluster
            .take_fault(keyspace, table, StatementKind::PageFetch);
        self.dispatch(
            generation,
            Outcome::new(fault, Work::NextPage, timeout),
            timeout,
            true,
        )?;
        Ok(RowState::NotReady)
    }

    fn field(&self, index: usize) -> Option<&Value> {
        self.current.get(index)
    }

    fn paging_state(&self) -> Option<PagingState> {
        let exec = self.shared.lock();
        let active = !matches!(exec.phase, Phase::Idle | Phase::Closed);
        (active && exec.page_size > 0 && exec.page_start > 0)
            .then(|| encode_paging_state(exec.page_start))
    }

    fn is_eof(&self) -> bool {
        self.shared.lock().eof
    }

    fn is_active(&self) -> bool {
        matches!(
            self.shared.lock().phase,
            Phase::Pending | Phase::Ready | Phase::Failed(_)
        )
    }

    fn close(&mut self) {
        self.current.clear();
        self.batch = None;
        let mut exec = self.shared.lock();
        exec.generation += 1;
        exec.phase = Phase::Closed;
        exec.rows.clear();
        exec.eof = false;
    }

    fn set_on_data_ready(&mut self, callback: Option<DataReadyCallback>) {
        self.shared.lock().callback = callback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_state_round_trip() {
        let state = encode_paging_state(300);
        assert_eq!(decode_paging_state(Some(&state)).unwrap(), 300);
        assert_eq!(decode_paging_state(None).unwrap(), 0);
        assert!(decode_paging_state(Some(&PagingState(vec![1, 2]))).is_err());
    }
}
