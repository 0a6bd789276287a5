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

//! Blob writes: payload sub-task, atomic property batch, failure and
//! restart behaviour.

mod common;

use common::{cluster, Errors, KS};
use seqvault_driver::memory::{FaultRule, MemoryCluster, StatementKind};
use seqvault_driver::{Connection, Consistency, ExecuteOptions, Query, RowState};
use seqvault_tasks::schema::{BLOB_CHUNK, BLOB_PROP, BLOB_PROP_CHANGE_LOG};
use seqvault_tasks::{
    drive_blocking, BlobRecord, ChangeLogRecord, DriveError, ErrorCode, FromRow, InsertBlobTask,
    RetryPolicy, Task, TaskState,
};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn blob(chunks: usize) -> BlobRecord {
    BlobRecord {
        sat_key: 4711,
        last_modified: 1_700_000_000_000,
        class: 1,
        size: 6,
        size_unpacked: 12,
        username: "loader".to_string(),
        chunks: (0..chunks).map(|i| vec![i as u8; 2]).collect(),
        ..Default::default()
    }
}

fn count(cluster: &MemoryCluster, kind: StatementKind) -> usize {
    cluster.statements().iter().filter(|s| s.kind == kind).count()
}

fn read_all<R: FromRow>(cluster: &MemoryCluster, sql: &str) -> Vec<R> {
    let mut query = cluster.new_query();
    query.set_sql(sql, 0);
    query
        .execute(Consistency::LocalQuorum, ExecuteOptions::default())
        .unwrap();
    let mut rows = Vec::new();
    while query.next_row().unwrap() == RowState::Ready {
        rows.push(R::from_row(query.as_ref()));
    }
    rows
}

#[test]
fn test_writes_payload_then_properties_and_change_log() {
    let cluster = cluster();
    let mut task = InsertBlobTask::builder(Arc::new(cluster.clone()), KS, blob(3)).build();
    assert_eq!(drive_blocking(&mut task, TIMEOUT).unwrap(), TaskState::Done);
    assert!(task.payload_written());

    assert_eq!(cluster.row_count(KS, BLOB_CHUNK).unwrap(), 3);
    assert_eq!(cluster.row_count(KS, BLOB_PROP).unwrap(), 1);
    assert_eq!(cluster.row_count(KS, BLOB_PROP_CHANGE_LOG).unwrap(), 1);
    assert_eq!(count(&cluster, StatementKind::Insert), 3);
    assert_eq!(count(&cluster, StatementKind::Batch), 2);

    let props: Vec<BlobRecord> = read_all(
        &cluster,
        &format!("SELECT {} FROM {KS}.{BLOB_PROP}", BlobRecord::COLUMNS.join(", ")),
    );
    assert_eq!(props.len(), 1);
    assert_eq!(props[0].n_chunks, 3);
    assert_eq!(props[0].username, "loader");

    let log: Vec<ChangeLogRecord> = read_all(
        &cluster,
        &format!(
            "SELECT {} FROM {KS}.{BLOB_PROP_CHANGE_LOG}",
            ChangeLogRecord::COLUMNS.join(", ")
        ),
    );
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].sat_key, 4711);
    assert_eq!(log[0].updated_time % 60_000, 0);
}

#[test]
fn test_blob_without_chunks_writes_only_the_batch() {
    let cluster = cluster();
    let mut task = InsertBlobTask::builder(Arc::new(cluster.clone()), KS, blob(0)).build();
    assert_eq!(drive_blocking(&mut task, TIMEOUT).unwrap(), TaskState::Done);
    assert_eq!(count(&cluster, StatementKind::Insert), 0);
    assert_eq!(count(&cluster, StatementKind::Batch), 2);
}

#[test]
fn test_payload_failure_skips_batch_and_keeps_error_code() {
    let cluster = cluster();
    cluster.inject_fault(FaultRule::backend("disk full").on_table(BLOB_CHUNK));

    let errors = Errors::default();
    let mut task = InsertBlobTask::builder(Arc::new(cluster.clone()), KS, blob(2))
        .on_error(errors.callback())
        .build();
    let err = match drive_blocking(&mut task, TIMEOUT) {
        Err(DriveError::Failed(err)) => err,
        other => panic!("expected task failure, got {other:?}"),
    };
    assert_eq!(err.code, ErrorCode::Backend);
    assert_eq!(count(&cluster, StatementKind::Batch), 0);
    assert_eq!(cluster.row_count(KS, BLOB_PROP).unwrap(), 0);
    assert_eq!(errors.all(), vec![err]);
}

#[test]
fn test_payload_retry_exhaustion_keeps_transient_code() {
    let cluster = cluster();
    cluster.inject_fault(FaultRule::unavailable().on_table(BLOB_CHUNK));

    let mut task = InsertBlobTask::builder(Arc::new(cluster.clone()), KS, blob(1))
        .retry(RetryPolicy::immediate(1))
        .build();
    assert_eq!(task.wait1().unwrap(), TaskState::Error);
    let err = task.error().cloned().unwrap();
    assert_eq!((err.status, err.code), (503, ErrorCode::Unavailable));
    assert_eq!(count(&cluster, StatementKind::Insert), 2);
    assert_eq!(count(&cluster, StatementKind::Batch), 0);
}

#[test]
fn test_batch_restart_does_not_rewrite_payload() {
    let cluster = cluster();
    cluster.inject_fault(
        FaultRule::timeout()
            .on_table(BLOB_PROP)
            .on(StatementKind::Batch)
            .times(1),
    );

    let mut task = InsertBlobTask::builder(Arc::new(cluster.clone()), KS, blob(2)).build();
    assert_eq!(drive_blocking(&mut task, TIMEOUT).unwrap(), TaskState::Done);
    assert_eq!(task.restart_count(), 1);
    assert_eq!(count(&cluster, StatementKind::Insert), 2);
    assert_eq!(count(&cluster, StatementKind::Batch), 4);
    assert_eq!(cluster.row_count(KS, BLOB_PROP).unwrap(), 1);
}

#[test]
fn test_failed_batch_writes_nothing() {
    let cluster = cluster();
    cluster.inject_fault(FaultRule::backend("rejected").on(StatementKind::Batch));

    let mut task = InsertBlobTask::builder(Arc::new(cluster.clone()), KS, blob(0)).build();
    assert_eq!(task.wait1().unwrap(), TaskState::Error);
    assert_eq!(cluster.row_count(KS, BLOB_PROP).unwrap(), 0);
    assert_eq!(cluster.row_count(KS, BLOB_PROP_CHANGE_LOG).unwrap(), 0);
}
