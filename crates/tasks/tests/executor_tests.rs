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

//! Background executor and async driver against a cluster with latency.

mod common;

use common::{cluster_with, seed_status_history, Collector, KS};
use seqvault_driver::memory::FaultRule;
use seqvault_driver::DriverConfig;
use seqvault_tasks::executor::COMPLETION_CAPACITY;
use seqvault_tasks::schema::BLOB_STATUS_HISTORY;
use seqvault_tasks::{
    drive, ErrorCode, ExecutorConfig, ExecutorError, FetchSplitHistory, FetchStatusHistory,
    RetryPolicy, StatusHistoryRecord, Task, TaskExecutor, TaskState,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_executor_completes_every_task() {
    let cluster = cluster_with(DriverConfig::default().with_latency_ms(2));
    for sat_key in 0..8 {
        seed_status_history(&cluster, sat_key, 12);
    }
    let executor = TaskExecutor::start(ExecutorConfig::default()).unwrap();

    let mut collectors = Vec::new();
    let mut submitted = HashSet::new();
    for sat_key in 0..8 {
        let collector = Collector::<StatusHistoryRecord>::new();
        let task = FetchStatusHistory::builder(Arc::new(cluster.clone()), KS, sat_key)
            .page_size(5)
            .build(collector.callback());
        submitted.insert(executor.submit(Box::new(task)).unwrap());
        collectors.push(collector);
    }

    let mut finished = HashSet::new();
    while finished.len() < submitted.len() {
        let completion = executor
            .next_completion(Some(Duration::from_secs(5)))
            .expect("completion before timeout");
        assert_eq!(completion.state, TaskState::Done);
        assert!(completion.error.is_none());
        finished.insert(completion.task_id);
    }
    assert_eq!(finished, submitted);
    for collector in collectors {
        assert_eq!(collector.taken().len(), 12);
        assert_eq!(collector.last_calls(), 1);
    }
}

#[test]
fn test_executor_reports_failures() {
    let cluster = cluster_with(DriverConfig::default().with_latency_ms(1));
    cluster.inject_fault(FaultRule::unavailable().on_table(BLOB_STATUS_HISTORY));
    let executor = TaskExecutor::start(ExecutorConfig::default()).unwrap();

    let collector = Collector::<StatusHistoryRecord>::new();
    let task = FetchStatusHistory::builder(Arc::new(cluster), KS, 1)
        .retry(RetryPolicy::immediate(1))
        .build(collector.callback());
    let id = executor.submit(Box::new(task)).unwrap();

    let completion = executor
        .next_completion(Some(Duration::from_secs(5)))
        .expect("completion before timeout");
    assert_eq!(completion.task_id, id);
    assert_eq!(completion.state, TaskState::Error);
    assert_eq!(completion.restarts, 2);
    assert_eq!(completion.error.map(|e| e.code), Some(ErrorCode::Unavailable));
}

#[test]
fn test_completions_beyond_queue_capacity_are_delivered() {
    let cluster = cluster_with(DriverConfig::default());
    let executor = TaskExecutor::start(ExecutorConfig {
        poll_interval: Duration::from_millis(2),
    })
    .unwrap();

    let total = COMPLETION_CAPACITY + 100;
    let fetch = |sat_key: i32| -> Box<dyn Task> {
        Box::new(
            FetchSplitHistory::builder(Arc::new(cluster.clone()), KS, sat_key)
                .build(|_, _| true),
        )
    };
    let mut submitted = HashSet::new();
    for sat_key in 0..total as i32 {
        loop {
            match executor.submit(fetch(sat_key)) {
                Ok(id) => {
                    submitted.insert(id);
                    break;
                }
                Err(ExecutorError::QueueFull) => std::thread::sleep(Duration::from_millis(1)),
                Err(err) => panic!("unexpected submit error: {err}"),
            }
        }
    }
    assert_eq!(submitted.len(), total);

    let mut finished = HashSet::new();
    while finished.len() < total {
        let completion = executor
            .next_completion(Some(Duration::from_secs(5)))
            .expect("every completion is delivered");
        assert_eq!(completion.state, TaskState::Done);
        finished.insert(completion.task_id);
    }
    assert_eq!(finished, submitted);
    assert_eq!(executor.pending_completions(), 0);
}

#[test]
fn test_shutdown_reports_unfinished_tasks() {
    let cluster = cluster_with(DriverConfig::default());
    cluster.inject_fault(FaultRule::hang().on_table(BLOB_STATUS_HISTORY));
    let mut executor = TaskExecutor::start(ExecutorConfig::default()).unwrap();

    let collector = Collector::<StatusHistoryRecord>::new();
    let task = FetchStatusHistory::builder(Arc::new(cluster), KS, 1)
        .timeout(Duration::from_secs(30))
        .build(collector.callback());
    let id = executor.submit(Box::new(task)).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    executor.shutdown();

    let completion = executor
        .next_completion(Some(Duration::from_secs(1)))
        .expect("unfinished task reported");
    assert_eq!(completion.task_id, id);
    assert!(!completion.state.is_terminal());
}

#[tokio::test]
async fn test_async_driver_with_latency() {
    let cluster = cluster_with(DriverConfig::default().with_latency_ms(3));
    seed_status_history(&cluster, 9, 20);

    let collector = Collector::<StatusHistoryRecord>::new();
    let mut task = FetchStatusHistory::builder(Arc::new(cluster), KS, 9)
        .page_size(6)
        .build(collector.callback());
    let state = drive(&mut task, Duration::from_secs(5)).await.unwrap();
    assert_eq!(state, TaskState::Done);
    assert_eq!(collector.taken().len(), 20);
    assert_eq!(collector.last_calls(), 1);
}
