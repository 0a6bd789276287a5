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

//! Background executor for tasks.
//!
//! Callers submit tasks from any thread. A poller thread owns them, steps a
//! task whenever its data-ready callback fires (or the poll interval passes)
//! and publishes a [`Completion`] once the task is terminal. Completions are
//! read from a bounded queue by any number of consumer threads. While that
//! queue is full the poller holds completions back and republishes them on
//! later rounds, so every submitted task is reported once.

use crate::error::{ContractError, TaskError};
use crate::runtime::install_wake;
use crate::state::TaskState;
use crate::task::{Task, TaskId};
use parking_lot::{Condvar, Mutex};
use seqvault_queue::{BoundedQueue, PushError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Tasks that may wait for the poller at once.
pub const SUBMIT_CAPACITY: usize = 256;

/// Completions buffered for consumers before the poller starts holding
/// them back.
pub const COMPLETION_CAPACITY: usize = 1024;

/// Errors from the executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Submission queue is full
    #[error("Submission queue is full")]
    QueueFull,

    /// Executor was shut down
    #[error("Executor is shut down")]
    ShutDown,

    /// Poller thread could not be started
    #[error("Failed to spawn poller: {0}")]
    Spawn(String),

    /// Task cannot be submitted
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Executor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Longest time the poller sleeps without a wake-up
    #[serde(with = "millis")]
    pub poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Outcome of a submitted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Task id returned by `submit`
    pub task_id: TaskId,
    /// Final state; not terminal when the executor shut down first
    pub state: TaskState,
    /// Restarts the task went through
    pub restarts: u32,
    /// Failure, when `state` is `Error`
    pub error: Option<TaskError>,
}

impl Completion {
    fn of(task: &dyn Task) -> Self {
        Self {
            task_id: task.id(),
            state: task.state(),
            restarts: task.restart_count(),
            error: task.error().cloned(),
        }
    }
}

#[derive(Default)]
struct Wake {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl Wake {
    fn fire(&self) {
        *self.pending.lock() = true;
        self.cond.notify_one();
    }

    fn wait(&self, timeout: Duration) {
        let mut pending = self.pending.lock();
        if !*pending {
            self.cond.wait_for(&mut pending, timeout);
        }
        *pending = false;
    }
}

struct Shared {
    submissions: BoundedQueue<Box<dyn Task>, SUBMIT_CAPACITY>,
    completions: BoundedQueue<Completion, COMPLETION_CAPACITY>,
    wake: Wake,
    stopping: AtomicBool,
    held_back: AtomicUsize,
}

/// Completions the consumers have not made room for yet, oldest first.
#[derive(Default)]
struct Backlog {
    held: VecDeque<Completion>,
}

impl Backlog {
    fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// Queue `completion` behind anything already held back.
    fn publish(&mut self, shared: &Shared, completion: Completion) {
        debug!(
            task_id = %completion.task_id,
            state = %completion.state,
            restarts = completion.restarts,
            "task completed"
        );
        self.held.push_back(completion);
        self.flush(shared);
    }

    /// Move held completions into the queue while it has room.
    fn flush(&mut self, shared: &Shared) {
        while let Some(completion) = self.held.pop_front() {
            if let Err(err) = shared.completions.push(completion) {
                self.held.push_front(err.into_inner());
                break;
            }
        }
        shared.held_back.store(self.held.len(), Ordering::Release);
    }

    /// Last delivery attempt on shutdown: wait up to `patience` per
    /// completion for a consumer, then give up on the rest.
    fn drain(&mut self, shared: &Shared, patience: Duration) {
        if !self.is_empty() {
            warn!(held = self.held.len(), "completion queue full at shutdown");
        }
        while let Some(completion) = self.held.pop_front() {
            if let Err(err) = shared.completions.push_wait(completion, Some(patience)) {
                let dropped = err.into_inner();
                let lost = self.held.len() + 1;
                error!(task_id = %dropped.task_id, lost, "dropping undelivered completions");
                metrics::counter!("seqvault_executor_completions_dropped_total")
                    .increment(lost as u64);
                self.held.clear();
            }
        }
        shared.held_back.store(0, Ordering::Release);
    }
}

/// Runs submitted tasks on a poller thread.
pub struct TaskExecutor {
    shared: Arc<Shared>,
    config: ExecutorConfig,
    poller: Option<JoinHandle<()>>,
}

impl TaskExecutor {
    /// Start the poller thread.
    #[instrument(
        skip(config),
        fields(poll_interval_ms = config.poll_interval.as_millis() as u64)
    )]
    pub fn start(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let shared = Arc::new(Shared {
            submissions: BoundedQueue::new(),
            completions: BoundedQueue::new(),
            wake: Wake::default(),
            stopping: AtomicBool::new(false),
            held_back: AtomicUsize::new(0),
        });
        let poller_shared = Arc::clone(&shared);
        let poller = thread::Builder::new()
            .name("seqvault-executor".to_string())
            .spawn(move || poll(poller_shared, config))
            .map_err(|e| ExecutorError::Spawn(e.to_string()))?;
        info!("task executor started");
        Ok(Self {
            shared,
            config,
            poller: Some(poller),
        })
    }

    /// Settings in use.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Hand a task to the poller. The task must not have started.
    pub fn submit(&self, mut task: Box<dyn Task>) -> Result<TaskId, ExecutorError> {
        if self.shared.stopping.load(Ordering::Acquire) {
            return Err(ExecutorError::ShutDown);
        }
        let id = task.id();
        let shared = Arc::clone(&self.shared);
        if !install_wake(task.as_mut(), Arc::new(move || shared.wake.fire()))? {
            return Err(ContractError::SubmittedStartedTask {
                task_id: id,
                state: task.state(),
            }
            .into());
        }
        match self.shared.submissions.push(task) {
            Ok(()) => {
                self.shared.wake.fire();
                debug!(task_id = %id, "task submitted");
                Ok(id)
            }
            Err(PushError::Full(_)) | Err(PushError::Timeout(_)) => Err(ExecutorError::QueueFull),
        }
    }

    /// Next completion, waiting up to `timeout` (`None` waits forever).
    pub fn next_completion(&self, timeout: Option<Duration>) -> Option<Completion> {
        self.shared.completions.pop_wait(timeout)
    }

    /// Completions waiting to be read (advisory).
    pub fn pending_completions(&self) -> usize {
        self.shared.completions.size() + self.shared.held_back.load(Ordering::Acquire)
    }

    /// Stop the poller and wait for it. Tasks still running are published
    /// with their current state.
    pub fn shutdown(&mut self) {
        let Some(poller) = self.poller.take() else {
            return;
        };
        self.shared.stopping.store(true, Ordering::Release);
        self.shared.wake.fire();
        if poller.join().is_err() {
            error!("task executor poller panicked");
        }
        info!("task executor stopped");
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll(shared: Arc<Shared>, config: ExecutorConfig) {
    let mut tasks: Vec<Box<dyn Task>> = Vec::new();
    let mut backlog = Backlog::default();
    loop {
        backlog.flush(&shared);
        while let Some(task) = shared.submissions.pop() {
            tasks.push(task);
        }

        let mut i = 0;
        while i < tasks.len() {
            match tasks[i].wait1() {
                Ok(state) if state.is_terminal() => {
                    let task = tasks.swap_remove(i);
                    backlog.publish(&shared, Completion::of(task.as_ref()));
                }
                Ok(_) => i += 1,
                Err(err) => {
                    let task = tasks.swap_remove(i);
                    error!(task_id = %task.id(), error = %err, "task violated its contract");
                    backlog.publish(&shared, Completion::of(task.as_ref()));
                }
            }
        }

        if shared.stopping.load(Ordering::Acquire) {
            while let Some(task) = shared.submissions.pop() {
                tasks.push(task);
            }
            for task in tasks.drain(..) {
                backlog.publish(&shared, Completion::of(task.as_ref()));
            }
            backlog.drain(&shared, config.poll_interval);
            return;
        }

        let wait = tasks
            .iter()
            .filter_map(|t| t.wake_after())
            .fold(config.poll_interval, Duration::min);
        shared.wake.wait(wait);
    }
}
