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

//! Loops that drive a task to a terminal state.
//!
//! Both drivers hook the task's data-ready callback when the task has not
//! started yet and sleep until it fires. A task that already started is
//! polled instead.

use crate::error::{ContractResult, DriveError, ErrorCode, Severity, TaskError};
use crate::state::TaskState;
use crate::task::Task;
use parking_lot::{Condvar, Mutex};
use seqvault_driver::DataReadyCallback;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Poll interval for tasks whose callback could not be hooked.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Longest sleep between steps of a hooked task.
const MAX_PARK: Duration = Duration::from_millis(50);

/// Chain `wake` in front of the task's own data-ready callback. Returns
/// `false` when the task already started.
pub(crate) fn install_wake<T: Task + ?Sized>(
    task: &mut T,
    wake: DataReadyCallback,
) -> ContractResult<bool> {
    let core = task.core();
    if core.is_started() || core.state() != TaskState::Init {
        return Ok(false);
    }
    let callback: DataReadyCallback = match core.data_ready() {
        Some(user) => Arc::new(move || {
            wake();
            user();
        }),
        None => wake,
    };
    task.set_data_ready_cb(callback)?;
    Ok(true)
}

fn outcome<T: Task + ?Sized>(task: &T, state: TaskState) -> Option<Result<TaskState, DriveError>> {
    match state {
        TaskState::Done => Some(Ok(state)),
        TaskState::Error => {
            let err = task.error().cloned().unwrap_or_else(|| {
                TaskError::new(500, ErrorCode::NotActive, Severity::Error, "task failed")
            });
            Some(Err(DriveError::Failed(err)))
        }
        _ => None,
    }
}

fn next_wait<T: Task + ?Sized>(task: &T, remaining: Duration, hooked: bool) -> Duration {
    let mut wait = remaining.min(MAX_PARK);
    if let Some(after) = task.wake_after() {
        wait = wait.min(after.max(Duration::from_micros(100)));
    }
    if !hooked {
        wait = wait.min(POLL_INTERVAL);
    }
    wait
}

#[derive(Default)]
struct Signal {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    fn fire(&self) {
        *self.fired.lock() = true;
        self.cond.notify_all();
    }

    fn wait(&self, timeout: Duration) {
        let mut fired = self.fired.lock();
        if !*fired {
            self.cond.wait_for(&mut fired, timeout);
        }
        *fired = false;
    }
}

/// Drive `task` on the calling thread until it is terminal or `timeout`
/// elapses.
///
/// Returns `Ok(Done)`, or the task's error once it reached `Error`.
pub fn drive_blocking<T: Task + ?Sized>(
    task: &mut T,
    timeout: Duration,
) -> Result<TaskState, DriveError> {
    let signal = Arc::new(Signal::default());
    let hook = Arc::clone(&signal);
    let hooked = install_wake(task, Arc::new(move || hook.fire()))?;
    let deadline = Instant::now() + timeout;
    loop {
        let state = task.wait1()?;
        if let Some(result) = outcome(task, state) {
            return result;
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(DriveError::TimedOut {
                task_id: task.id(),
                timeout,
                state,
            });
        }
        signal.wait(next_wait(task, deadline - now, hooked));
    }
}

/// Async counterpart of [`drive_blocking`]; sleeps on a
/// [`tokio::sync::Notify`] between steps.
pub async fn drive<T: Task + ?Sized>(
    task: &mut T,
    timeout: Duration,
) -> Result<TaskState, DriveError> {
    let notify = Arc::new(Notify::new());
    let hook = Arc::clone(&notify);
    let hooked = install_wake(task, Arc::new(move || hook.notify_one()))?;
    let deadline = Instant::now() + timeout;
    loop {
        let state = task.wait1()?;
        if let Some(result) = outcome(task, state) {
            return result;
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(DriveError::TimedOut {
                task_id: task.id(),
                timeout,
                state,
            });
        }
        let wait = next_wait(task, deadline - now, hooked);
        let _ = tokio::time::timeout(wait, notify.notified()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContractResult;
    use crate::machine::TaskCore;
    use crate::state::Progress;
    use crate::task::TaskBuilder;
    use seqvault_driver::memory::MemoryCluster;

    /// Finishes after a fixed number of steps, waiting in between.
    struct Countdown {
        core: TaskCore,
        steps: u32,
    }

    impl Countdown {
        fn new(steps: u32) -> Self {
            let builder = TaskBuilder::new(Arc::new(MemoryCluster::default()), "ks", ());
            let (core, ()) = TaskCore::from_builder("countdown", "t", builder);
            Self { core, steps }
        }
    }

    impl Task for Countdown {
        fn core(&self) -> &TaskCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut TaskCore {
            &mut self.core
        }

        fn step(&mut self) -> ContractResult<Progress> {
            if self.steps == 0 {
                self.core.finish();
                return Ok(Progress::Continue);
            }
            self.steps -= 1;
            Ok(Progress::Wait)
        }
    }

    #[test]
    fn test_blocking_driver_polls_until_done() {
        let mut task = Countdown::new(3);
        assert_eq!(
            drive_blocking(&mut task, Duration::from_secs(5)).unwrap(),
            TaskState::Done
        );
    }

    #[test]
    fn test_blocking_driver_times_out() {
        let mut task = Countdown::new(u32::MAX);
        let err = drive_blocking(&mut task, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, DriveError::TimedOut { state: TaskState::Init, .. }));
    }

    #[test]
    fn test_user_callback_is_kept() {
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let mut task = Countdown::new(0);
        task.set_data_ready_cb(Arc::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }))
        .unwrap();
        assert!(install_wake(&mut task, Arc::new(|| {})).unwrap());
        if let Some(callback) = task.core().data_ready() {
            callback();
        }
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_async_driver_finishes() {
        let mut task = Countdown::new(2);
        assert_eq!(
            drive(&mut task, Duration::from_secs(5)).await.unwrap(),
            TaskState::Done
        );
    }
}
