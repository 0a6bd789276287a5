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

//! Task states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a task's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Not started, or restarted after a transient failure
    Init,
    /// Read issued, waiting for the first result
    FetchStarted,
    /// Reading rows; may wait for further pages
    WaitingForFetch,
    /// Payload sub-task running
    InsertingPayload,
    /// Write issued
    InsertStarted,
    /// Waiting for the write to be acknowledged
    WaitingInserted,
    /// Finished successfully (terminal)
    Done,
    /// Finished with an error (terminal)
    Error,
}

impl TaskState {
    /// `Done` or `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Error)
    }

    /// Name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Init => "init",
            TaskState::FetchStarted => "fetch_started",
            TaskState::WaitingForFetch => "waiting_for_fetch",
            TaskState::InsertingPayload => "inserting_payload",
            TaskState::InsertStarted => "insert_started",
            TaskState::WaitingInserted => "waiting_inserted",
            TaskState::Done => "done",
            TaskState::Error => "error",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one [`Task::step`](crate::Task::step).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More work is possible right now
    Continue,
    /// Nothing to do until the data-ready callback fires (or a backoff
    /// delay elapses)
    Wait,
}
