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

//! Error types for storage tasks.
//!
//! Two families:
//! - [`TaskError`]: operational failure, delivered once through the task's
//!   error callback
//! - [`ContractError`]: caller misuse, returned as `Err` from the call that
//!   violated the contract and never routed through the error callback

use crate::state::TaskState;
use crate::task::TaskId;
use seqvault_common::EnvError;
use seqvault_driver::DriverError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Internal error code carried by [`TaskError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Coordinator timed out (retry-exhausted)
    QueryTimeout,
    /// Not enough replicas (retry-exhausted)
    Unavailable,
    /// Completion belonged to a superseded attempt (retry-exhausted)
    StaleCompletion,
    /// Statement rejected by the store
    InvalidQuery,
    /// Parameter binding failed
    Bind,
    /// Keyspace or table missing
    UnknownTable,
    /// Query used outside its lifecycle
    NotActive,
    /// Storage-side failure
    Backend,
    /// Driver configuration error
    Config,
}

impl ErrorCode {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::QueryTimeout => "query_timeout",
            ErrorCode::Unavailable => "unavailable",
            ErrorCode::StaleCompletion => "stale_completion",
            ErrorCode::InvalidQuery => "invalid_query",
            ErrorCode::Bind => "bind",
            ErrorCode::UnknownTable => "unknown_table",
            ErrorCode::NotActive => "not_active",
            ErrorCode::Backend => "backend",
            ErrorCode::Config => "config",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Recoverable by the caller (e.g. retry later)
    Warning,
    /// Request failed
    Error,
    /// Request failed and indicates a configuration or schema problem
    Critical,
}

/// Why a task had to restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartCause {
    /// Transient driver failure
    Driver(DriverError),
    /// A completion arrived for a superseded generation
    StaleCompletion,
}

impl fmt::Display for RestartCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartCause::Driver(err) => write!(f, "{err}"),
            RestartCause::StaleCompletion => f.write_str("stale completion"),
        }
    }
}

/// Operational failure reported through a task's error callback.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("[{status}] {code}: {message}")]
pub struct TaskError {
    /// HTTP-like status
    pub status: u16,
    /// Internal code
    pub code: ErrorCode,
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
}

impl TaskError {
    /// Create an error.
    pub fn new(
        status: u16,
        code: ErrorCode,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code,
            severity,
            message: message.into(),
        }
    }

    /// Classify a non-retryable driver failure.
    pub fn from_driver(err: &DriverError) -> Self {
        let (status, code, severity) = match err {
            DriverError::Timeout(_) => (504, ErrorCode::QueryTimeout, Severity::Error),
            DriverError::Unavailable(_) => (503, ErrorCode::Unavailable, Severity::Error),
            DriverError::InvalidQuery(_) => (400, ErrorCode::InvalidQuery, Severity::Critical),
            DriverError::Bind(_) => (400, ErrorCode::Bind, Severity::Critical),
            DriverError::UnknownTable(_) => (404, ErrorCode::UnknownTable, Severity::Critical),
            DriverError::NotActive(_) => (500, ErrorCode::NotActive, Severity::Error),
            DriverError::Backend(_) => (502, ErrorCode::Backend, Severity::Error),
            DriverError::ConfigError(_) => (500, ErrorCode::Config, Severity::Critical),
        };
        Self::new(status, code, severity, err.to_string())
    }

    /// Error for a task whose restart counter exceeded its retry budget.
    /// The code names the last transient cause.
    pub fn retries_exhausted(cause: &RestartCause, attempts: u32, table: &str) -> Self {
        let (status, code) = match cause {
            RestartCause::Driver(DriverError::Timeout(_)) => (504, ErrorCode::QueryTimeout),
            RestartCause::Driver(DriverError::Unavailable(_)) => (503, ErrorCode::Unavailable),
            RestartCause::Driver(_) | RestartCause::StaleCompletion => {
                (502, ErrorCode::StaleCompletion)
            }
        };
        Self::new(
            status,
            code,
            Severity::Error,
            format!("{table}: giving up after {attempts} attempts, last failure: {cause}"),
        )
    }
}

/// Caller misuse. Fatal for the call that triggered it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// `set_data_ready_cb` after the task started
    #[error("data-ready callback must be installed before the task starts (state {state})")]
    DataReadyAfterStart {
        /// State at the time of the call
        state: TaskState,
    },

    /// A step reached a state outside the task's transition table
    #[error("unexpected task state {state}")]
    UnexpectedState {
        /// Offending state
        state: TaskState,
    },

    /// A task that already started was handed to an executor
    #[error("task {task_id} already started (state {state})")]
    SubmittedStartedTask {
        /// Task id
        task_id: TaskId,
        /// State at submission
        state: TaskState,
    },
}

/// Result type for task-level calls.
pub type ContractResult<T> = Result<T, ContractError>;

/// Errors from driving a task to completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriveError {
    /// Contract violation raised while stepping
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Task ended in `Error`
    #[error(transparent)]
    Failed(#[from] TaskError),

    /// Deadline passed before the task reached a terminal state
    #[error("task {task_id} not finished after {timeout:?} (state {state})")]
    TimedOut {
        /// Task id
        task_id: TaskId,
        /// Deadline
        timeout: Duration,
        /// State when the deadline passed
        state: TaskState,
    },
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable present but unparseable
    #[error(transparent)]
    Env(#[from] EnvError),

    /// Value parsed but out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
