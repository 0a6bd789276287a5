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

//! The `Query` trait: one statement (or batch) against the store.
//!
//! ## Lifecycle
//! 1. `set_sql` + `bind_*` (or `new_batch`, then repeated `set_sql`/`bind_*`/
//!    `execute` to queue statements, then `run_batch`)
//! 2. `execute` issues the statement; completion is asynchronous
//! 3. `is_ready` polls for completion; the data-ready callback fires when it
//!    may have changed
//! 4. `next_row` walks the current page; `RowState::NotReady` at a page
//!    boundary means the next page was requested
//! 5. `close` releases the statement; the query may be reused afterwards

use crate::{Consistency, DriverResult, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Wake-up notification invoked by the driver when a query may have made
/// progress. Must be cheap and must not call back into the query.
pub type DataReadyCallback = Arc<dyn Fn() + Send + Sync>;

/// Default per-request timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque server-side cursor naming the next page of a result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PagingState(pub Vec<u8>);

/// Per-execution options.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Complete asynchronously (readiness via `is_ready` / callback)
    pub is_async: bool,
    /// Request server-side paging
    pub pageable: bool,
    /// Rows per page when `pageable` (0 = driver default, unpaged)
    pub page_size: u32,
    /// Request timeout
    pub timeout: Duration,
    /// Resume the result set at this page
    pub paging_state: Option<PagingState>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            is_async: true,
            pageable: false,
            page_size: 0,
            timeout: DEFAULT_QUERY_TIMEOUT,
            paging_state: None,
        }
    }
}

impl ExecuteOptions {
    /// Paged execution with `page_size` rows per page.
    pub fn paged(page_size: u32) -> Self {
        Self {
            pageable: true,
            page_size,
            ..Self::default()
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resume from a paging state captured on a previous execution.
    pub fn resume_from(mut self, state: Option<PagingState>) -> Self {
        self.paging_state = state;
        self
    }
}

/// Outcome of [`Query::next_row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// A row is loaded; read it with the `field_*` accessors
    Ready,
    /// No row available yet (next page in flight); wait for the callback
    NotReady,
    /// End of the result set
    Eof,
}

/// One statement or batch against the store.
pub trait Query: Send {
    /// Set statement text with `param_count` positional `?` placeholders.
    /// Clears previously bound parameters.
    fn set_sql(&mut self, sql: &str, param_count: usize);

    /// Current statement text.
    fn sql(&self) -> &str;

    /// Bind a positional parameter.
    fn bind(&mut self, index: usize, value: Value) -> DriverResult<()>;

    /// Bind `null`.
    fn bind_null(&mut self, index: usize) -> DriverResult<()> {
        self.bind(index, Value::Null)
    }

    /// Bind a `smallint`.
    fn bind_i16(&mut self, index: usize, value: i16) -> DriverResult<()> {
        self.bind(index, Value::Int16(value))
    }

    /// Bind an `int`.
    fn bind_i32(&mut self, index: usize, value: i32) -> DriverResult<()> {
        self.bind(index, Value::Int32(value))
    }

    /// Bind a `bigint`.
    fn bind_i64(&mut self, index: usize, value: i64) -> DriverResult<()> {
        self.bind(index, Value::Int64(value))
    }

    /// Bind `text`.
    fn bind_str(&mut self, index: usize, value: &str) -> DriverResult<()> {
        self.bind(index, Value::Text(value.to_string()))
    }

    /// Bind a `blob`.
    fn bind_bytes(&mut self, index: usize, value: &[u8]) -> DriverResult<()> {
        self.bind(index, Value::Blob(value.to_vec()))
    }

    /// Issue the statement. In batch mode the statement is queued instead.
    fn execute(&mut self, consistency: Consistency, options: ExecuteOptions) -> DriverResult<()>;

    /// Switch to batch mode; subsequent `execute` calls queue statements.
    fn new_batch(&mut self) -> DriverResult<()>;

    /// Issue all queued statements as one atomic (logged) batch.
    fn run_batch(&mut self, consistency: Consistency, options: ExecuteOptions) -> DriverResult<()>;

    /// Poll for completion. `Err` carries the failure of the request.
    fn is_ready(&mut self) -> DriverResult<bool>;

    /// Advance to the next row of the current page.
    fn next_row(&mut self) -> DriverResult<RowState>;

    /// Column `index` of the current row.
    fn field(&self, index: usize) -> Option<&Value>;

    /// `smallint` column or `default` when null / absent / wrong type.
    fn field_i16(&self, index: usize, default: i16) -> i16 {
        self.field(index)
            .and_then(Value::as_i64)
            .and_then(|v| i16::try_from(v).ok())
            .unwrap_or(default)
    }

    /// `int` column or `default`.
    fn field_i32(&self, index: usize, default: i32) -> i32 {
        self.field(index)
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok())
            .unwrap_or(default)
    }

    /// `bigint` column or `default`.
    fn field_i64(&self, index: usize, default: i64) -> i64 {
        self.field(index).and_then(Value::as_i64).unwrap_or(default)
    }

    /// `boolean` column or `default`.
    fn field_bool(&self, index: usize, default: bool) -> bool {
        self.field(index).and_then(Value::as_bool).unwrap_or(default)
    }

    /// `text` column or `default`.
    fn field_str(&self, index: usize, default: &str) -> String {
        self.field(index)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// `blob` column or empty.
    fn field_bytes(&self, index: usize) -> Vec<u8> {
        self.field(index)
            .and_then(Value::as_bytes)
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }

    /// Paging state that resumes at the start of the page currently being
    /// read or fetched. `None` while on the first page and when unpaged.
    fn paging_state(&self) -> Option<PagingState>;

    /// Whether the result set has been fully read.
    fn is_eof(&self) -> bool;

    /// Whether a statement has been issued and not yet closed.
    fn is_active(&self) -> bool;

    /// Release the statement and any pending result.
    fn close(&mut self);

    /// Install (or clear) the data-ready callback.
    fn set_on_data_ready(&mut self, callback: Option<DataReadyCallback>);
}
