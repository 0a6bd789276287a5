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

//! Splitting a full-table scan into token-range queries.

use crate::error::{
    ContractError, ContractResult, DriveError, ErrorCode, RestartCause, Severity, TaskError,
};
use crate::machine::{HandleId, Pull, Readiness, TaskCore};
use crate::records::{column_list, RawRow};
use crate::runtime::drive_blocking;
use crate::state::{Progress, TaskState};
use crate::statement::Statement;
use crate::task::{Task, TaskBuilder};
use seqvault_driver::{Connection, DriverResult, TokenRange, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Extra `WHERE` condition applied to every scan query, with its
/// parameters. Bound after the token-range bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFilter {
    /// Condition text, e.g. `"flags = ?"`
    pub where_clause: String,
    /// Values for the condition's placeholders
    pub params: Vec<Value>,
}

impl ScanFilter {
    /// Condition with parameters.
    pub fn new(where_clause: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            where_clause: where_clause.into(),
            params,
        }
    }
}

/// One query of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanQuery {
    /// Statement with bounds and filter parameters bound
    pub statement: Statement,
    /// Range covered, or `None` for a single whole-table query
    pub range: Option<TokenRange>,
}

/// Queries covering a table, consumed last-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPlan {
    table: String,
    queries: Vec<ScanQuery>,
    estimate: i64,
}

impl ScanPlan {
    pub(crate) fn new(table: &str, queries: Vec<ScanQuery>, estimate: i64) -> Self {
        Self {
            table: table.to_string(),
            queries,
            estimate,
        }
    }

    /// Table scanned.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Take the next query.
    pub fn pop(&mut self) -> Option<ScanQuery> {
        self.queries.pop()
    }

    /// Put a query back; it is the next one popped.
    pub fn push(&mut self, query: ScanQuery) {
        self.queries.push(query);
    }

    /// Queries left.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Nothing (left) to scan.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Queries left, in pop order reversed.
    pub fn queries(&self) -> &[ScanQuery] {
        &self.queries
    }

    /// Estimated partition count of the table.
    pub fn estimate(&self) -> i64 {
        self.estimate
    }
}

/// What to scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanTarget {
    table: String,
    columns: Vec<String>,
    filter: Option<ScanFilter>,
    min_partitions_for_subrange_scan: i64,
}

impl ScanTarget {
    fn select(&self, keyspace: &str) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            column_list(&self.columns.iter().map(String::as_str).collect::<Vec<_>>())
        };
        format!("SELECT {columns} FROM {keyspace}.{}", self.table)
    }

    fn whole_table(&self, keyspace: &str) -> ScanQuery {
        let mut sql = self.select(keyspace);
        let mut statement_params = Vec::new();
        if let Some(filter) = &self.filter {
            sql.push_str(&format!(" WHERE {} ALLOW FILTERING", filter.where_clause));
            statement_params.extend(filter.params.iter().cloned());
        }
        let mut statement = Statement::new(sql);
        for param in statement_params {
            statement.push(param);
        }
        ScanQuery {
            statement,
            range: None,
        }
    }

    fn for_range(&self, keyspace: &str, partition_key: &str, range: TokenRange) -> ScanQuery {
        let mut sql = format!(
            "{} WHERE TOKEN({partition_key}) > ? AND TOKEN({partition_key}) <= ?",
            self.select(keyspace)
        );
        let mut statement_params = vec![Value::Int64(range.start), Value::Int64(range.end)];
        if let Some(filter) = &self.filter {
            sql.push_str(&format!(" AND {} ALLOW FILTERING", filter.where_clause));
            statement_params.extend(filter.params.iter().cloned());
        }
        let mut statement = Statement::new(sql);
        for param in statement_params {
            statement.push(param);
        }
        ScanQuery {
            statement,
            range: Some(range),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Local,
    Peers,
    Estimates,
}

/// Estimates a table's size from the system tables and plans its scan.
pub struct FullscanPlanTask {
    core: TaskCore,
    target: ScanTarget,
    phase: Phase,
    handle: Option<HandleId>,
    local: Option<(String, String)>,
    peers: i64,
    partitions: i64,
    plan: Option<ScanPlan>,
}

impl FullscanPlanTask {
    const KIND: &'static str = "fullscan_plan";

    /// Builder for planning a scan of `table`.
    pub fn builder(
        connection: Arc<dyn Connection>,
        keyspace: &str,
        table: &str,
    ) -> TaskBuilder<ScanTarget> {
        TaskBuilder::new(
            connection,
            keyspace,
            ScanTarget {
                table: table.to_string(),
                columns: Vec::new(),
                filter: None,
                min_partitions_for_subrange_scan: 0,
            },
        )
    }

    /// The plan, once `Done`.
    pub fn plan(&self) -> Option<&ScanPlan> {
        self.plan.as_ref()
    }

    /// Take the plan, once `Done`.
    pub fn take_plan(&mut self) -> Option<ScanPlan> {
        self.plan.take()
    }

    fn statement(&self) -> Statement {
        match self.phase {
            Phase::Local => Statement::new("SELECT data_center, schema_version FROM system.local"),
            Phase::Peers => Statement::new("SELECT data_center, schema_version FROM system.peers"),
            Phase::Estimates => Statement::new(
                "SELECT partitions_count FROM system.size_estimates \
                 WHERE keyspace_name = ? AND table_name = ?",
            )
            .bind(self.core.keyspace())
            .bind(self.target.table.as_str()),
        }
    }

    fn start(&mut self) -> ContractResult<Progress> {
        if !self.core.may_start() {
            return Ok(Progress::Wait);
        }
        if self.phase == Phase::Local {
            self.local = None;
            self.peers = 0;
            self.partitions = 0;
        }
        match self.core.issue(&self.statement(), true, Default::default()) {
            Ok(handle) => {
                self.handle = Some(handle);
                self.core.set_state(TaskState::FetchStarted);
            }
            Err(err) => self.on_driver_error(err),
        }
        Ok(Progress::Continue)
    }

    fn on_driver_error(&mut self, err: seqvault_driver::DriverError) {
        self.phase = Phase::Local;
        self.handle = None;
        self.core.on_driver_error(err);
    }

    fn restart(&mut self, cause: RestartCause) {
        self.phase = Phase::Local;
        self.handle = None;
        self.core.restart(cause);
    }

    fn accept(&mut self, row: RawRow) {
        let text = |i: usize| row.0.get(i).and_then(Value::as_str).map(str::to_string);
        match self.phase {
            Phase::Local => {
                if self.local.is_none() {
                    if let (Some(dc), Some(schema)) = (text(0), text(1)) {
                        self.local = Some((dc, schema));
                    }
                }
            }
            Phase::Peers => {
                if let (Some((dc, schema)), Some(peer_dc), Some(peer_schema)) =
                    (&self.local, text(0), text(1))
                {
                    if *dc == peer_dc && *schema == peer_schema {
                        self.peers += 1;
                    }
                }
            }
            Phase::Estimates => {
                self.partitions += row.0.first().and_then(Value::as_i64).unwrap_or(0);
            }
        }
    }

    /// End of one system-table read: move to the next, or produce the plan.
    fn advance(&mut self) {
        self.handle = None;
        match self.phase {
            Phase::Local => {
                if self.local.is_none() {
                    self.core.fail(TaskError::new(
                        502,
                        ErrorCode::Backend,
                        Severity::Error,
                        "system.local returned no rows",
                    ));
                    return;
                }
                self.phase = Phase::Peers;
                self.core.set_state(TaskState::Init);
            }
            Phase::Peers => {
                self.phase = Phase::Estimates;
                self.core.set_state(TaskState::Init);
            }
            Phase::Estimates => match self.build_plan() {
                Ok(plan) => {
                    debug!(
                        task_id = %self.core.id(),
                        table = %self.target.table,
                        estimate = plan.estimate(),
                        queries = plan.len(),
                        "scan planned"
                    );
                    self.plan = Some(plan);
                    self.core.finish();
                }
                Err(err) => self.on_driver_error(err),
            },
        }
    }

    fn build_plan(&self) -> DriverResult<ScanPlan> {
        let estimate = self.partitions.saturating_mul(self.peers + 1);
        let keyspace = self.core.keyspace();
        if estimate <= self.target.min_partitions_for_subrange_scan {
            return Ok(ScanPlan::new(
                &self.target.table,
                vec![self.target.whole_table(keyspace)],
                estimate,
            ));
        }
        let connection = self.core.connection();
        let ranges = connection.token_ranges()?;
        let partition_key = connection
            .partition_key_column_names(keyspace, &self.target.table)?
            .join(", ");
        let queries = ranges
            .into_iter()
            .map(|range| self.target.for_range(keyspace, &partition_key, range))
            .collect();
        Ok(ScanPlan::new(&self.target.table, queries, estimate))
    }

    fn drain(&mut self) -> ContractResult<Progress> {
        let Some(handle) = self.handle else {
            return Err(ContractError::UnexpectedState {
                state: self.core.state(),
            });
        };
        match self.core.check_ready(handle) {
            Readiness::Pending => return Ok(Progress::Wait),
            Readiness::Ready => {}
            Readiness::NeedRestart(cause) => {
                self.restart(cause);
                return Ok(Progress::Continue);
            }
            Readiness::Failed(err) => {
                self.handle = None;
                self.core.fail(TaskError::from_driver(&err));
                return Ok(Progress::Continue);
            }
        }
        self.core.set_state(TaskState::WaitingForFetch);
        loop {
            match self.core.pull::<RawRow>(handle) {
                Ok(Pull::Row(row)) => self.accept(row),
                Ok(Pull::Page) => return Ok(Progress::Continue),
                Ok(Pull::Eof) => {
                    self.core.release(handle);
                    self.advance();
                    return Ok(Progress::Continue);
                }
                Err(err) => {
                    self.on_driver_error(err);
                    return Ok(Progress::Continue);
                }
            }
        }
    }
}

impl Task for FullscanPlanTask {
    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn step(&mut self) -> ContractResult<Progress> {
        match self.core.state() {
            TaskState::Init => self.start(),
            TaskState::FetchStarted | TaskState::WaitingForFetch => self.drain(),
            state => Err(ContractError::UnexpectedState { state }),
        }
    }
}

impl TaskBuilder<ScanTarget> {
    /// Columns selected, in order. Defaults to `*`.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.params.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Condition applied to every query.
    pub fn filter(mut self, filter: ScanFilter) -> Self {
        self.params.filter = Some(filter);
        self
    }

    /// Estimated partition count above which the scan is split by token
    /// range.
    pub fn min_partitions_for_subrange_scan(mut self, min: i64) -> Self {
        self.options.min_partitions_for_subrange_scan = min;
        self
    }

    /// Finish building.
    pub fn build(self) -> FullscanPlanTask {
        let table = self.params.table.clone();
        let min_partitions = self.options.min_partitions_for_subrange_scan;
        let (core, mut target) = TaskCore::from_builder(FullscanPlanTask::KIND, &table, self);
        target.min_partitions_for_subrange_scan = min_partitions;
        FullscanPlanTask {
            core,
            target,
            phase: Phase::Local,
            handle: None,
            local: None,
            peers: 0,
            partitions: 0,
            plan: None,
        }
    }
}

/// Plans scans on the calling thread.
pub struct FullscanPlanner;

impl FullscanPlanner {
    /// Drive a plan task to completion and return its plan. An empty plan
    /// means there is nothing to scan.
    #[instrument(skip(builder), fields(table = %builder.params.table))]
    pub fn generate(
        builder: TaskBuilder<ScanTarget>,
        timeout: Duration,
    ) -> Result<ScanPlan, DriveError> {
        let mut task = builder.build();
        drive_blocking(&mut task, timeout)?;
        let plan = task.take_plan().unwrap_or_default();
        info!(
            estimate = plan.estimate(),
            queries = plan.len(),
            "generated fullscan plan"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(filter: Option<ScanFilter>) -> ScanTarget {
        ScanTarget {
            table: "t".to_string(),
            columns: vec!["pk".to_string(), "v".to_string()],
            filter,
            min_partitions_for_subrange_scan: 10,
        }
    }

    #[test]
    fn test_whole_table_query() {
        let query = target(None).whole_table("ks");
        assert_eq!(query.statement.sql(), "SELECT pk, v FROM ks.t");
        assert!(query.statement.params().is_empty());
        assert_eq!(query.range, None);
    }

    #[test]
    fn test_filtered_whole_table_query() {
        let filter = ScanFilter::new("v = ?", vec![Value::Int32(3)]);
        let query = target(Some(filter)).whole_table("ks");
        assert_eq!(
            query.statement.sql(),
            "SELECT pk, v FROM ks.t WHERE v = ? ALLOW FILTERING"
        );
        assert_eq!(query.statement.params(), [Value::Int32(3)]);
    }

    #[test]
    fn test_range_bounds_bind_before_filter() {
        let filter = ScanFilter::new("v = ?", vec![Value::Int32(3)]);
        let query = target(Some(filter)).for_range("ks", "pk", TokenRange::new(-5, 5));
        assert_eq!(
            query.statement.sql(),
            "SELECT pk, v FROM ks.t WHERE TOKEN(pk) > ? AND TOKEN(pk) <= ? \
             AND v = ? ALLOW FILTERING"
        );
        assert_eq!(
            query.statement.params(),
            [Value::Int64(-5), Value::Int64(5), Value::Int32(3)]
        );
        assert_eq!(query.range, Some(TokenRange::new(-5, 5)));
    }

    #[test]
    fn test_plan_pops_last_first() {
        let t = target(None);
        let mut plan = ScanPlan::new(
            "t",
            vec![
                t.for_range("ks", "pk", TokenRange::new(0, 1)),
                t.for_range("ks", "pk", TokenRange::new(1, 2)),
            ],
            100,
        );
        assert_eq!(plan.pop().and_then(|q| q.range), Some(TokenRange::new(1, 2)));
        assert_eq!(plan.len(), 1);
    }
}
