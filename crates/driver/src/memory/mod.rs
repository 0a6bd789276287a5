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

//! In-memory reference cluster.
//!
//! ## Purpose
//! Implements [`Connection`] over process-local tables so tasks can be
//! exercised without a real cluster.
//!
//! ## Features
//! - Tables with partition and clustering keys; rows kept in token order
//! - A small statement subset (see [`cql`](self) module docs)
//! - `system.local`, `system.peers` and `system.size_estimates`
//! - Server-side paging, simulated latency and fault injection
//! - Atomic logged batches
//! - A statement log for assertions
//!
//! ## Limitations
//! - Not persistent, not distributed
//! - No TTLs, deletes, lightweight transactions or secondary indexes

mod cql;
mod faults;
mod query;
mod table;

pub use faults::{FaultKind, FaultRule, StatementKind};
pub use query::MemoryQuery;
pub use table::{ClusteringOrder, TableSchema};

use crate::token::{evenly_spaced_tokens, ranges_from_ring};
use crate::{Connection, DriverConfig, DriverError, DriverResult, Query, TokenRange, Value};
use cql::{Insert, Select};
use faults::FaultSet;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use table::Table;
use tracing::debug;

const SYSTEM_KEYSPACE: &str = "system";

/// One statement as seen by the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRecord {
    /// Statement class
    pub kind: StatementKind,
    /// `keyspace.table`
    pub table: String,
    /// Statement text
    pub sql: String,
    /// Bound parameters (unbound slots as `Null`)
    pub params: Vec<Value>,
}

pub(crate) struct ClusterInner {
    config: DriverConfig,
    tables: RwLock<HashMap<String, Table>>,
    ring: RwLock<Vec<i64>>,
    faults: Mutex<FaultSet>,
    log: Mutex<Vec<StatementRecord>>,
}

fn qualified(keyspace: &str, table: &str) -> String {
    format!(
        "{}.{}",
        keyspace.to_ascii_lowercase(),
        table.to_ascii_lowercase()
    )
}

fn unknown(keyspace: &str, table: &str) -> DriverError {
    DriverError::UnknownTable(qualified(keyspace, table))
}

impl ClusterInner {
    pub(crate) fn select(
        &self,
        select: &Select,
        params: &[Option<Value>],
    ) -> DriverResult<Vec<Vec<Value>>> {
        let tables = self.tables.read();
        let table = tables
            .get(&qualified(&select.keyspace, &select.table))
            .ok_or_else(|| unknown(&select.keyspace, &select.table))?;
        table.select(select, params)
    }

    /// Apply inserts atomically: all are validated before any is written.
    pub(crate) fn apply(&self, entries: &[(Insert, Vec<Option<Value>>)]) -> DriverResult<()> {
        let mut tables = self.tables.write();
        let mut prepared = Vec::with_capacity(entries.len());
        for (insert, params) in entries {
            if insert.keyspace == SYSTEM_KEYSPACE {
                return Err(DriverError::InvalidQuery(
                    "system tables are read-only".to_string(),
                ));
            }
            let key = qualified(&insert.keyspace, &insert.table);
            let table = tables
                .get(&key)
                .ok_or_else(|| unknown(&insert.keyspace, &insert.table))?;
            prepared.push((key, table.prepare_insert(insert, params)?));
        }
        for (key, assignments) in prepared {
            if let Some(table) = tables.get_mut(&key) {
                table.upsert(assignments);
            }
        }
        Ok(())
    }

    pub(crate) fn take_fault(
        &self,
        keyspace: &str,
        table: &str,
        kind: StatementKind,
    ) -> Option<faults::FaultKind> {
        let fault = self.faults.lock().take(keyspace, table, kind);
        if let Some(fault) = &fault {
            debug!(table = %qualified(keyspace, table), kind = %kind, ?fault, "injecting fault");
        }
        fault
    }

    pub(crate) fn record(
        &self,
        kind: StatementKind,
        keyspace: &str,
        table: &str,
        sql: &str,
        params: &[Option<Value>],
    ) {
        self.log.lock().push(StatementRecord {
            kind,
            table: qualified(keyspace, table),
            sql: sql.to_string(),
            params: params
                .iter()
                .map(|p| p.clone().unwrap_or(Value::Null))
                .collect(),
        });
    }
}

/// In-memory cluster; cheap to clone, clones share state.
///
/// ## Example
/// ```rust
/// use seqvault_driver::{Connection, DriverConfig};
/// use seqvault_driver::memory::MemoryCluster;
///
/// let cluster = MemoryCluster::new(DriverConfig::default().with_vnodes(4));
/// assert_eq!(cluster.token_ranges().unwrap().len(), 4);
/// ```
#[derive(Clone)]
pub struct MemoryCluster {
    inner: Arc<ClusterInner>,
}

impl MemoryCluster {
    /// Create a cluster with system tables seeded from `config`.
    pub fn new(config: DriverConfig) -> Self {
        let mut tables = HashMap::new();
        for schema in system_schemas() {
            if let Ok(table) = Table::new(schema) {
                tables.insert(table.schema().qualified_name(), table);
            }
        }
        seed_system_tables(&mut tables, &config);
        let ring = evenly_spaced_tokens(config.vnodes);
        Self {
            inner: Arc::new(ClusterInner {
                config,
                tables: RwLock::new(tables),
                ring: RwLock::new(ring),
                faults: Mutex::new(FaultSet::default()),
                log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Cluster configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    /// Register a table. Re-registering an identical schema is a no-op.
    pub fn create_table(&self, schema: TableSchema) -> DriverResult<()> {
        if schema.keyspace() == SYSTEM_KEYSPACE {
            return Err(DriverError::InvalidQuery(
                "cannot create tables in the system keyspace".to_string(),
            ));
        }
        let key = schema.qualified_name();
        let mut tables = self.inner.tables.write();
        if let Some(existing) = tables.get(&key) {
            if *existing.schema() == schema {
                return Ok(());
            }
            return Err(DriverError::InvalidQuery(format!(
                "table {key} already exists with a different schema"
            )));
        }
        let table = Table::new(schema)?;
        debug!(table = %key, "created table");
        tables.insert(key, table);
        Ok(())
    }

    /// Upsert one row given as `(column, value)` pairs.
    pub fn insert_row(
        &self,
        keyspace: &str,
        table: &str,
        row: &[(&str, Value)],
    ) -> DriverResult<()> {
        if keyspace.eq_ignore_ascii_case(SYSTEM_KEYSPACE) {
            return Err(DriverError::InvalidQuery(
                "system tables are read-only".to_string(),
            ));
        }
        let mut tables = self.inner.tables.write();
        let target = tables
            .get_mut(&qualified(keyspace, table))
            .ok_or_else(|| unknown(keyspace, table))?;
        let mut assignments = Vec::with_capacity(row.len());
        for (column, value) in row {
            let index = target
                .schema()
                .column_index(&column.to_ascii_lowercase())
                .ok_or_else(|| {
                    DriverError::InvalidQuery(format!(
                        "unknown column {column} in {keyspace}.{table}"
                    ))
                })?;
            assignments.push((index, value.clone()));
        }
        target.check_primary_key(&assignments)?;
        target.upsert(assignments);
        Ok(())
    }

    /// Number of rows in a table.
    pub fn row_count(&self, keyspace: &str, table: &str) -> DriverResult<usize> {
        self.inner
            .tables
            .read()
            .get(&qualified(keyspace, table))
            .map(Table::row_count)
            .ok_or_else(|| unknown(keyspace, table))
    }

    /// Number of distinct partitions in a table.
    pub fn partition_count(&self, keyspace: &str, table: &str) -> DriverResult<usize> {
        self.inner
            .tables
            .read()
            .get(&qualified(keyspace, table))
            .map(Table::partition_count)
            .ok_or_else(|| unknown(keyspace, table))
    }

    /// Replace the local node's size estimate for a table. The count is
    /// spread over the ring's ranges the way a node reports one row per
    /// owned range.
    pub fn set_size_estimate(
        &self,
        keyspace: &str,
        table: &str,
        partitions_count: i64,
    ) -> DriverResult<()> {
        let keyspace = keyspace.to_ascii_lowercase();
        let table = table.to_ascii_lowercase();
        let ranges = {
            let ring = self.inner.ring.read();
            let ranges = ranges_from_ring(&ring);
            if ranges.is_empty() {
                vec![TokenRange::new(i64::MIN, i64::MAX)]
            } else {
                ranges
            }
        };

        let mut tables = self.inner.tables.write();
        if !tables.contains_key(&qualified(&keyspace, &table)) {
            return Err(unknown(&keyspace, &table));
        }
        let estimates = tables
            .get_mut(&qualified(SYSTEM_KEYSPACE, "size_estimates"))
            .ok_or_else(|| unknown(SYSTEM_KEYSPACE, "size_estimates"))?;
        estimates.retain(|row| {
            !(row[0].as_str() == Some(keyspace.as_str()) && row[1].as_str() == Some(table.as_str()))
        });

        let n = ranges.len() as i64;
        for (i, range) in ranges.iter().enumerate() {
            let share = partitions_count / n + i64::from((i as i64) < partitions_count % n);
            estimates.upsert(vec![
                (0, Value::Text(keyspace.clone())),
                (1, Value::Text(table.clone())),
                (2, Value::Text(range.start.to_string())),
                (3, Value::Text(range.end.to_string())),
                (4, Value::Int64(1024)),
                (5, Value::Int64(share)),
            ]);
        }
        Ok(())
    }

    /// Recompute every user table's size estimate from its actual partition
    /// count, divided evenly among the nodes of the local data center.
    pub fn refresh_size_estimates(&self) -> DriverResult<()> {
        let nodes = self.inner.config.peers + 1;
        let counts: Vec<(String, String, usize)> = {
            let tables = self.inner.tables.read();
            tables
                .values()
                .filter(|t| t.schema().keyspace() != SYSTEM_KEYSPACE)
                .map(|t| {
                    (
                        t.schema().keyspace().to_string(),
                        t.schema().name().to_string(),
                        t.partition_count(),
                    )
                })
                .collect()
        };
        for (keyspace, table, partitions) in counts {
            let per_node = partitions.div_ceil(nodes);
            self.set_size_estimate(&keyspace, &table, per_node as i64)?;
        }
        Ok(())
    }

    /// Replace the ring tokens. An empty ring reports no token ranges.
    pub fn set_ring_tokens(&self, tokens: Vec<i64>) {
        *self.inner.ring.write() = tokens;
    }

    /// Add a fault rule.
    pub fn inject_fault(&self, rule: FaultRule) {
        self.inner.faults.lock().add(rule);
    }

    /// Remove all fault rules.
    pub fn clear_faults(&self) {
        self.inner.faults.lock().clear();
    }

    /// Statements issued so far, oldest first.
    pub fn statements(&self) -> Vec<StatementRecord> {
        self.inner.log.lock().clone()
    }

    /// Forget logged statements.
    pub fn clear_statement_log(&self) {
        self.inner.log.lock().clear();
    }
}

impl Default for MemoryCluster {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

impl Connection for MemoryCluster {
    fn new_query(&self) -> Box<dyn Query> {
        Box::new(MemoryQuery::new(Arc::clone(&self.inner)))
    }

    fn token_ranges(&self) -> DriverResult<Vec<TokenRange>> {
        Ok(ranges_from_ring(&self.inner.ring.read()))
    }

    fn partition_key_column_names(&self, keyspace: &str, table: &str) -> DriverResult<Vec<String>> {
        self.inner
            .tables
            .read()
            .get(&qualified(keyspace, table))
            .map(|t| t.schema().partition_key_names().to_vec())
            .ok_or_else(|| unknown(keyspace, table))
    }
}

fn system_schemas() -> Vec<TableSchema> {
    vec![
        TableSchema::new(SYSTEM_KEYSPACE, "local")
            .columns(&["key", "data_center", "schema_version"])
            .partition_key(&["key"]),
        TableSchema::new(SYSTEM_KEYSPACE, "peers")
            .columns(&["peer", "data_center", "schema_version"])
            .partition_key(&["peer"]),
        TableSchema::new(SYSTEM_KEYSPACE, "size_estimates")
            .columns(&[
                "keyspace_name",
                "table_name",
                "range_start",
                "range_end",
                "mean_partition_size",
                "partitions_count",
            ])
            .partition_key(&["keyspace_name"])
            .clustering("table_name", ClusteringOrder::Asc)
            .clustering("range_start", ClusteringOrder::Asc)
            .clustering("range_end", ClusteringOrder::Asc),
    ]
}

fn seed_system_tables(tables: &mut HashMap<String, Table>, config: &DriverConfig) {
    if let Some(local) = tables.get_mut(&qualified(SYSTEM_KEYSPACE, "local")) {
        local.upsert(vec![
            (0, Value::from("local")),
            (1, Value::from(config.datacenter.as_str())),
            (2, Value::from(config.schema_version.as_str())),
        ]);
    }
    if let Some(peers) = tables.get_mut(&qualified(SYSTEM_KEYSPACE, "peers")) {
        for i in 0..config.peers {
            peers.upsert(vec![
                (0, Value::Text(format!("10.0.0.{}", i + 2))),
                (1, Value::from(config.datacenter.as_str())),
                (2, Value::from(config.schema_version.as_str())),
            ]);
        }
        for i in 0..config.remote_peers {
            peers.upsert(vec![
                (0, Value::Text(format!("10.1.0.{}", i + 2))),
                (1, Value::Text(format!("{}_REMOTE", config.datacenter))),
                (2, Value::from(config.schema_version.as_str())),
            ]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Consistency, ExecuteOptions, RowState};

    fn cluster() -> MemoryCluster {
        let cluster = MemoryCluster::new(DriverConfig::default().with_peers(2));
        cluster
            .create_table(
                TableSchema::new("ks", "t")
                    .columns(&["pk", "v"])
                    .partition_key(&["pk"]),
            )
            .unwrap();
        cluster
    }

    fn read_all(cluster: &MemoryCluster, sql: &str) -> Vec<Vec<Value>> {
        let mut query = cluster.new_query();
        query.set_sql(sql, 0);
        query
            .execute(Consistency::LocalQuorum, ExecuteOptions::default())
            .unwrap();
        let mut rows = Vec::new();
        while query.next_row().unwrap() == RowState::Ready {
            rows.push((0..4).filter_map(|i| query.field(i).cloned()).collect());
        }
        rows
    }

    #[test]
    fn test_system_tables_are_seeded() {
        let cluster = cluster();
        let local = read_all(&cluster, "SELECT data_center, schema_version FROM system.local");
        assert_eq!(local.len(), 1);
        assert_eq!(local[0][0], Value::from("DC1"));
        let peers = read_all(&cluster, "SELECT peer FROM system.peers");
        assert_eq!(peers.len(), 2);
    }

    #[test]
    fn test_create_table_is_idempotent() {
        let cluster = cluster();
        let same = TableSchema::new("ks", "t").columns(&["pk", "v"]).partition_key(&["pk"]);
        assert!(cluster.create_table(same).is_ok());
        let different = TableSchema::new("ks", "t").columns(&["pk"]).partition_key(&["pk"]);
        assert!(cluster.create_table(different).is_err());
    }

    #[test]
    fn test_size_estimates_sum_to_requested_count() {
        let cluster = cluster();
        cluster.set_size_estimate("ks", "t", 1001).unwrap();
        let rows = read_all(
            &cluster,
            "SELECT partitions_count FROM system.size_estimates \
             WHERE keyspace_name = 'ks' AND table_name = 't'",
        );
        assert_eq!(rows.len(), 8);
        let total: i64 = rows.iter().filter_map(|r| r[0].as_i64()).sum();
        assert_eq!(total, 1001);
    }

    #[test]
    fn test_refresh_size_estimates_divides_by_nodes() {
        let cluster = cluster();
        for pk in 0..10 {
            cluster
                .insert_row("ks", "t", &[("pk", Value::Int32(pk))])
                .unwrap();
        }
        cluster.refresh_size_estimates().unwrap();
        let rows = read_all(
            &cluster,
            "SELECT partitions_count FROM system.size_estimates WHERE keyspace_name = 'ks'",
        );
        let total: i64 = rows.iter().filter_map(|r| r[0].as_i64()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_unknown_table() {
        let cluster = cluster();
        assert!(matches!(
            cluster.partition_key_column_names("ks", "missing"),
            Err(DriverError::UnknownTable(_))
        ));
        assert_eq!(
            cluster.partition_key_column_names("KS", "T").unwrap(),
            vec!["pk".to_string()]
        );
    }

    #[test]
    fn test_system_tables_are_read_only() {
        let cluster = cluster();
        assert!(cluster
            .insert_row("system", "local", &[("key", Value::from("x"))])
            .is_err());
    }
}
