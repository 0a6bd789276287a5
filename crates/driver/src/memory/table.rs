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

//! Table schema, row storage and statement evaluation.

use super::cql::{CmpOp, Condition, Insert, Operand, Projection, Select};
use crate::token::token_of;
use crate::{DriverError, DriverResult, Value};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, HashSet};

/// Sort order of a clustering column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusteringOrder {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

/// Table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    keyspace: String,
    name: String,
    columns: Vec<String>,
    partition_key: Vec<String>,
    clustering: Vec<(String, ClusteringOrder)>,
}

impl TableSchema {
    /// Start a definition of `keyspace.name`.
    pub fn new(keyspace: &str, name: &str) -> Self {
        Self {
            keyspace: keyspace.to_ascii_lowercase(),
            name: name.to_ascii_lowercase(),
            columns: Vec::new(),
            partition_key: Vec::new(),
            clustering: Vec::new(),
        }
    }

    /// All columns, in `SELECT *` order.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_ascii_lowercase()).collect();
        self
    }

    /// Partition key columns, in key order.
    pub fn partition_key(mut self, columns: &[&str]) -> Self {
        self.partition_key = columns.iter().map(|c| c.to_ascii_lowercase()).collect();
        self
    }

    /// Append a clustering column.
    pub fn clustering(mut self, column: &str, order: ClusteringOrder) -> Self {
        self.clustering.push((column.to_ascii_lowercase(), order));
        self
    }

    /// Keyspace name.
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `keyspace.name`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.name)
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Partition key column names.
    pub fn partition_key_names(&self) -> &[String] {
        &self.partition_key
    }

    pub(crate) fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn is_primary_key(&self, name: &str) -> bool {
        self.partition_key.iter().any(|c| c == name)
            || self.clustering.iter().any(|(c, _)| c == name)
    }

    pub(crate) fn validate(&self) -> DriverResult<()> {
        if self.columns.is_empty() {
            return Err(DriverError::InvalidQuery(format!(
                "{} has no columns",
                self.qualified_name()
            )));
        }
        if self.partition_key.is_empty() {
            return Err(DriverError::InvalidQuery(format!(
                "{} has no partition key",
                self.qualified_name()
            )));
        }
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column) {
                return Err(DriverError::InvalidQuery(format!("duplicate column {column}")));
            }
        }
        let keys = self
            .partition_key
            .iter()
            .chain(self.clustering.iter().map(|(c, _)| c));
        for key in keys {
            if self.column_index(key).is_none() {
                return Err(DriverError::InvalidQuery(format!(
                    "key column {key} is not a column of {}",
                    self.qualified_name()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ClusteringValue {
    Asc(Value),
    Desc(Reverse<Value>),
}

/// Storage order: token, then partition key, then clustering key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RowKey {
    token: i64,
    partition: Vec<Value>,
    clustering: Vec<ClusteringValue>,
}

/// A table's schema plus its rows.
#[derive(Debug)]
pub(crate) struct Table {
    schema: TableSchema,
    partition_idx: Vec<usize>,
    clustering_idx: Vec<(usize, ClusteringOrder)>,
    rows: BTreeMap<RowKey, Vec<Value>>,
}

/// Compare for range conditions. Integers compare across widths; values of
/// different types never satisfy a condition.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return Some(a.cmp(&b));
    }
    if std::mem::discriminant(left) == std::mem::discriminant(right) {
        return Some(left.cmp(right));
    }
    None
}

fn bound(condition: &Condition, params: &[Option<Value>]) -> DriverResult<Value> {
    let operand: &Operand = match condition {
        Condition::Column { operand, .. } | Condition::Token { operand, .. } => operand,
    };
    operand.resolve(params)
}

impl Table {
    pub(crate) fn new(schema: TableSchema) -> DriverResult<Self> {
        schema.validate()?;
        let partition_idx = schema
            .partition_key
            .iter()
            .filter_map(|c| schema.column_index(c))
            .collect();
        let clustering_idx = schema
            .clustering
            .iter()
            .filter_map(|(c, order)| schema.column_index(c).map(|i| (i, *order)))
            .collect();
        Ok(Self {
            schema,
            partition_idx,
            clustering_idx,
            rows: BTreeMap::new(),
        })
    }

    pub(crate) fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub(crate) fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn partition_count(&self) -> usize {
        let mut count = 0;
        let mut last: Option<(i64, &Vec<Value>)> = None;
        for key in self.rows.keys() {
            let current = (key.token, &key.partition);
            if last != Some(current) {
                count += 1;
                last = Some(current);
            }
        }
        count
    }

    /// Keep only rows for which `keep` returns true.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&[Value]) -> bool) {
        self.rows.retain(|_, row| keep(row));
    }

    fn key_of(&self, row: &[Value]) -> RowKey {
        let partition: Vec<Value> = self.partition_idx.iter().map(|&i| row[i].clone()).collect();
        let clustering = self
            .clustering_idx
            .iter()
            .map(|&(i, order)| match order {
                ClusteringOrder::Asc => ClusteringValue::Asc(row[i].clone()),
                ClusteringOrder::Desc => ClusteringValue::Desc(Reverse(row[i].clone())),
            })
            .collect();
        RowKey {
            token: token_of(&partition),
            partition,
            clustering,
        }
    }

    /// Resolve an insert into column assignments, validating the primary key.
    pub(crate) fn prepare_insert(
        &self,
        insert: &Insert,
        params: &[Option<Value>],
    ) -> DriverResult<Vec<(usize, Value)>> {
        let mut assignments = Vec::with_capacity(insert.columns.len());
        for (column, operand) in insert.columns.iter().zip(&insert.values) {
            let index = self.schema.column_index(column).ok_or_else(|| {
                DriverError::InvalidQuery(format!(
                    "unknown column {column} in {}",
                    self.schema.qualified_name()
                ))
            })?;
            assignments.push((index, operand.resolve(params)?));
        }
        self.check_primary_key(&assignments)?;
        Ok(assignments)
    }

    pub(crate) fn check_primary_key(&self, assignments: &[(usize, Value)]) -> DriverResult<()> {
        let key_columns = self
            .partition_idx
            .iter()
            .copied()
            .chain(self.clustering_idx.iter().map(|&(i, _)| i));
        for index in key_columns {
            let present = assignments
                .iter()
                .any(|(i, value)| *i == index && !value.is_null());
            if !present {
                return Err(DriverError::InvalidQuery(format!(
                    "missing primary key column {} in {}",
                    self.schema.columns[index],
                    self.schema.qualified_name()
                )));
            }
        }
        Ok(())
    }

    /// Upsert: columns not assigned keep their previous value.
    pub(crate) fn upsert(&mut self, assignments: Vec<(usize, Value)>) {
        let mut row = vec![Value::Null; self.schema.columns.len()];
        for (index, value) in &assignments {
            row[*index] = value.clone();
        }
        let key = self.key_of(&row);
        let entry = self.rows.entry(key).or_insert(row);
        for (index, value) in assignments {
            entry[index] = value;
        }
    }

    /// Evaluate a `SELECT`, returning projected rows in storage order.
    pub(crate) fn select(
        &self,
        select: &Select,
        params: &[Option<Value>],
    ) -> DriverResult<Vec<Vec<Value>>> {
        let qualified = self.schema.qualified_name();
        let projection: Vec<usize> = match &select.projection {
            Projection::All => (0..self.schema.columns.len()).collect(),
            Projection::Columns(names) => names
                .iter()
                .map(|name| {
                    self.schema.column_index(name).ok_or_else(|| {
                        DriverError::InvalidQuery(format!("unknown column {name} in {qualified}"))
                    })
                })
                .collect::<DriverResult<_>>()?,
        };

        let mut column_filters: Vec<(usize, CmpOp, Value)> = Vec::new();
        let mut token_filters: Vec<(CmpOp, i64)> = Vec::new();
        for condition in &select.conditions {
            let value = bound(condition, params)?;
            match condition {
                Condition::Column { column, op, .. } => {
                    let index = self.schema.column_index(column).ok_or_else(|| {
                        DriverError::InvalidQuery(format!("unknown column {column} in {qualified}"))
                    })?;
                    column_filters.push((index, *op, value));
                }
                Condition::Token { columns, op, .. } => {
                    if *columns != self.schema.partition_key {
                        return Err(DriverError::InvalidQuery(format!(
                            "TOKEN() must name the partition key of {qualified}"
                        )));
                    }
                    let token = value.as_i64().ok_or_else(|| {
                        DriverError::Bind(format!("token bound must be a bigint, got {value}"))
                    })?;
                    token_filters.push((*op, token));
                }
            }
        }
        self.check_restrictions(select, &column_filters)?;

        let partition_eq: Option<Vec<Value>> = self
            .partition_idx
            .iter()
            .map(|&i| {
                column_filters
                    .iter()
                    .find(|(c, op, _)| *c == i && *op == CmpOp::Eq)
                    .map(|(_, _, v)| v.clone())
            })
            .collect();
        let direct_token = partition_eq.as_deref().map(token_of);

        let rows = self
            .rows
            .iter()
            .filter(|(key, _)| direct_token.map_or(true, |t| key.token == t))
            .filter(|(key, _)| {
                token_filters
                    .iter()
                    .all(|(op, bound)| op.accepts(key.token.cmp(bound)))
            })
            .filter(|(_, row)| {
                column_filters.iter().all(|(index, op, value)| {
                    compare(&row[*index], value).is_some_and(|o| op.accepts(o))
                })
            })
            .map(|(_, row)| projection.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(rows)
    }

    /// Reject filters a real coordinator would refuse without
    /// `ALLOW FILTERING`.
    fn check_restrictions(
        &self,
        select: &Select,
        column_filters: &[(usize, CmpOp, Value)],
    ) -> DriverResult<()> {
        if select.allow_filtering {
            return Ok(());
        }
        let needs_filtering = || {
            DriverError::InvalidQuery(format!(
                "filtering {} requires ALLOW FILTERING",
                self.schema.qualified_name()
            ))
        };
        let restricted = |index: usize, eq_only: bool| {
            column_filters
                .iter()
                .any(|(c, op, _)| *c == index && (!eq_only || *op == CmpOp::Eq))
        };
        for (index, _, _) in column_filters {
            let name = &self.schema.columns[*index];
            if !self.schema.is_primary_key(name) {
                return Err(needs_filtering());
            }
        }
        let partition_restricted = self.partition_idx.iter().all(|&i| restricted(i, true));
        let any_partition = self.partition_idx.iter().any(|&i| restricted(i, false));
        if any_partition && !partition_restricted {
            return Err(needs_filtering());
        }
        // clustering restrictions must form a prefix of equalities, optionally
        // ending in one range
        let mut prefix_open = true;
        for &(index, _) in &self.clustering_idx {
            let eq = restricted(index, true);
            let any = restricted(index, false);
            if any && (!prefix_open || !partition_restricted) {
                return Err(needs_filtering());
            }
            if !eq {
                prefix_open = false;
            }
        }
        Ok(())
    }
}
