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

//! Fault injection for the in-memory cluster.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Statement class a fault rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    /// Initial execution of a `SELECT`
    Select,
    /// Single `INSERT`
    Insert,
    /// Statement inside a logged batch
    Batch,
    /// Request for the next page of a `SELECT`
    PageFetch,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Batch => "batch",
            StatementKind::PageFetch => "page_fetch",
        };
        f.write_str(name)
    }
}

/// What happens to a statement matched by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// Fail with `DriverError::Timeout`
    Timeout,
    /// Fail with `DriverError::Unavailable`
    Unavailable,
    /// Never complete; the query reports `Timeout` once its deadline passes
    Hang,
    /// Fail with `DriverError::Backend`
    Backend(String),
}

/// Injected failure, optionally restricted to a table, a statement kind and
/// a number of occurrences.
///
/// ```rust
/// use seqvault_driver::memory::{FaultRule, StatementKind};
///
/// let rule = FaultRule::timeout()
///     .on_table("blob_prop")
///     .on(StatementKind::Select)
///     .times(2);
/// assert_eq!(rule.remaining(), Some(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultRule {
    kind: FaultKind,
    table: Option<String>,
    statement: Option<StatementKind>,
    remaining: Option<usize>,
}

impl FaultRule {
    fn new(kind: FaultKind) -> Self {
        Self {
            kind,
            table: None,
            statement: None,
            remaining: None,
        }
    }

    /// Fail with a timeout.
    pub fn timeout() -> Self {
        Self::new(FaultKind::Timeout)
    }

    /// Fail with unavailability.
    pub fn unavailable() -> Self {
        Self::new(FaultKind::Unavailable)
    }

    /// Never complete.
    pub fn hang() -> Self {
        Self::new(FaultKind::Hang)
    }

    /// Fail with a non-retryable backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Backend(message.into()))
    }

    /// Only statements against `table` (bare or `keyspace.table`).
    pub fn on_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into().to_ascii_lowercase());
        self
    }

    /// Only statements of `kind`.
    pub fn on(mut self, kind: StatementKind) -> Self {
        self.statement = Some(kind);
        self
    }

    /// Only the first `n` matching statements.
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    /// Matches left, `None` for unlimited.
    pub fn remaining(&self) -> Option<usize> {
        self.remaining
    }

    /// Fault applied on match.
    pub fn kind(&self) -> &FaultKind {
        &self.kind
    }

    fn matches(&self, keyspace: &str, table: &str, kind: StatementKind) -> bool {
        if self.remaining == Some(0) {
            return false;
        }
        if self.statement.is_some_and(|s| s != kind) {
            return false;
        }
        match &self.table {
            None => true,
            Some(t) => t == table || *t == format!("{keyspace}.{table}"),
        }
    }
}

/// Active rules, consulted in insertion order.
#[derive(Debug, Default)]
pub(crate) struct FaultSet {
    rules: Vec<FaultRule>,
}

impl FaultSet {
    pub(crate) fn add(&mut self, rule: FaultRule) {
        self.rules.push(rule);
    }

    pub(crate) fn clear(&mut self) {
        self.rules.clear();
    }

    /// Consume one occurrence of the first matching rule.
    pub(crate) fn take(
        &mut self,
        keyspace: &str,
        table: &str,
        kind: StatementKind,
    ) -> Option<FaultKind> {
        let rule = self
            .rules
            .iter_mut()
            .find(|rule| rule.matches(keyspace, table, kind))?;
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        let fault = rule.kind.clone();
        self.rules.retain(|rule| rule.remaining != Some(0));
        Some(fault)
    }
}
