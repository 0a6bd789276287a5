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

//! The `Connection` trait and token ranges.

use crate::{DriverResult, Query};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open slice `(start, end]` of the partitioner's token space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenRange {
    /// Exclusive lower bound
    pub start: i64,
    /// Inclusive upper bound
    pub end: i64,
}

impl TokenRange {
    /// Create a range `(start, end]`.
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Whether `token` falls in `(start, end]`.
    pub fn contains(&self, token: i64) -> bool {
        self.start < token && token <= self.end
    }

    /// A range with `start >= end` holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for TokenRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.start, self.end)
    }
}

/// Shared session to the store. Implementations must be internally
/// thread-safe; tasks share one connection through an `Arc`.
pub trait Connection: Send + Sync {
    /// Allocate a new, idle query.
    fn new_query(&self) -> Box<dyn Query>;

    /// Token ranges of the ring. Together they cover the token space once.
    fn token_ranges(&self) -> DriverResult<Vec<TokenRange>>;

    /// Partition key column names of `keyspace.table`, in key order.
    fn partition_key_column_names(&self, keyspace: &str, table: &str) -> DriverResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_half_open() {
        let range = TokenRange::new(-10, 10);
        assert!(!range.contains(-10));
        assert!(range.contains(-9));
        assert!(range.contains(10));
        assert!(!range.contains(11));
        assert_eq!(range.to_string(), "(-10, 10]");
    }

    #[test]
    fn test_empty_range() {
        assert!(TokenRange::new(5, 5).is_empty());
        assert!(!TokenRange::new(i64::MIN, i64::MAX).is_empty());
    }
}
