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

//! Error types for driver operations.

use std::time::Duration;
use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors reported by a [`Query`](crate::Query) or
/// [`Connection`](crate::Connection).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// The coordinator did not answer within the request timeout
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// Not enough replicas alive to satisfy the consistency level
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Statement text could not be parsed or does not fit the schema
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Parameter binding error (index out of range, missing parameter)
    #[error("Bind error: {0}")]
    Bind(String),

    /// Keyspace or table does not exist
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Operation issued against a query that was never executed or was closed
    #[error("Query not active: {0}")]
    NotActive(String),

    /// Storage-side failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DriverError {
    /// Transient errors are worth re-issuing the query for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DriverError::Timeout(_) | DriverError::Unavailable(_))
    }
}

impl From<seqvault_common::EnvError> for DriverError {
    fn from(err: seqvault_common::EnvError) -> Self {
        DriverError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DriverError::Timeout(Duration::from_millis(10)).is_retryable());
        assert!(DriverError::Unavailable("1 of 3 replicas".into()).is_retryable());
        assert!(!DriverError::InvalidQuery("bad".into()).is_retryable());
        assert!(!DriverError::Backend("disk".into()).is_retryable());
        assert!(!DriverError::NotActive("closed".into()).is_retryable());
    }
}
