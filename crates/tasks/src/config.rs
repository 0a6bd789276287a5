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

//! Task configuration.
//!
//! ## Environment Variables
//! - `SEQVAULT_KEYSPACE`: keyspace (default `seqvault`)
//! - `SEQVAULT_CONSISTENCY`: consistency level (default `LOCAL_QUORUM`)
//! - `SEQVAULT_PAGE_SIZE`: rows per page (default 1000)
//! - `SEQVAULT_QUERY_TIMEOUT_MS`: per-request timeout (default 5000)
//! - `SEQVAULT_MAX_RETRIES`: restarts before failing (default 3)
//! - `SEQVAULT_RETRY_INITIAL_DELAY_MS`: first backoff delay (default 0)
//! - `SEQVAULT_RETRY_MAX_DELAY_MS`: backoff cap (default 1000)
//! - `SEQVAULT_RETRY_BACKOFF_FACTOR`: backoff multiplier (default 2.0)
//! - `SEQVAULT_MIN_PARTITIONS_FOR_SUBRANGE_SCAN`: fullscan split threshold
//!   (default 10000)
//! - `SEQVAULT_MAX_ACTIVE_QUERIES`: concurrent range queries of a fullscan
//!   (default 4)
//!
//! ## Examples
//! ```bash
//! export SEQVAULT_KEYSPACE=idmain2
//! export SEQVAULT_CONSISTENCY=local_one
//! export SEQVAULT_MAX_RETRIES=5
//! ```

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use seqvault_common::{env_parse, env_string};
use seqvault_driver::Consistency;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defaults applied by task builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Keyspace holding the task tables
    pub keyspace: String,
    /// Consistency level for reads and writes
    pub consistency: Consistency,
    /// Rows per page for paged reads
    pub page_size: u32,
    /// Per-request timeout in milliseconds
    pub query_timeout_ms: u64,
    /// Restarts allowed before a task fails
    pub max_retries: u32,
    /// First backoff delay in milliseconds
    pub retry_initial_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub retry_max_delay_ms: u64,
    /// Backoff multiplier
    pub retry_backoff_factor: f64,
    /// Estimated partition count above which a fullscan is split by token range
    pub min_partitions_for_subrange_scan: i64,
    /// Range queries a fullscan keeps in flight
    pub max_active_queries: usize,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            keyspace: "seqvault".to_string(),
            consistency: Consistency::LocalQuorum,
            page_size: 1000,
            query_timeout_ms: 5000,
            max_retries: 3,
            retry_initial_delay_ms: 0,
            retry_max_delay_ms: 1000,
            retry_backoff_factor: 2.0,
            min_partitions_for_subrange_scan: 10_000,
            max_active_queries: 4,
        }
    }
}

impl TaskConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let config = Self {
            keyspace: env_string("SEQVAULT_KEYSPACE", &d.keyspace),
            consistency: env_parse("SEQVAULT_CONSISTENCY", d.consistency)?,
            page_size: env_parse("SEQVAULT_PAGE_SIZE", d.page_size)?,
            query_timeout_ms: env_parse("SEQVAULT_QUERY_TIMEOUT_MS", d.query_timeout_ms)?,
            max_retries: env_parse("SEQVAULT_MAX_RETRIES", d.max_retries)?,
            retry_initial_delay_ms: env_parse(
                "SEQVAULT_RETRY_INITIAL_DELAY_MS",
                d.retry_initial_delay_ms,
            )?,
            retry_max_delay_ms: env_parse("SEQVAULT_RETRY_MAX_DELAY_MS", d.retry_max_delay_ms)?,
            retry_backoff_factor: env_parse(
                "SEQVAULT_RETRY_BACKOFF_FACTOR",
                d.retry_backoff_factor,
            )?,
            min_partitions_for_subrange_scan: env_parse(
                "SEQVAULT_MIN_PARTITIONS_FOR_SUBRANGE_SCAN",
                d.min_partitions_for_subrange_scan,
            )?,
            max_active_queries: env_parse("SEQVAULT_MAX_ACTIVE_QUERIES", d.max_active_queries)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keyspace.is_empty() {
            return Err(ConfigError::Invalid("keyspace must not be empty".to_string()));
        }
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("query timeout must be positive".to_string()));
        }
        if self.max_active_queries == 0 {
            return Err(ConfigError::Invalid(
                "max active queries must be positive".to_string(),
            ));
        }
        if !(self.retry_backoff_factor.is_finite() && self.retry_backoff_factor >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "backoff factor must be >= 1.0, got {}",
                self.retry_backoff_factor
            )));
        }
        Ok(())
    }

    /// Per-request timeout.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Retry policy described by this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            backoff_factor: self.retry_backoff_factor,
        }
    }
}
