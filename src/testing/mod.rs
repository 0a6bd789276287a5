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

//! Seeded in-memory cluster for examples and end-to-end tests.
//!
//! A [`Fixture`] owns a [`MemoryCluster`] with every task table created in
//! its keyspace and a small, fixed set of genomic sample records loaded.
//! Size estimates are refreshed after seeding so fullscan planning sees the
//! real partition counts.

mod samples;

pub use samples::{
    sample_bioseq_info, sample_blobs, sample_split_history, sample_status_history,
    SAMPLE_SAT_KEYS,
};

use seqvault_driver::memory::MemoryCluster;
use seqvault_driver::{Connection, DriverConfig, DriverError, Value};
use seqvault_tasks::schema::{
    create_tables, BIOSEQ_INFO, BLOB_PROP, BLOB_SPLIT_HISTORY, BLOB_STATUS_HISTORY,
};
use seqvault_tasks::{
    BioseqInfoRecord, BlobRecord, SplitHistoryRecord, StatusHistoryRecord, TaskConfig,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors while building a fixture.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// The cluster rejected a table or row
    #[error("Failed to seed cluster: {0}")]
    Seed(#[from] DriverError),
}

/// Seeded cluster plus the task settings that go with it.
#[derive(Clone)]
pub struct Fixture {
    cluster: MemoryCluster,
    config: TaskConfig,
}

impl Fixture {
    /// Default cluster, keyspace `seqvault`, all samples loaded.
    pub fn new() -> Result<Self, FixtureError> {
        Self::with_config(DriverConfig::default(), TaskConfig::default())
    }

    /// Cluster and task settings of the caller's choosing.
    pub fn with_config(driver: DriverConfig, config: TaskConfig) -> Result<Self, FixtureError> {
        let fixture = Self::empty(driver, config)?;
        fixture.seed()?;
        Ok(fixture)
    }

    /// Tables created, nothing loaded.
    pub fn empty(driver: DriverConfig, config: TaskConfig) -> Result<Self, FixtureError> {
        let cluster = MemoryCluster::new(driver);
        create_tables(&cluster, &config.keyspace)?;
        Ok(Self { cluster, config })
    }

    /// The cluster, for fault injection and inspection.
    pub fn cluster(&self) -> &MemoryCluster {
        &self.cluster
    }

    /// The cluster as a shared connection.
    pub fn connection(&self) -> Arc<dyn Connection> {
        Arc::new(self.cluster.clone())
    }

    /// Keyspace holding the tables.
    pub fn keyspace(&self) -> &str {
        &self.config.keyspace
    }

    /// Task settings.
    pub fn task_config(&self) -> &TaskConfig {
        &self.config
    }

    /// Load every sample record and refresh size estimates.
    pub fn seed(&self) -> Result<(), FixtureError> {
        for record in sample_status_history() {
            self.insert_status(&record)?;
        }
        for record in sample_split_history() {
            self.insert_split(&record)?;
        }
        for record in sample_bioseq_info() {
            self.insert_bioseq(&record)?;
        }
        for blob in sample_blobs() {
            self.insert_blob_props(&blob)?;
        }
        self.cluster.refresh_size_estimates()?;
        debug!(keyspace = %self.config.keyspace, "fixture seeded");
        Ok(())
    }

    /// Insert one status history entry.
    pub fn insert_status(&self, record: &StatusHistoryRecord) -> Result<(), FixtureError> {
        self.insert(
            BLOB_STATUS_HISTORY,
            StatusHistoryRecord::COLUMNS,
            vec![
                Value::Int32(record.sat_key),
                Value::Int64(record.done_when),
                Value::Int64(record.flags),
                Value::from(record.username.as_str()),
                Value::from(record.comment.as_str()),
                Value::from(record.public_comment.as_str()),
            ],
        )
    }

    /// Insert one split history entry.
    pub fn insert_split(&self, record: &SplitHistoryRecord) -> Result<(), FixtureError> {
        self.insert(
            BLOB_SPLIT_HISTORY,
            SplitHistoryRecord::COLUMNS,
            vec![
                Value::Int32(record.sat_key),
                Value::Int32(record.split_version),
                Value::Int64(record.modified),
                Value::from(record.id2_info.as_str()),
            ],
        )
    }

    /// Insert one bioseq row.
    pub fn insert_bioseq(&self, record: &BioseqInfoRecord) -> Result<(), FixtureError> {
        self.insert(
            BIOSEQ_INFO,
            BioseqInfoRecord::COLUMNS,
            vec![
                Value::from(record.accession.as_str()),
                Value::Int16(record.version),
                Value::Int16(record.seq_id_type),
                Value::Int64(record.gi),
                Value::Int64(record.date_changed),
                Value::Int32(record.hash),
                Value::Int32(record.length),
                Value::Int16(record.mol),
                Value::Int16(record.sat),
                Value::Int32(record.sat_key),
                Value::Int16(record.seq_state),
                Value::Int16(record.state),
                Value::Int32(record.tax_id),
                Value::from(record.name.as_str()),
            ],
        )
    }

    /// Insert blob properties directly, bypassing the change log.
    pub fn insert_blob_props(&self, blob: &BlobRecord) -> Result<(), FixtureError> {
        self.insert(BLOB_PROP, BlobRecord::COLUMNS, blob.prop_values())
    }

    fn insert(
        &self,
        table: &str,
        columns: &[&str],
        values: Vec<Value>,
    ) -> Result<(), FixtureError> {
        let row: Vec<(&str, Value)> = columns.iter().copied().zip(values).collect();
        self.cluster.insert_row(&self.config.keyspace, table, &row)?;
        Ok(())
    }
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("keyspace", &self.config.keyspace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_loads_samples() {
        let fixture = Fixture::new().unwrap();
        let ks = fixture.keyspace().to_string();
        let cluster = fixture.cluster();
        assert_eq!(
            cluster.row_count(&ks, BLOB_STATUS_HISTORY).unwrap(),
            sample_status_history().len()
        );
        assert_eq!(
            cluster.row_count(&ks, BIOSEQ_INFO).unwrap(),
            sample_bioseq_info().len()
        );
        assert_eq!(cluster.row_count(&ks, BLOB_PROP).unwrap(), sample_blobs().len());
    }

    #[test]
    fn test_empty_fixture() {
        let fixture = Fixture::empty(DriverConfig::default(), TaskConfig::default()).unwrap();
        assert_eq!(
            fixture
                .cluster()
                .row_count(fixture.keyspace(), BLOB_STATUS_HISTORY)
                .unwrap(),
            0
        );
    }
}
