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

//! Table names and their layouts in the reference backend.

use crate::records::{
    BioseqInfoRecord, BlobRecord, ChangeLogRecord, SplitHistoryRecord, StatusHistoryRecord,
};
use seqvault_driver::memory::{ClusteringOrder, MemoryCluster, TableSchema};
use seqvault_driver::DriverResult;

/// Status changes of a blob.
pub const BLOB_STATUS_HISTORY: &str = "blob_status_history";
/// Split versions of a blob.
pub const BLOB_SPLIT_HISTORY: &str = "blob_split_history";
/// Accession to blob resolution.
pub const BIOSEQ_INFO: &str = "bioseq_info";
/// Blob properties.
pub const BLOB_PROP: &str = "blob_prop";
/// Blob payload chunks.
pub const BLOB_CHUNK: &str = "blob_chunk";
/// Append-only audit of blob property writes.
pub const BLOB_PROP_CHANGE_LOG: &str = "blob_prop_change_log";

/// Columns of [`BLOB_CHUNK`].
pub const BLOB_CHUNK_COLUMNS: &[&str] = &["sat_key", "last_modified", "chunk_no", "data"];

/// Layouts of every table the tasks read or write, in `keyspace`.
pub fn table_schemas(keyspace: &str) -> Vec<TableSchema> {
    vec![
        TableSchema::new(keyspace, BLOB_STATUS_HISTORY)
            .columns(StatusHistoryRecord::COLUMNS)
            .partition_key(&["sat_key"])
            .clustering("done_when", ClusteringOrder::Desc),
        TableSchema::new(keyspace, BLOB_SPLIT_HISTORY)
            .columns(SplitHistoryRecord::COLUMNS)
            .partition_key(&["sat_key"])
            .clustering("split_version", ClusteringOrder::Desc),
        TableSchema::new(keyspace, BIOSEQ_INFO)
            .columns(BioseqInfoRecord::COLUMNS)
            .partition_key(&["accession"])
            .clustering("version", ClusteringOrder::Desc)
            .clustering("seq_id_type", ClusteringOrder::Asc)
            .clustering("gi", ClusteringOrder::Asc),
        TableSchema::new(keyspace, BLOB_PROP)
            .columns(BlobRecord::COLUMNS)
            .partition_key(&["sat_key"])
            .clustering("last_modified", ClusteringOrder::Desc),
        TableSchema::new(keyspace, BLOB_CHUNK)
            .columns(BLOB_CHUNK_COLUMNS)
            .partition_key(&["sat_key", "last_modified"])
            .clustering("chunk_no", ClusteringOrder::Asc),
        TableSchema::new(keyspace, BLOB_PROP_CHANGE_LOG)
            .columns(ChangeLogRecord::COLUMNS)
            .partition_key(&["updated_time"])
            .clustering("sat_key", ClusteringOrder::Asc)
            .clustering("last_modified", ClusteringOrder::Asc),
    ]
}

/// Register every table in `keyspace`. Idempotent.
pub fn create_tables(cluster: &MemoryCluster, keyspace: &str) -> DriverResult<()> {
    for schema in table_schemas(keyspace) {
        cluster.create_table(schema)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let cluster = MemoryCluster::default();
        create_tables(&cluster, "ks").unwrap();
        create_tables(&cluster, "ks").unwrap();
        for schema in table_schemas("ks") {
            assert_eq!(cluster.row_count("ks", schema.name()).unwrap(), 0);
        }
    }

    #[test]
    fn test_chunk_partition_key() {
        let schemas = table_schemas("ks");
        let chunk = schemas.iter().find(|s| s.name() == BLOB_CHUNK).unwrap();
        assert_eq!(chunk.partition_key_names(), ["sat_key", "last_modified"]);
    }
}
