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

//! Records read and written by the tasks.
//!
//! Each record knows its column list; `FromRow` maps a row whose columns were
//! selected in exactly that order.

use seqvault_driver::{Query, Value};
use serde::{Deserialize, Serialize};

/// Build a record from the current row of a query.
pub trait FromRow: Default + Send + 'static {
    /// Read the current row. Missing or null columns take default values.
    fn from_row(row: &dyn Query) -> Self;
}

/// One entry of a blob's status history (`blob_status_history`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryRecord {
    pub sat_key: i32,
    /// Change time, milliseconds since epoch
    pub done_when: i64,
    pub flags: i64,
    pub username: String,
    pub comment: String,
    pub public_comment: String,
}

impl StatusHistoryRecord {
    /// Column order expected by [`FromRow`].
    pub const COLUMNS: &'static [&'static str] = &[
        "sat_key",
        "done_when",
        "flags",
        "username",
        "comment",
        "public_comment",
    ];
}

impl FromRow for StatusHistoryRecord {
    fn from_row(row: &dyn Query) -> Self {
        Self {
            sat_key: row.field_i32(0, 0),
            done_when: row.field_i64(1, 0),
            flags: row.field_i64(2, 0),
            username: row.field_str(3, ""),
            comment: row.field_str(4, ""),
            public_comment: row.field_str(5, ""),
        }
    }
}

/// One split version of a blob (`blob_split_history`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitHistoryRecord {
    pub sat_key: i32,
    pub split_version: i32,
    /// Modification time, milliseconds since epoch
    pub modified: i64,
    pub id2_info: String,
}

impl SplitHistoryRecord {
    /// Column order expected by [`FromRow`].
    pub const COLUMNS: &'static [&'static str] =
        &["sat_key", "split_version", "modified", "id2_info"];
}

impl FromRow for SplitHistoryRecord {
    fn from_row(row: &dyn Query) -> Self {
        Self {
            sat_key: row.field_i32(0, 0),
            split_version: row.field_i32(1, 0),
            modified: row.field_i64(2, 0),
            id2_info: row.field_str(3, ""),
        }
    }
}

/// Sequence identification for one accession version (`bioseq_info`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BioseqInfoRecord {
    pub accession: String,
    pub version: i16,
    pub seq_id_type: i16,
    pub gi: i64,
    pub date_changed: i64,
    pub hash: i32,
    pub length: i32,
    pub mol: i16,
    pub sat: i16,
    pub sat_key: i32,
    pub seq_state: i16,
    pub state: i16,
    pub tax_id: i32,
    pub name: String,
}

impl BioseqInfoRecord {
    /// Column order expected by [`FromRow`].
    pub const COLUMNS: &'static [&'static str] = &[
        "accession",
        "version",
        "seq_id_type",
        "gi",
        "date_changed",
        "hash",
        "length",
        "mol",
        "sat",
        "sat_key",
        "seq_state",
        "state",
        "tax_id",
        "name",
    ];
}

impl FromRow for BioseqInfoRecord {
    fn from_row(row: &dyn Query) -> Self {
        Self {
            accession: row.field_str(0, ""),
            version: row.field_i16(1, 0),
            seq_id_type: row.field_i16(2, 0),
            gi: row.field_i64(3, 0),
            date_changed: row.field_i64(4, 0),
            hash: row.field_i32(5, 0),
            length: row.field_i32(6, 0),
            mol: row.field_i16(7, 0),
            sat: row.field_i16(8, 0),
            sat_key: row.field_i32(9, 0),
            seq_state: row.field_i16(10, 0),
            state: row.field_i16(11, 0),
            tax_id: row.field_i32(12, 0),
            name: row.field_str(13, ""),
        }
    }
}

/// Blob properties (`blob_prop`) plus, for writes, the chunk payloads
/// (`blob_chunk`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRecord {
    pub sat_key: i32,
    /// Modification time, milliseconds since epoch; part of the key
    pub last_modified: i64,
    pub class: i16,
    pub date_asn1: i64,
    pub div: i32,
    pub flags: i64,
    pub hup_date: i64,
    pub id2_info: String,
    pub owner: i32,
    pub size: i64,
    pub size_unpacked: i64,
    pub username: String,
    pub n_chunks: i32,
    /// Chunk payloads, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<Vec<u8>>,
}

impl BlobRecord {
    /// Property column order expected by [`FromRow`] and used for writes.
    pub const COLUMNS: &'static [&'static str] = &[
        "sat_key",
        "last_modified",
        "class",
        "date_asn1",
        "div",
        "flags",
        "hup_date",
        "id2_info",
        "owner",
        "size",
        "size_unpacked",
        "username",
        "n_chunks",
    ];

    /// Property values in [`COLUMNS`](Self::COLUMNS) order. `n_chunks`
    /// reflects the payload when chunks are attached.
    pub fn prop_values(&self) -> Vec<Value> {
        let n_chunks = if self.chunks.is_empty() {
            self.n_chunks
        } else {
            i32::try_from(self.chunks.len()).unwrap_or(i32::MAX)
        };
        vec![
            Value::Int32(self.sat_key),
            Value::Int64(self.last_modified),
            Value::Int16(self.class),
            Value::Int64(self.date_asn1),
            Value::Int32(self.div),
            Value::Int64(self.flags),
            Value::Int64(self.hup_date),
            Value::Text(self.id2_info.clone()),
            Value::Int32(self.owner),
            Value::Int64(self.size),
            Value::Int64(self.size_unpacked),
            Value::Text(self.username.clone()),
            Value::Int32(n_chunks),
        ]
    }
}

impl FromRow for BlobRecord {
    fn from_row(row: &dyn Query) -> Self {
        Self {
            sat_key: row.field_i32(0, 0),
            last_modified: row.field_i64(1, 0),
            class: row.field_i16(2, 0),
            date_asn1: row.field_i64(3, 0),
            div: row.field_i32(4, 0),
            flags: row.field_i64(5, 0),
            hup_date: row.field_i64(6, 0),
            id2_info: row.field_str(7, ""),
            owner: row.field_i32(8, 0),
            size: row.field_i64(9, 0),
            size_unpacked: row.field_i64(10, 0),
            username: row.field_str(11, ""),
            n_chunks: row.field_i32(12, 0),
            chunks: Vec::new(),
        }
    }
}

/// Kind of change recorded in the change log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeLogOp {
    /// Properties written
    #[default]
    Update,
    /// Blob withdrawn
    Delete,
}

impl ChangeLogOp {
    /// Stored representation.
    pub fn code(&self) -> i32 {
        match self {
            ChangeLogOp::Update => 0,
            ChangeLogOp::Delete => 1,
        }
    }

    /// Parse the stored representation; unknown codes read as `Update`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ChangeLogOp::Delete,
            _ => ChangeLogOp::Update,
        }
    }
}

/// Audit entry appended with every blob property write
/// (`blob_prop_change_log`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogRecord {
    /// Write time in milliseconds, truncated to the minute
    pub updated_time: i64,
    pub sat_key: i32,
    pub last_modified: i64,
    pub op: ChangeLogOp,
}

impl ChangeLogRecord {
    /// Column order expected by [`FromRow`] and used for writes.
    pub const COLUMNS: &'static [&'static str] =
        &["updated_time", "sat_key", "last_modified", "op"];

    /// Truncate a millisecond timestamp to the start of its minute.
    pub fn minute_bucket(millis: i64) -> i64 {
        millis - millis.rem_euclid(60_000)
    }

    /// Values in [`COLUMNS`](Self::COLUMNS) order.
    pub fn values(&self) -> Vec<Value> {
        vec![
            Value::Int64(self.updated_time),
            Value::Int32(self.sat_key),
            Value::Int64(self.last_modified),
            Value::Int32(self.op.code()),
        ]
    }
}

impl FromRow for ChangeLogRecord {
    fn from_row(row: &dyn Query) -> Self {
        Self {
            updated_time: row.field_i64(0, 0),
            sat_key: row.field_i32(1, 0),
            last_modified: row.field_i64(2, 0),
            op: ChangeLogOp::from_code(row.field_i32(3, 0)),
        }
    }
}

/// Untyped row: every column of the current row, in select order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow(pub Vec<Value>);

impl FromRow for RawRow {
    fn from_row(row: &dyn Query) -> Self {
        RawRow((0..).map_while(|i| row.field(i).cloned()).collect())
    }
}

pub(crate) fn column_list(columns: &[&str]) -> String {
    columns.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minute_bucket() {
        assert_eq!(ChangeLogRecord::minute_bucket(120_000), 120_000);
        assert_eq!(ChangeLogRecord::minute_bucket(179_999), 120_000);
        assert_eq!(ChangeLogRecord::minute_bucket(1_700_000_123_456), 1_700_000_100_000);
    }

    #[test]
    fn test_prop_values_count_chunks() {
        let blob = BlobRecord {
            sat_key: 1,
            n_chunks: 7,
            chunks: vec![vec![1], vec![2]],
            ..BlobRecord::default()
        };
        let values = blob.prop_values();
        assert_eq!(values.len(), BlobRecord::COLUMNS.len());
        assert_eq!(values[12], Value::Int32(2));
    }

    #[test]
    fn test_change_log_op_codes() {
        assert_eq!(ChangeLogOp::from_code(ChangeLogOp::Delete.code()), ChangeLogOp::Delete);
        assert_eq!(ChangeLogOp::from_code(42), ChangeLogOp::Update);
    }
}
