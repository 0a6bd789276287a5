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

use super::{FetchSpec, FetchTask};
use crate::records::{column_list, BioseqInfoRecord};
use crate::schema::BIOSEQ_INFO;
use crate::statement::Statement;
use crate::task::TaskBuilder;
use seqvault_driver::{Connection, Value};
use std::sync::Arc;

/// Sequence identification rows of one accession.
pub type FetchBioseqInfo = FetchTask<BioseqInfoQuery>;

/// Key and filters of a [`FetchBioseqInfo`].
///
/// Filters are pushed to the store only as a clustering prefix
/// (`version`, then `seq_id_type`, then `gi`). The rest are applied to the
/// rows as they arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BioseqInfoQuery {
    /// Accession, without version
    pub accession: String,
    /// Accession version
    pub version: Option<i16>,
    /// Seq-id type
    pub seq_id_type: Option<i16>,
    /// GenInfo identifier
    pub gi: Option<i64>,
}

impl BioseqInfoQuery {
    fn clustering_prefix(&self) -> (Option<i16>, Option<i16>, Option<i64>) {
        match (self.version, self.seq_id_type, self.gi) {
            (Some(v), Some(t), gi) => (Some(v), Some(t), gi),
            (Some(v), None, _) => (Some(v), None, None),
            (None, _, _) => (None, None, None),
        }
    }
}

impl FetchSpec for BioseqInfoQuery {
    type Record = BioseqInfoRecord;
    const KIND: &'static str = "fetch_bioseq_info";
    const TABLE: &'static str = BIOSEQ_INFO;

    fn statement(&self, keyspace: &str) -> Statement {
        let mut sql = format!(
            "SELECT {} FROM {keyspace}.{} WHERE accession = ?",
            column_list(BioseqInfoRecord::COLUMNS),
            Self::TABLE,
        );
        let mut params: Vec<Value> = vec![self.accession.as_str().into()];
        let (version, seq_id_type, gi) = self.clustering_prefix();
        if let Some(version) = version {
            sql.push_str(" AND version = ?");
            params.push(version.into());
        }
        if let Some(seq_id_type) = seq_id_type {
            sql.push_str(" AND seq_id_type = ?");
            params.push(seq_id_type.into());
        }
        if let Some(gi) = gi {
            sql.push_str(" AND gi = ?");
            params.push(gi.into());
        }
        let mut statement = Statement::new(sql);
        for param in params {
            statement.push(param);
        }
        statement
    }

    fn accept(&self, record: &BioseqInfoRecord) -> bool {
        self.version.map_or(true, |v| record.version == v)
            && self.seq_id_type.map_or(true, |t| record.seq_id_type == t)
            && self.gi.map_or(true, |gi| record.gi == gi)
    }
}

impl FetchBioseqInfo {
    /// Builder for the rows of `accession`.
    pub fn builder(
        connection: Arc<dyn Connection>,
        keyspace: &str,
        accession: &str,
    ) -> TaskBuilder<BioseqInfoQuery> {
        TaskBuilder::new(
            connection,
            keyspace,
            BioseqInfoQuery {
                accession: accession.to_string(),
                version: None,
                seq_id_type: None,
                gi: None,
            },
        )
    }
}

impl TaskBuilder<BioseqInfoQuery> {
    /// Restrict to one accession version.
    pub fn version(mut self, version: i16) -> Self {
        self.params.version = Some(version);
        self
    }

    /// Restrict to one seq-id type.
    pub fn seq_id_type(mut self, seq_id_type: i16) -> Self {
        self.params.seq_id_type = Some(seq_id_type);
        self
    }

    /// Restrict to one gi.
    pub fn gi(mut self, gi: i64) -> Self {
        self.params.gi = Some(gi);
        self
    }

    /// Finish with the consume callback.
    pub fn build(
        self,
        consume: impl FnMut(BioseqInfoRecord, bool) -> bool + Send + 'static,
    ) -> FetchBioseqInfo {
        FetchTask::new(self, consume)
    }
}
