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
use crate::records::{column_list, SplitHistoryRecord};
use crate::schema::BLOB_SPLIT_HISTORY;
use crate::statement::Statement;
use crate::task::TaskBuilder;
use seqvault_driver::Connection;
use std::sync::Arc;

/// Split versions of one blob, newest first.
pub type FetchSplitHistory = FetchTask<SplitHistoryQuery>;

/// Key and filter of a [`FetchSplitHistory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitHistoryQuery {
    /// Blob key
    pub sat_key: i32,
    /// Only this split version
    pub split_version: Option<i32>,
}

impl FetchSpec for SplitHistoryQuery {
    type Record = SplitHistoryRecord;
    const KIND: &'static str = "fetch_split_history";
    const TABLE: &'static str = BLOB_SPLIT_HISTORY;

    fn statement(&self, keyspace: &str) -> Statement {
        let mut sql = format!(
            "SELECT {} FROM {keyspace}.{} WHERE sat_key = ?",
            column_list(SplitHistoryRecord::COLUMNS),
            Self::TABLE,
        );
        if self.split_version.is_some() {
            sql.push_str(" AND split_version = ?");
        }
        let mut statement = Statement::new(sql).bind(self.sat_key);
        if let Some(version) = self.split_version {
            statement.push(version);
        }
        statement
    }
}

impl FetchSplitHistory {
    /// Builder for the split history of `sat_key`.
    pub fn builder(
        connection: Arc<dyn Connection>,
        keyspace: &str,
        sat_key: i32,
    ) -> TaskBuilder<SplitHistoryQuery> {
        TaskBuilder::new(
            connection,
            keyspace,
            SplitHistoryQuery {
                sat_key,
                split_version: None,
            },
        )
    }
}

impl TaskBuilder<SplitHistoryQuery> {
    /// Restrict to one split version.
    pub fn split_version(mut self, version: i32) -> Self {
        self.params.split_version = Some(version);
        self
    }

    /// Finish with the consume callback.
    pub fn build(
        self,
        consume: impl FnMut(SplitHistoryRecord, bool) -> bool + Send + 'static,
    ) -> FetchSplitHistory {
        FetchTask::new(self, consume)
    }
}
