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
use crate::records::{column_list, StatusHistoryRecord};
use crate::schema::BLOB_STATUS_HISTORY;
use crate::statement::Statement;
use crate::task::TaskBuilder;
use seqvault_driver::Connection;
use std::sync::Arc;

/// Status history of one blob, newest first.
pub type FetchStatusHistory = FetchTask<StatusHistoryQuery>;

/// Key and filter of a [`FetchStatusHistory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusHistoryQuery {
    /// Blob key
    pub sat_key: i32,
    /// Only the entry written at this time
    pub done_when: Option<i64>,
}

impl FetchSpec for StatusHistoryQuery {
    type Record = StatusHistoryRecord;
    const KIND: &'static str = "fetch_status_history";
    const TABLE: &'static str = BLOB_STATUS_HISTORY;

    fn statement(&self, keyspace: &str) -> Statement {
        let mut statement = Statement::new(format!(
            "SELECT {} FROM {keyspace}.{} WHERE sat_key = ?{}",
            column_list(StatusHistoryRecord::COLUMNS),
            Self::TABLE,
            if self.done_when.is_some() { " AND done_when = ?" } else { "" },
        ))
        .bind(self.sat_key);
        if let Some(done_when) = self.done_when {
            statement.push(done_when);
        }
        statement
    }
}

impl FetchStatusHistory {
    /// Builder for the history of `sat_key`.
    pub fn builder(
        connection: Arc<dyn Connection>,
        keyspace: &str,
        sat_key: i32,
    ) -> TaskBuilder<StatusHistoryQuery> {
        TaskBuilder::new(
            connection,
            keyspace,
            StatusHistoryQuery {
                sat_key,
                done_when: None,
            },
        )
    }
}

impl TaskBuilder<StatusHistoryQuery> {
    /// Restrict to the entry written at `done_when`.
    pub fn done_when(mut self, done_when: i64) -> Self {
        self.params.done_when = Some(done_when);
        self
    }

    /// Finish with the consume callback.
    pub fn build(
        self,
        consume: impl FnMut(StatusHistoryRecord, bool) -> bool + Send + 'static,
    ) -> FetchStatusHistory {
        FetchTask::new(self, consume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_without_filter() {
        let query = StatusHistoryQuery {
            sat_key: 7,
            done_when: None,
        };
        let statement = query.statement("ks");
        assert_eq!(
            statement.sql(),
            "SELECT sat_key, done_when, flags, username, comment, public_comment \
             FROM ks.blob_status_history WHERE sat_key = ?"
        );
        assert_eq!(statement.params().len(), 1);
    }

    #[test]
    fn test_statement_with_filter() {
        let query = StatusHistoryQuery {
            sat_key: 7,
            done_when: Some(1_000),
        };
        let statement = query.statement("ks");
        assert!(statement.sql().ends_with("WHERE sat_key = ? AND done_when = ?"));
        assert_eq!(statement.params().len(), 2);
    }
}
