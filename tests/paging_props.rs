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

//! Paging properties: every row exactly once, one end signal.

use parking_lot::Mutex;
use proptest::prelude::*;
use seqvault::driver::memory::{FaultRule, StatementKind};
use seqvault::tasks::schema::BLOB_STATUS_HISTORY;
use seqvault::testing::Fixture;
use seqvault::{
    drive_blocking, DriverConfig, FetchStatusHistory, StatusHistoryRecord, TaskConfig, TaskState,
};
use std::sync::Arc;
use std::time::Duration;

fn fixture_with_history(rows: i64) -> Fixture {
    let fixture = Fixture::empty(DriverConfig::default(), TaskConfig::default()).unwrap();
    for done_when in 0..rows {
        fixture
            .insert_status(&StatusHistoryRecord {
                sat_key: 5,
                done_when,
                ..Default::default()
            })
            .unwrap();
    }
    fixture
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_pages_deliver_each_row_once(
        rows in 0i64..40,
        page_size in 1u32..12,
        faults in 0usize..3,
    ) {
        let fixture = fixture_with_history(rows);
        if faults > 0 {
            fixture.cluster().inject_fault(
                FaultRule::timeout()
                    .on_table(BLOB_STATUS_HISTORY)
                    .on(StatementKind::PageFetch)
                    .times(faults),
            );
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let lasts = Arc::new(Mutex::new(0usize));
        let (sink, end) = (Arc::clone(&seen), Arc::clone(&lasts));
        let mut task = FetchStatusHistory::builder(fixture.connection(), fixture.keyspace(), 5)
            .page_size(page_size)
            .max_retries(3)
            .build(move |record: StatusHistoryRecord, is_last| {
                if is_last {
                    *end.lock() += 1;
                } else {
                    sink.lock().push(record.done_when);
                }
                true
            });

        prop_assert_eq!(
            drive_blocking(&mut task, Duration::from_secs(5)).unwrap(),
            TaskState::Done
        );
        let expected: Vec<i64> = (0..rows).rev().collect();
        prop_assert_eq!(&*seen.lock(), &expected);
        prop_assert_eq!(*lasts.lock(), 1);
    }
}
