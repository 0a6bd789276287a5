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

//! Fixtures shared by the task integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use seqvault_common::test_helpers::init_test_tracing;
use seqvault_driver::memory::MemoryCluster;
use seqvault_driver::{DriverConfig, Value};
use seqvault_tasks::schema::{create_tables, BIOSEQ_INFO, BLOB_STATUS_HISTORY};
use seqvault_tasks::TaskError;
use std::sync::Arc;

pub const KS: &str = "ks";

pub fn cluster() -> MemoryCluster {
    cluster_with(DriverConfig::default())
}

pub fn cluster_with(config: DriverConfig) -> MemoryCluster {
    init_test_tracing();
    let cluster = MemoryCluster::new(config);
    create_tables(&cluster, KS).unwrap();
    cluster
}

/// `count` status entries for `sat_key`, `done_when` 0..count.
pub fn seed_status_history(cluster: &MemoryCluster, sat_key: i32, count: i64) {
    for done_when in 0..count {
        cluster
            .insert_row(
                KS,
                BLOB_STATUS_HISTORY,
                &[
                    ("sat_key", Value::Int32(sat_key)),
                    ("done_when", Value::Int64(done_when)),
                    ("flags", Value::Int64(done_when % 4)),
                    ("username", Value::from("curator")),
                    ("comment", Value::from(format!("change {done_when}"))),
                    ("public_comment", Value::Null),
                ],
            )
            .unwrap();
    }
}

pub fn seed_bioseq(
    cluster: &MemoryCluster,
    accession: &str,
    version: i16,
    seq_id_type: i16,
    gi: i64,
) {
    cluster
        .insert_row(
            KS,
            BIOSEQ_INFO,
            &[
                ("accession", Value::from(accession)),
                ("version", Value::Int16(version)),
                ("seq_id_type", Value::Int16(seq_id_type)),
                ("gi", Value::Int64(gi)),
                ("length", Value::Int32(1000 + i32::from(version))),
                ("name", Value::from(format!("{accession}.{version}"))),
            ],
        )
        .unwrap();
}

/// Records what a consume callback saw.
pub struct Collector<R> {
    pub rows: Arc<Mutex<Vec<R>>>,
    pub lasts: Arc<Mutex<usize>>,
}

impl<R: Send + 'static> Collector<R> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
            lasts: Arc::new(Mutex::new(0)),
        }
    }

    /// Consume callback that keeps every row and accepts more while fewer
    /// than `limit` were seen.
    pub fn callback_with_limit(
        &self,
        limit: usize,
    ) -> impl FnMut(R, bool) -> bool + Send + 'static {
        let rows = Arc::clone(&self.rows);
        let lasts = Arc::clone(&self.lasts);
        move |row, is_last| {
            if is_last {
                *lasts.lock() += 1;
                return true;
            }
            let mut rows = rows.lock();
            rows.push(row);
            rows.len() < limit
        }
    }

    pub fn callback(&self) -> impl FnMut(R, bool) -> bool + Send + 'static {
        self.callback_with_limit(usize::MAX)
    }

    pub fn taken(&self) -> Vec<R>
    where
        R: Clone,
    {
        self.rows.lock().clone()
    }

    pub fn last_calls(&self) -> usize {
        *self.lasts.lock()
    }
}

/// Records error callback invocations.
#[derive(Clone, Default)]
pub struct Errors(pub Arc<Mutex<Vec<TaskError>>>);

impl Errors {
    pub fn callback(&self) -> impl FnOnce(TaskError) + Send + 'static {
        let errors = Arc::clone(&self.0);
        move |err| errors.lock().push(err)
    }

    pub fn all(&self) -> Vec<TaskError> {
        self.0.lock().clone()
    }
}
