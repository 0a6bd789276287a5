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

//! # SeqVault Storage Driver Interface
//!
//! ## Purpose
//! Defines the boundary between the SeqVault task framework and a
//! Cassandra-style wide-column store. Tasks only ever talk to the store
//! through the [`Connection`] and [`Query`] traits defined here.
//!
//! ## Key Components
//!
//! - [`Query`]: prepared-statement-like object (bind, execute, page through
//!   rows, detect end of data, close)
//! - [`Connection`]: query factory plus ring metadata (token ranges,
//!   partition key columns)
//! - [`Value`], [`Consistency`], [`TokenRange`]: wire-level value types
//! - [`DriverError`]: error taxonomy with a retryable/fatal split
//! - [`memory::MemoryCluster`]: in-memory reference backend for tests and
//!   local development
//!
//! ## Examples
//! ```rust
//! use seqvault_driver::{Connection, Consistency, ExecuteOptions, Query, RowState, Value};
//! use seqvault_driver::memory::{MemoryCluster, TableSchema, ClusteringOrder};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cluster = MemoryCluster::default();
//! cluster.create_table(
//!     TableSchema::new("ks", "accessions")
//!         .columns(&["accession", "version", "gi"])
//!         .partition_key(&["accession"])
//!         .clustering("version", ClusteringOrder::Desc),
//! )?;
//! cluster.insert_row("ks", "accessions", &[
//!     ("accession", Value::from("NC_000001")),
//!     ("version", Value::Int32(11)),
//!     ("gi", Value::Int64(568815597)),
//! ])?;
//!
//! let mut query = cluster.new_query();
//! query.set_sql("SELECT version, gi FROM ks.accessions WHERE accession = ?", 1);
//! query.bind_str(0, "NC_000001")?;
//! query.execute(Consistency::LocalQuorum, ExecuteOptions::default())?;
//! assert!(query.is_ready()?);
//! assert_eq!(query.next_row()?, RowState::Ready);
//! assert_eq!(query.field_i32(0, 0), 11);
//! assert_eq!(query.next_row()?, RowState::Eof);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod memory;
pub mod query;
pub mod token;
pub mod value;

pub use config::DriverConfig;
pub use connection::{Connection, TokenRange};
pub use error::{DriverError, DriverResult};
pub use query::{DataReadyCallback, ExecuteOptions, PagingState, Query, RowState};
pub use value::{Consistency, Value};
