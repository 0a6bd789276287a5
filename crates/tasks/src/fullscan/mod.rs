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

//! Full-table scans split by token range.
//!
//! [`FullscanPlanner::generate`] estimates the table's size and produces a
//! [`ScanPlan`]; [`FullscanTask`] executes it.

mod plan;
mod runner;

pub use plan::{FullscanPlanTask, FullscanPlanner, ScanFilter, ScanPlan, ScanQuery, ScanTarget};
pub use runner::{FullscanTask, ScanRun};
