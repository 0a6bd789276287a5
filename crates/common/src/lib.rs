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

//! # SeqVault Common
//!
//! ## Purpose
//! Ambient utilities shared by every SeqVault crate:
//!
//! - [`env`]: typed environment-variable lookup used by the `from_env`
//!   configuration loaders
//! - [`observability`]: tracing subscriber setup
//! - [`test_helpers`]: helpers for unit and integration tests

pub mod env;
pub mod observability;
pub mod test_helpers;

pub use env::{env_flag, env_parse, env_string, EnvError};
pub use observability::init_tracing;
