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

//! # Tracing Setup
//!
//! ## Purpose
//! Installs the process-wide `tracing` subscriber used by SeqVault binaries
//! and long-running services.
//!
//! ## Design Notes
//! - Uses `tracing` for structured logging with `task_id`, `table` and
//!   `restarts` fields emitted by the task framework
//! - Filter comes from `RUST_LOG`, defaulting to `info`

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing.
///
/// ## Configuration
/// - `RUST_LOG`: Log level filter (e.g., "info", "seqvault_tasks=debug")
///
/// ## Returns
/// Error if a global subscriber is already installed.
///
/// ## Examples
/// ```rust,ignore
/// std::env::set_var("RUST_LOG", "seqvault_tasks=debug");
/// seqvault_common::init_tracing()?;
/// ```
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()?;

    tracing::info!("Tracing initialized");
    Ok(())
}
