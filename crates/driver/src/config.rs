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

//! Configuration for the in-memory cluster.
//!
//! ## Environment Variables
//! - `SEQVAULT_DRIVER_DATACENTER`: local data center name (default `DC1`)
//! - `SEQVAULT_DRIVER_VNODES`: ring tokens (default 8)
//! - `SEQVAULT_DRIVER_PEERS`: same-DC peers besides the local node (default 0)
//! - `SEQVAULT_DRIVER_REMOTE_PEERS`: peers in another DC (default 0)
//! - `SEQVAULT_DRIVER_LATENCY_MS`: simulated request latency (default 0)

use crate::DriverResult;
use seqvault_common::{env_parse, env_string};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default schema version reported by `system.local` and `system.peers`.
pub const DEFAULT_SCHEMA_VERSION: &str = "5a0f4e4e-0d2c-3c0b-9a4e-7f3c1e2d9b10";

/// Cluster layout and behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Local data center name
    pub datacenter: String,
    /// Schema version shared by every node
    pub schema_version: String,
    /// Number of ring tokens
    pub vnodes: usize,
    /// Peers in the local data center (excluding the local node)
    pub peers: usize,
    /// Peers in a remote data center
    pub remote_peers: usize,
    /// Simulated request latency in milliseconds
    pub latency_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            datacenter: "DC1".to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            vnodes: 8,
            peers: 0,
            remote_peers: 0,
            latency_ms: 0,
        }
    }
}

impl DriverConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> DriverResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            datacenter: env_string("SEQVAULT_DRIVER_DATACENTER", &defaults.datacenter),
            schema_version: defaults.schema_version,
            vnodes: env_parse("SEQVAULT_DRIVER_VNODES", defaults.vnodes)?,
            peers: env_parse("SEQVAULT_DRIVER_PEERS", defaults.peers)?,
            remote_peers: env_parse("SEQVAULT_DRIVER_REMOTE_PEERS", defaults.remote_peers)?,
            latency_ms: env_parse("SEQVAULT_DRIVER_LATENCY_MS", defaults.latency_ms)?,
        })
    }

    /// Simulated latency, `None` when zero.
    pub fn latency(&self) -> Option<Duration> {
        (self.latency_ms > 0).then(|| Duration::from_millis(self.latency_ms))
    }

    /// Builder-style peer count.
    pub fn with_peers(mut self, peers: usize) -> Self {
        self.peers = peers;
        self
    }

    /// Builder-style vnode count.
    pub fn with_vnodes(mut self, vnodes: usize) -> Self {
        self.vnodes = vnodes;
        self
    }

    /// Builder-style latency.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.datacenter, "DC1");
        assert_eq!(config.vnodes, 8);
        assert!(config.latency().is_none());
    }

    #[test]
    fn test_from_env_invalid_value() {
        std::env::set_var("SEQVAULT_DRIVER_VNODES", "many");
        let result = DriverConfig::from_env();
        std::env::remove_var("SEQVAULT_DRIVER_VNODES");
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_defaults() {
        let config: DriverConfig = serde_json::from_str(r#"{"peers": 2}"#).unwrap();
        assert_eq!(config.peers, 2);
        assert_eq!(config.datacenter, "DC1");
    }
}
