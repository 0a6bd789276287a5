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

//! Restart budget and backoff.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often and how fast a task re-issues its queries after a transient
/// failure.
///
/// A task makes at most `max_retries + 1` attempts. Before attempt `k + 1`
/// (after the `k`-th restart, counting from 1) it waits
/// `initial_delay * backoff_factor^(k - 1)`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Restarts allowed before the task fails
    pub max_retries: u32,
    /// Delay before the first re-issue
    pub initial_delay: Duration,
    /// Upper bound for any delay
    pub max_delay: Duration,
    /// Multiplier applied per restart
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Policy with `max_retries` and no delay.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Builder-style backoff.
    pub fn with_backoff(
        mut self,
        initial_delay: Duration,
        max_delay: Duration,
        factor: f64,
    ) -> Self {
        self.initial_delay = initial_delay;
        self.max_delay = max_delay;
        self.backoff_factor = factor;
        self
    }

    /// Delay before re-issuing after restart number `restart` (1-based).
    pub fn delay_for(&self, restart: u32) -> Duration {
        if restart == 0 || self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(restart - 1).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        if capped.is_finite() && capped > 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_delay_by_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(5), Duration::ZERO);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy::immediate(10).with_backoff(
            Duration::from_millis(10),
            Duration::from_millis(50),
            2.0,
        );
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(3), Duration::from_millis(40));
        assert_eq!(policy.delay_for(4), Duration::from_millis(50));
        assert_eq!(policy.delay_for(100), Duration::from_millis(50));
    }

    proptest::proptest! {
        #[test]
        fn prop_delays_grow_and_stay_capped(
            initial_ms in 1u64..500,
            max_ms in 1u64..5_000,
            factor in 1.0f64..8.0,
            restarts in 1u32..64,
        ) {
            let policy = RetryPolicy::immediate(restarts).with_backoff(
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                factor,
            );
            let mut previous = Duration::ZERO;
            for restart in 1..=restarts {
                let delay = policy.delay_for(restart);
                proptest::prop_assert!(delay >= previous);
                proptest::prop_assert!(delay <= Duration::from_millis(max_ms));
                previous = delay;
            }
        }
    }
}
