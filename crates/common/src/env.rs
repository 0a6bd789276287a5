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

//! Environment variable helpers.
//!
//! ## Configuration Precedence
//! 1. Environment variables (highest priority)
//! 2. Defaults supplied by the caller
//!
//! Empty values are treated as unset so that `FOO=` in a shell profile does
//! not override a default with garbage.

use std::env;
use std::str::FromStr;

/// Error raised when an environment variable is present but unparseable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {key}: {value:?} ({reason})")]
pub struct EnvError {
    /// Variable name
    pub key: String,
    /// Raw value found in the environment
    pub value: String,
    /// Parser message
    pub reason: String,
}

fn lookup(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Read a string variable, falling back to `default`.
pub fn env_string(key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Read and parse a variable, falling back to `default` when unset.
///
/// ## Examples
/// ```rust
/// use seqvault_common::env_parse;
///
/// let page_size: u32 = env_parse("SEQVAULT_DOCTEST_UNSET_PAGE_SIZE", 100).unwrap();
/// assert_eq!(page_size, 100);
/// ```
pub fn env_parse<T>(key: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| EnvError {
            key: key.to_string(),
            reason: e.to_string(),
            value,
        }),
    }
}

/// Read a boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`).
pub fn env_flag(key: &str, default: bool) -> Result<bool, EnvError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(EnvError {
                key: key.to_string(),
                value,
                reason: "expected a boolean".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_default_when_unset() {
        let v: u64 = env_parse("SEQVAULT_TEST_ENV_UNSET_U64", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn test_env_parse_reads_value() {
        env::set_var("SEQVAULT_TEST_ENV_PARSE_U32", "17");
        let v: u32 = env_parse("SEQVAULT_TEST_ENV_PARSE_U32", 0).unwrap();
        assert_eq!(v, 17);
        env::remove_var("SEQVAULT_TEST_ENV_PARSE_U32");
    }

    #[test]
    fn test_env_parse_rejects_garbage() {
        env::set_var("SEQVAULT_TEST_ENV_PARSE_BAD", "not-a-number");
        let err = env_parse::<u32>("SEQVAULT_TEST_ENV_PARSE_BAD", 0).unwrap_err();
        assert_eq!(err.key, "SEQVAULT_TEST_ENV_PARSE_BAD");
        assert_eq!(err.value, "not-a-number");
        env::remove_var("SEQVAULT_TEST_ENV_PARSE_BAD");
    }

    #[test]
    fn test_empty_value_treated_as_unset() {
        env::set_var("SEQVAULT_TEST_ENV_EMPTY", "  ");
        assert_eq!(env_string("SEQVAULT_TEST_ENV_EMPTY", "fallback"), "fallback");
        env::remove_var("SEQVAULT_TEST_ENV_EMPTY");
    }

    #[test]
    fn test_env_flag() {
        env::set_var("SEQVAULT_TEST_ENV_FLAG", "yes");
        assert!(env_flag("SEQVAULT_TEST_ENV_FLAG", false).unwrap());
        env::set_var("SEQVAULT_TEST_ENV_FLAG", "maybe");
        assert!(env_flag("SEQVAULT_TEST_ENV_FLAG", false).is_err());
        env::remove_var("SEQVAULT_TEST_ENV_FLAG");
    }
}
