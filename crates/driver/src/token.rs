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

//! Partitioner tokens and ring layout.
//!
//! Tokens are signed 64-bit values. A ring of sorted tokens `t0 < t1 < ... < tn`
//! splits the token space into `(MIN, t0], (t0, t1], ..., (tn, MAX]`.
//! `i64::MIN` itself is never produced by [`token_of`], so the union of the
//! ranges covers every token a row can have.

use crate::{TokenRange, Value};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Token of a partition key (one value per partition column, in key order).
pub fn token_of(partition_key: &[Value]) -> i64 {
    let mut bytes = Vec::with_capacity(32);
    for value in partition_key {
        value.encode_key(&mut bytes);
    }
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    match hash as i64 {
        i64::MIN => i64::MAX,
        token => token,
    }
}

/// `n` tokens evenly spread across the token space, sorted ascending.
pub fn evenly_spaced_tokens(n: usize) -> Vec<i64> {
    if n == 0 {
        return Vec::new();
    }
    let span = i64::MAX as i128 - i64::MIN as i128;
    let n = n as i128;
    (1..=n)
        .map(|i| (i64::MIN as i128 + span * i / n) as i64)
        .collect()
}

/// Ranges of a ring. Duplicate tokens and `i64::MIN` produce no range; an
/// empty ring produces no ranges.
pub fn ranges_from_ring(tokens: &[i64]) -> Vec<TokenRange> {
    if tokens.is_empty() {
        return Vec::new();
    }
    let mut sorted = tokens.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges = Vec::with_capacity(sorted.len() + 1);
    let mut start = i64::MIN;
    for token in sorted {
        let range = TokenRange::new(start, token);
        if !range.is_empty() {
            ranges.push(range);
        }
        start = token;
    }
    let tail = TokenRange::new(start, i64::MAX);
    if !tail.is_empty() {
        ranges.push(tail);
    }
    ranges
}

/// Whether `ranges` cover `(i64::MIN, i64::MAX]` exactly once.
pub fn covers_ring(ranges: &[TokenRange]) -> bool {
    let mut sorted = ranges.to_vec();
    sorted.sort();
    let mut expected = i64::MIN;
    for range in &sorted {
        if range.is_empty() || range.start != expected {
            return false;
        }
        expected = range.end;
    }
    expected == i64::MAX
}
