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

//! Property tests for ring layout and token routing.

use proptest::prelude::*;
use seqvault_driver::memory::{MemoryCluster, TableSchema};
use seqvault_driver::token::{covers_ring, evenly_spaced_tokens, ranges_from_ring, token_of};
use seqvault_driver::{Connection, DriverConfig, Value};

proptest! {
    #[test]
    fn prop_ring_ranges_cover_token_space(tokens in prop::collection::vec(any::<i64>(), 1..64)) {
        let ranges = ranges_from_ring(&tokens);
        prop_assert!(covers_ring(&ranges));
        for pair in ranges.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn prop_every_token_in_exactly_one_range(
        tokens in prop::collection::vec(any::<i64>(), 1..32),
        key in any::<i64>(),
    ) {
        let ranges = ranges_from_ring(&tokens);
        let token = token_of(&[Value::Int64(key)]);
        let owners = ranges.iter().filter(|r| r.contains(token)).count();
        prop_assert_eq!(owners, 1);
    }

    #[test]
    fn prop_evenly_spaced_ring_covers(n in 1usize..256) {
        let tokens = evenly_spaced_tokens(n);
        prop_assert_eq!(tokens.len(), n);
        prop_assert!(covers_ring(&ranges_from_ring(&tokens)));
    }
}

#[test]
fn test_cluster_ranges_cover_ring() {
    let cluster = MemoryCluster::new(DriverConfig::default().with_vnodes(16));
    let ranges = cluster.token_ranges().unwrap();
    assert_eq!(ranges.len(), 16);
    assert!(covers_ring(&ranges));
    cluster
        .create_table(TableSchema::new("ks", "t").columns(&["a", "b"]).partition_key(&["a", "b"]))
        .unwrap();
    assert_eq!(
        cluster.partition_key_column_names("ks", "t").unwrap(),
        vec!["a".to_string(), "b".to_string()]
    );
}

#[test]
fn test_empty_ring_has_no_ranges() {
    let cluster = MemoryCluster::default();
    cluster.set_ring_tokens(Vec::new());
    assert!(cluster.token_ranges().unwrap().is_empty());
}
