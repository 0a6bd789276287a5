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

//! Fixed sample records loaded by [`Fixture`](super::Fixture).

use seqvault_tasks::{BioseqInfoRecord, BlobRecord, SplitHistoryRecord, StatusHistoryRecord};

/// Base timestamp for sample data: 2024-01-01T00:00:00Z in milliseconds.
const EPOCH_2024: i64 = 1_704_067_200_000;

const DAY_MS: i64 = 86_400_000;

/// Sat keys that carry blobs, status history and split history.
pub const SAMPLE_SAT_KEYS: [i32; 3] = [1_001, 1_002, 1_003];

/// Three status changes per sample sat key, one day apart.
pub fn sample_status_history() -> Vec<StatusHistoryRecord> {
    SAMPLE_SAT_KEYS
        .iter()
        .flat_map(|&sat_key| {
            (0..3).map(move |day| StatusHistoryRecord {
                sat_key,
                done_when: EPOCH_2024 + day * DAY_MS,
                flags: day,
                username: "curator".to_string(),
                comment: format!("status change {day}"),
                public_comment: if day == 2 {
                    "withdrawn".to_string()
                } else {
                    String::new()
                },
            })
        })
        .collect()
}

/// Two split versions for every sample sat key.
pub fn sample_split_history() -> Vec<SplitHistoryRecord> {
    SAMPLE_SAT_KEYS
        .iter()
        .flat_map(|&sat_key| {
            (1..=2).map(move |split_version| SplitHistoryRecord {
                sat_key,
                split_version,
                modified: EPOCH_2024 + i64::from(split_version) * DAY_MS,
                id2_info: format!("{sat_key}.{split_version}.4"),
            })
        })
        .collect()
}

/// Accession versions under two sequence id types.
pub fn sample_bioseq_info() -> Vec<BioseqInfoRecord> {
    let entries: [(&str, i16, i16, i64, i32); 6] = [
        ("NC_000001", 10, 10, 568_815_597, 248_956_422),
        ("NC_000001", 11, 10, 568_815_597, 248_956_422),
        ("NC_000002", 12, 10, 568_815_596, 242_193_529),
        ("NM_000014", 4, 10, 66_932_946, 4_610),
        ("NM_000014", 5, 10, 258_440_926, 4_610),
        ("P01308", 1, 7, 124_617, 110),
    ];
    entries
        .iter()
        .enumerate()
        .map(|(i, &(accession, version, seq_id_type, gi, length))| {
            let i = i as i32;
            BioseqInfoRecord {
                accession: accession.to_string(),
                version,
                seq_id_type,
                gi,
                date_changed: EPOCH_2024 + i64::from(i) * DAY_MS,
                hash: 0x5eed_0000 + i,
                length,
                mol: if seq_id_type == 7 { 3 } else { 1 },
                sat: 4,
                sat_key: SAMPLE_SAT_KEYS[(i as usize) % SAMPLE_SAT_KEYS.len()],
                seq_state: 0,
                state: 10,
                tax_id: if seq_id_type == 7 { 9606 } else { 9606 + i % 2 },
                name: format!("{accession}.{version}"),
            }
        })
        .collect()
}

/// One blob per sample sat key. Properties only: the fixture stores no
/// chunk payloads, so `n_chunks` is zero.
pub fn sample_blobs() -> Vec<BlobRecord> {
    SAMPLE_SAT_KEYS
        .iter()
        .enumerate()
        .map(|(i, &sat_key)| BlobRecord {
            sat_key,
            last_modified: EPOCH_2024 + (i as i64) * DAY_MS,
            class: 1,
            date_asn1: EPOCH_2024,
            div: 0,
            flags: 0,
            hup_date: 0,
            id2_info: format!("{sat_key}.2.4"),
            owner: 10,
            size: 4_096 * (i as i64 + 1),
            size_unpacked: 16_384 * (i as i64 + 1),
            username: "loader".to_string(),
            n_chunks: 0,
            chunks: Vec::new(),
        })
        .collect()
}
