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

//! Multi-threaded hand-off tests for BoundedQueue.

use proptest::prelude::*;
use seqvault_queue::BoundedQueue;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_many_producers_many_consumers_no_loss_no_duplicates() {
    const PRODUCERS: u64 = 4;
    const CONSUMERS: usize = 4;
    const PER_PRODUCER: u64 = 5_000;

    let queue = Arc::new(BoundedQueue::<u64, 64>::new());
    let consumed = Arc::new(AtomicUsize::new(0));
    let total = (PRODUCERS * PER_PRODUCER) as usize;

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.push_wait(p * 1_000_000 + i, None).unwrap();
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = queue.clone();
            let consumed = consumed.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while consumed.load(Ordering::SeqCst) < total {
                    if let Some(v) = queue.pop_wait(Some(Duration::from_millis(10))) {
                        consumed.fetch_add(1, Ordering::SeqCst);
                        seen.push(v);
                    }
                }
                seen
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }

    let mut all = HashSet::new();
    let mut count = 0;
    for c in consumers {
        for v in c.join().unwrap() {
            assert!(all.insert(v), "item {v} delivered twice");
            count += 1;
        }
    }
    assert_eq!(count, total);
    for p in 0..PRODUCERS {
        for i in 0..PER_PRODUCER {
            assert!(all.contains(&(p * 1_000_000 + i)));
        }
    }
    assert!(queue.pop().is_none());
}

#[test]
fn test_per_producer_order_preserved_single_consumer() {
    let queue = Arc::new(BoundedQueue::<(u8, u32), 16>::new());

    let producers: Vec<_> = (0..3u8)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..2_000u32 {
                    queue.push_wait((p, i), None).unwrap();
                }
            })
        })
        .collect();

    let mut last = [None::<u32>; 3];
    let mut received = 0;
    while received < 6_000 {
        if let Some((p, i)) = queue.pop_wait(Some(Duration::from_millis(50))) {
            if let Some(prev) = last[p as usize] {
                assert!(i > prev, "producer {p} out of order: {prev} then {i}");
            }
            last[p as usize] = Some(i);
            received += 1;
        }
    }
    for p in producers {
        p.join().unwrap();
    }
}

#[derive(Debug, Clone)]
enum Op {
    Push(u32),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u32>().prop_map(Op::Push), Just(Op::Pop)]
}

proptest! {
    /// Single-threaded behaviour matches a capacity-limited VecDeque.
    #[test]
    fn prop_matches_bounded_model(ops in proptest::collection::vec(op_strategy(), 0..400)) {
        let queue: BoundedQueue<u32, 8> = BoundedQueue::new();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(v) => {
                    let pushed = queue.push(v).is_ok();
                    prop_assert_eq!(pushed, model.len() < 8);
                    if pushed {
                        model.push_back(v);
                    }
                }
                Op::Pop => {
                    prop_assert_eq!(queue.pop(), model.pop_front());
                }
            }
            prop_assert_eq!(queue.size(), model.len());
        }
    }
}
