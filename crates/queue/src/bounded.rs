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

//! Sequence-numbered ring buffer.
//!
//! Cell protocol for a cell at index `pos & MASK`:
//! - `sequence == pos`: empty, writable by the producer that reserves `pos`
//! - `sequence == pos + 1`: holds the item pushed at `pos`, readable
//! - `sequence == pos + N`: consumed, re-armed for the next generation

use crate::PushError;
use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{fence, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

struct Cell<T> {
    sequence: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Parking state for the blocking variants.
///
/// The waiter counters let the non-blocking fast paths skip the mutex
/// entirely when nobody is parked.
struct Sleepers {
    lock: Mutex<()>,
    not_empty: Condvar,
    not_full: Condvar,
    waiting_pop: AtomicUsize,
    waiting_push: AtomicUsize,
}

impl Sleepers {
    fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            waiting_pop: AtomicUsize::new(0),
            waiting_push: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn wake_poppers(&self) {
        // Pairs with the fence in `park`: either the waiter sees the new item
        // or we see the waiter.
        fence(Ordering::SeqCst);
        if self.waiting_pop.load(Ordering::Relaxed) > 0 {
            let _guard = self.lock.lock();
            self.not_empty.notify_one();
        }
    }

    #[inline]
    fn wake_pushers(&self) {
        fence(Ordering::SeqCst);
        if self.waiting_push.load(Ordering::Relaxed) > 0 {
            let _guard = self.lock.lock();
            self.not_full.notify_one();
        }
    }
}

/// Wait on `condvar` until `deadline`; returns false once the deadline passed.
fn park(guard: &mut MutexGuard<'_, ()>, condvar: &Condvar, deadline: Option<Instant>) -> bool {
    match deadline {
        None => {
            condvar.wait(guard);
            true
        }
        Some(deadline) => !condvar.wait_until(guard, deadline).timed_out(),
    }
}

/// Lock-free bounded MPMC queue with capacity `N` (a power of two, at least 2).
///
/// ## Guarantees
/// - Every pushed item is popped by exactly one consumer.
/// - Items pushed by one producer are popped in push order.
/// - `push` fails immediately (no blocking) when `N` items are outstanding.
///
/// ## Example
/// ```rust
/// use seqvault_queue::BoundedQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(BoundedQueue::<u64, 64>::new());
/// let producer = {
///     let queue = queue.clone();
///     thread::spawn(move || {
///         for i in 0..10 {
///             queue.push_wait(i, None).unwrap();
///         }
///     })
/// };
/// let mut received = Vec::new();
/// while received.len() < 10 {
///     if let Some(v) = queue.pop_wait(None) {
///         received.push(v);
///     }
/// }
/// producer.join().unwrap();
/// assert_eq!(received, (0..10).collect::<Vec<_>>());
/// ```
pub struct BoundedQueue<T, const N: usize> {
    buffer: Box<[Cell<T>]>,
    push_pos: CachePadded<AtomicU64>,
    pop_pos: CachePadded<AtomicU64>,
    sleepers: Sleepers,
}

// SAFETY: items only move between threads, so `T: Send` is enough. A cell's
// payload is written by exactly one producer (the one whose CAS claimed its
// position) and read by exactly one consumer (the one whose CAS claimed the
// same position after the Release store of the sequence). No `&T` is ever
// handed out, so shared access never aliases a payload.
unsafe impl<T: Send, const N: usize> Send for BoundedQueue<T, N> {}
// SAFETY: see `Send` above. Apart from the cells, shared state is atomics and
// a `parking_lot` lock.
unsafe impl<T: Send, const N: usize> Sync for BoundedQueue<T, N> {}

impl<T, const N: usize> BoundedQueue<T, N> {
    const MASK: u64 = {
        assert!(
            N >= 2 && N.is_power_of_two(),
            "BoundedQueue capacity must be a power of two >= 2"
        );
        (N - 1) as u64
    };

    /// Create an empty queue.
    pub fn new() -> Self {
        let _ = Self::MASK;
        let buffer = (0..N)
            .map(|i| Cell {
                sequence: AtomicU64::new(i as u64),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buffer,
            push_pos: CachePadded::new(AtomicU64::new(0)),
            pop_pos: CachePadded::new(AtomicU64::new(0)),
            sleepers: Sleepers::new(),
        }
    }

    /// Static capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Push without blocking. Returns `PushError::Full` with the item when the
    /// queue is at capacity.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        match self.push_inner(item) {
            Ok(()) => {
                self.sleepers.wake_poppers();
                Ok(())
            }
            Err(item) => Err(PushError::Full(item)),
        }
    }

    /// Pop without blocking. Returns `None` when the queue is empty.
    pub fn pop(&self) -> Option<T> {
        let item = self.pop_inner()?;
        self.sleepers.wake_pushers();
        Some(item)
    }

    /// Push, parking until space is available or `timeout` elapses.
    /// `None` waits indefinitely.
    pub fn push_wait(&self, item: T, timeout: Option<Duration>) -> Result<(), PushError<T>> {
        let mut item = match self.push_inner(item) {
            Ok(()) => {
                self.sleepers.wake_poppers();
                return Ok(());
            }
            Err(item) => item,
        };

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.sleepers.lock.lock();
        self.sleepers.waiting_push.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let outcome = loop {
            match self.push_inner(item) {
                Ok(()) => break Ok(()),
                Err(back) => item = back,
            }
            if !park(&mut guard, &self.sleepers.not_full, deadline) {
                break self.push_inner(item).map_err(PushError::Timeout);
            }
        };

        self.sleepers.waiting_push.fetch_sub(1, Ordering::SeqCst);
        drop(guard);
        if outcome.is_ok() {
            self.sleepers.wake_poppers();
        }
        outcome
    }

    /// Pop, parking until an item arrives or `timeout` elapses.
    /// `None` waits indefinitely.
    pub fn pop_wait(&self, timeout: Option<Duration>) -> Option<T> {
        if let Some(item) = self.pop() {
            return Some(item);
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.sleepers.lock.lock();
        self.sleepers.waiting_pop.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);

        let item = loop {
            if let Some(item) = self.pop_inner() {
                break Some(item);
            }
            if !park(&mut guard, &self.sleepers.not_empty, deadline) {
                break self.pop_inner();
            }
        };

        self.sleepers.waiting_pop.fetch_sub(1, Ordering::SeqCst);
        drop(guard);
        if item.is_some() {
            self.sleepers.wake_pushers();
        }
        item
    }

    /// Approximate number of queued items. May be stale under concurrent
    /// mutation; use for monitoring only.
    pub fn size(&self) -> usize {
        let pop = self.pop_pos.load(Ordering::Relaxed);
        let push = self.push_pos.load(Ordering::Relaxed);
        push.saturating_sub(pop).min(N as u64) as usize
    }

    /// Advisory emptiness check, same caveats as [`size`](Self::size).
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn push_inner(&self, item: T) -> Result<(), T> {
        let mut pos = self.push_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[(pos & Self::MASK) as usize];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos) as i64;

            if diff == 0 {
                match self.push_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: winning the CAS for `pos` while the cell's
                        // sequence equals `pos` makes us its only writer.
                        unsafe { (*cell.value.get()).write(item) };
                        cell.sequence.store(pos + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // Cell still holds the previous generation's item.
                return Err(item);
            } else {
                pos = self.push_pos.load(Ordering::Relaxed);
            }
        }
    }

    fn pop_inner(&self) -> Option<T> {
        let mut pos = self.pop_pos.load(Ordering::Relaxed);
        loop {
            let cell = &self.buffer[(pos & Self::MASK) as usize];
            let seq = cell.sequence.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(pos + 1) as i64;

            if diff == 0 {
                match self.pop_pos.compare_exchange_weak(
                    pos,
                    pos + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: sequence == pos + 1 means the producer
                        // published the value; the CAS makes us its only reader.
                        let item = unsafe { (*cell.value.get()).assume_init_read() };
                        cell.sequence.store(pos + N as u64, Ordering::Release);
                        return Some(item);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.pop_pos.load(Ordering::Relaxed);
            }
        }
    }
}

impl<T, const N: usize> Default for BoundedQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for BoundedQueue<T, N> {
    fn drop(&mut self) {
        while self.pop_inner().is_some() {}
    }
}

impl<T, const N: usize> std::fmt::Debug for BoundedQueue<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &N)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_push_pop_fifo() {
        let queue: BoundedQueue<u32, 8> = BoundedQueue::new();
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.size(), 5);
        for i in 0..5 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_fails_exactly_at_capacity() {
        let queue: BoundedQueue<u32, 4> = BoundedQueue::new();
        for i in 0..4 {
            assert!(queue.push(i).is_ok());
        }
        let err = queue.push(99).unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), 99);

        assert_eq!(queue.pop(), Some(0));
        assert!(queue.push(4).is_ok());
        assert!(queue.push(5).is_err());
    }

    #[test]
    fn test_wraparound_many_generations() {
        let queue: BoundedQueue<u64, 2> = BoundedQueue::new();
        for i in 0..1_000u64 {
            queue.push(i).unwrap();
            queue.push(i + 1_000_000).unwrap();
            assert_eq!(queue.pop(), Some(i));
            assert_eq!(queue.pop(), Some(i + 1_000_000));
        }
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_pop_wait_times_out_when_empty() {
        let queue: BoundedQueue<u32, 4> = BoundedQueue::new();
        let start = Instant::now();
        assert_eq!(queue.pop_wait(Some(Duration::from_millis(20))), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_push_wait_times_out_when_full() {
        let queue: BoundedQueue<u32, 2> = BoundedQueue::new();
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        let err = queue
            .push_wait(3, Some(Duration::from_millis(20)))
            .unwrap_err();
        assert_eq!(err, PushError::Timeout(3));
    }

    #[test]
    fn test_pop_wait_wakes_on_push() {
        let queue = Arc::new(BoundedQueue::<u32, 4>::new());
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.pop_wait(None))
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(42).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn test_push_wait_wakes_on_pop() {
        let queue = Arc::new(BoundedQueue::<u32, 2>::new());
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || queue.push_wait(3, Some(Duration::from_secs(5))))
        };
        thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.pop(), Some(1));
        assert!(producer.join().unwrap().is_ok());
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
    }

    #[test]
    fn test_drop_releases_remaining_items() {
        #[derive(Debug)]
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let queue: BoundedQueue<Tracked, 8> = BoundedQueue::new();
            for _ in 0..3 {
                queue.push(Tracked(drops.clone())).unwrap();
            }
            drop(queue.pop());
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 3);
    }
}
