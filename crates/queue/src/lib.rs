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

//! # SeqVault Bounded Queue
//!
//! ## Purpose
//! Fixed-capacity, lock-free multi-producer multi-consumer ring buffer used to
//! hand items between threads (for example, finished storage tasks moving from
//! the executor's poller thread to consumer threads).
//!
//! ## Design
//! - Each cell carries a `sequence` counter that encodes whether it is
//!   writable, readable, or belongs to an older generation.
//! - `push_pos` / `pop_pos` are monotonically increasing 64-bit counters,
//!   each on its own cache line.
//! - Non-blocking `push` / `pop` never park; `push_wait` / `pop_wait` park on a
//!   condition variable only when the fast path fails.
//! - Capacity is a compile-time power of two.
//!
//! ## Examples
//! ```rust
//! use seqvault_queue::BoundedQueue;
//! use std::time::Duration;
//!
//! let queue: BoundedQueue<u32, 4> = BoundedQueue::new();
//! queue.push(7).unwrap();
//! assert_eq!(queue.pop(), Some(7));
//! assert_eq!(queue.pop_wait(Some(Duration::from_millis(1))), None);
//! ```

mod bounded;

pub use bounded::BoundedQueue;

use thiserror::Error;

/// Error returned when an item cannot be pushed. The item is handed back.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum PushError<T> {
    /// The queue is at capacity.
    #[error("queue is full")]
    Full(T),
    /// `push_wait` gave up before space became available.
    #[error("timed out waiting for queue space")]
    Timeout(T),
}

impl<T> PushError<T> {
    /// Recover the item that was not pushed.
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(item) | PushError::Timeout(item) => item,
        }
    }

    /// Whether the push failed because the queue was full.
    pub fn is_full(&self) -> bool {
        matches!(self, PushError::Full(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_error_messages() {
        assert_eq!(PushError::Full(1).to_string(), "queue is full");
        assert_eq!(
            PushError::Timeout(1).to_string(),
            "timed out waiting for queue space"
        );
        let err: Box<dyn std::error::Error> = Box::new(PushError::Timeout(2u8));
        assert!(err.source().is_none());
        assert!(PushError::Full("x").is_full());
        assert_eq!(PushError::Timeout("y").into_inner(), "y");
    }
}
