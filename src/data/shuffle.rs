//! Pseudo-shuffling of unbounded streams
//!
//! Emission order is decoupled from arrival order through a bounded
//! buffer: each arriving element is pushed, and once the buffer is full a
//! uniformly chosen element is popped and emitted. When the source runs
//! dry the remaining buffer drains in random order. The result is well
//! mixed but not a uniform permutation; early elements lean towards early
//! emission.

use crate::error::{ForecastError, Result};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::fmt;
use std::iter::{Fuse, FusedIterator};

/// Bounded-buffer shuffle over any iterator.
///
/// A capacity of 0 passes the source through unchanged.
pub struct ReservoirShuffle<I: Iterator> {
    source: Fuse<I>,
    buffer: Vec<I::Item>,
    capacity: usize,
    rng: Xoshiro256PlusPlus,
}

impl<I: Iterator> ReservoirShuffle<I> {
    /// Wrap `source` with a buffer of `capacity` elements
    pub fn new(source: I, capacity: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Self {
            source: source.fuse(),
            buffer: Vec::with_capacity(capacity),
            capacity,
            rng,
        }
    }

    /// Build from an optional, possibly user-supplied buffer size.
    ///
    /// `None` and `Some(0)` disable shuffling; negative sizes are rejected.
    pub fn from_buffer_size(source: I, buffer_size: Option<i64>, seed: Option<u64>) -> Result<Self> {
        let capacity = match buffer_size {
            None => 0,
            Some(size) if size < 0 => {
                return Err(ForecastError::InvalidConfiguration(format!(
                    "shuffle_buffer_size must be non-negative, got {}",
                    size
                )))
            }
            Some(size) => size as usize,
        };
        Ok(Self::new(source, capacity, seed))
    }

    /// Whether elements pass through without reordering
    pub fn is_passthrough(&self) -> bool {
        self.capacity == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of elements currently held back
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Insert `item`; once the buffer is full, pop a random element
    pub fn push_then_pop_random(&mut self, item: I::Item) -> Option<I::Item> {
        self.buffer.push(item);
        if self.buffer.len() >= self.capacity {
            self.pop_random()
        } else {
            None
        }
    }

    /// Pop one random element, used to drain after the source ends
    pub fn drain(&mut self) -> Option<I::Item> {
        self.pop_random()
    }

    fn pop_random(&mut self) -> Option<I::Item> {
        if self.buffer.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.buffer.len());
        Some(self.buffer.swap_remove(idx))
    }
}

impl<I: Iterator> fmt::Debug for ReservoirShuffle<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservoirShuffle")
            .field("capacity", &self.capacity)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl<I: Iterator> Iterator for ReservoirShuffle<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        if self.capacity == 0 {
            return self.source.next();
        }
        loop {
            match self.source.next() {
                Some(item) => {
                    if let Some(out) = self.push_then_pop_random(item) {
                        return Some(out);
                    }
                }
                None => return self.drain(),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.source.size_hint();
        let held = self.buffer.len();
        (
            lower.saturating_add(held),
            upper.and_then(|u| u.checked_add(held)),
        )
    }
}

impl<I: Iterator> FusedIterator for ReservoirShuffle<I> {}
