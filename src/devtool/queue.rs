//! Fixed-capacity FIFO queue.
//!
//! Backs the devtool log history. Behaves like a plain FIFO queue but never
//! grows past its capacity: enqueueing into a full queue silently evicts the
//! oldest item first.
//!
//! # Example
//!
//! ```
//! use socket_client_manager::devtool::FixedQueue;
//!
//! let mut queue = FixedQueue::new(3)?;
//! queue.enqueue(1);
//! queue.enqueue(2);
//! queue.enqueue(3);
//! assert_eq!(queue.values(), vec![1, 2, 3]);
//!
//! queue.enqueue(4);
//! assert_eq!(queue.values(), vec![2, 3, 4]);
//! assert_eq!(queue.len(), 3);
//! # Ok::<(), socket_client_manager::Error>(())
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::collections::vec_deque::Iter;
use std::num::NonZeroUsize;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

const INVALID_MAX_LENGTH: &str = "maxLength must be a positive integer";

// ============================================================================
// FixedQueue
// ============================================================================

/// A bounded FIFO queue that drops its oldest item on overflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedQueue<T> {
    /// Items in insertion order, oldest at the front.
    queue: VecDeque<T>,
    /// Maximum number of items held.
    max_length: usize,
}

impl<T> FixedQueue<T> {
    /// Creates an empty queue holding at most `max_length` items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `max_length` is zero.
    pub fn new(max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(Error::invalid_argument(INVALID_MAX_LENGTH));
        }

        Ok(Self {
            queue: VecDeque::with_capacity(max_length),
            max_length,
        })
    }

    /// Creates an empty queue from a capacity that is non-zero by type.
    #[must_use]
    pub fn with_max_length(max_length: NonZeroUsize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_length.get()),
            max_length: max_length.get(),
        }
    }

    /// Creates a queue from a capacity read as a floating point number.
    ///
    /// Used for capacities coming from untyped configuration (JSON numbers).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for zero, negative, fractional,
    /// NaN or infinite values.
    pub fn try_from_f64(max_length: f64) -> Result<Self> {
        if !max_length.is_finite()
            || max_length.fract() != 0.0
            || max_length <= 0.0
            || max_length > usize::MAX as f64
        {
            return Err(Error::invalid_argument(INVALID_MAX_LENGTH));
        }

        Self::new(max_length as usize)
    }

    /// Appends an item, evicting the oldest one if the queue is full.
    pub fn enqueue(&mut self, item: T) {
        if self.queue.len() >= self.max_length {
            self.queue.pop_front();
        }

        self.queue.push_back(item);
    }

    /// Iterates over the items in insertion order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        self.queue.iter()
    }

    /// Returns the number of items currently held.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if the queue holds no items.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the capacity the queue was created with.
    #[inline]
    #[must_use]
    pub const fn max_length(&self) -> usize {
        self.max_length
    }

    /// Removes every item.
    #[inline]
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

impl<T: Clone> FixedQueue<T> {
    /// Returns a copy of the current items in insertion order.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.queue.iter().cloned().collect()
    }
}

impl<'a, T> IntoIterator for &'a FixedQueue<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
