//! Deadline-checked iteration
//!
//! The check runs after a batch has been handed out, i.e. before the next
//! one is requested. The first batch is therefore never blocked, and the
//! call after the final batch still reports an overrun.

use super::deadline::Deadline;
use crate::error::Result;
use std::iter::FusedIterator;

/// Iterator adapter that fails with `DeadlineExceeded` between batches
#[derive(Debug)]
pub struct BudgetedIterator<I> {
    inner: I,
    deadline: Deadline,
    yielded: usize,
    done: bool,
}

impl<I: Iterator> BudgetedIterator<I> {
    /// Deadline measured from now
    pub fn new(inner: I, time_limit_secs: Option<f64>) -> Result<Self> {
        Ok(Self::with_deadline(inner, Deadline::new(time_limit_secs)?))
    }

    /// Share an existing deadline
    pub fn with_deadline(inner: I, deadline: Deadline) -> Self {
        Self {
            inner,
            deadline,
            yielded: 0,
            done: false,
        }
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Batches handed out so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }
}

impl<I: Iterator> Iterator for BudgetedIterator<I> {
    type Item = Result<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.yielded > 0 {
            if let Err(e) = self.deadline.check() {
                self.done = true;
                return Some(Err(e));
            }
        }
        match self.inner.next() {
            Some(item) => {
                self.yielded += 1;
                Some(Ok(item))
            }
            None => {
                self.done = true;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let (lower, upper) = self.inner.size_hint();
        // an overrun adds one trailing error item
        (lower, upper.map(|u| u + 1))
    }
}

impl<I: Iterator> FusedIterator for BudgetedIterator<I> {}

/// `.budgeted(..)` on any iterator
pub trait BudgetedExt: Iterator + Sized {
    fn budgeted(self, deadline: Deadline) -> BudgetedIterator<Self> {
        BudgetedIterator::with_deadline(self, deadline)
    }
}

impl<I: Iterator> BudgetedExt for I {}
