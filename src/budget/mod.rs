//! Wall-clock budgets
//!
//! - [`Deadline`] - a shareable cancellation token measured from its creation
//! - [`BudgetedIterator`] - checks a deadline between batches of any iterator

mod budgeted;
mod deadline;

pub use budgeted::{BudgetedExt, BudgetedIterator};
pub use deadline::{limit_from_secs, Deadline};
