//! Compare engine
//!
//! Decides what an incoming row means for the versioned table:
//! - `new` when nothing is stored for its identifier
//! - `outdated` when versions exist but none is active
//! - `changed`, `update` or `identical` against the active version
//!
//! Field values are compared by their declared semantic type. Lazy and
//! ignored fields never influence the outcome.

mod comparator;
mod engine;
mod errors;
mod outcome;

pub use comparator::ValueComparator;
pub use engine::CompareEngine;
pub use errors::{CompareError, CompareResult};
pub use outcome::{CompareOutcome, RowStatus};
