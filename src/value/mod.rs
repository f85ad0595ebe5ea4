//! Row value model
//!
//! A row is a mapping from field name to [`Value`]. Values keep the width they
//! arrived with (`Int32` vs `Int64`, `Float32` vs `Float64`). Nothing in this
//! module decides equality between representations; that is the comparator's
//! job, driven by the declared type of each field.

mod decimal;
mod row;
mod timestamp;

pub use decimal::{Decimal, DecimalError, MAX_SCALE};
pub use row::{Row, Value};
pub use timestamp::{format_timestamp, parse_timestamp, truncate_to_micros, STORAGE_FORMAT};
