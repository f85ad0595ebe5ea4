//! table-versioning - type-2 slowly changing dimension versioning
//!
//! Incoming rows are compared against the active version stored for their
//! identifiers. Changes open a new version and close the old one; repeated
//! rows only refresh bookkeeping columns.
//!
//! - `value`: typed row values, decimals, timestamps
//! - `fields`: field classification and bookkeeping column names
//! - `compare`: typed equality and row status
//! - `storage`: SQL generation, batching, connections
//! - `versioning`: the versioning session
//! - `observability`: structured logs and line counters

pub mod cli;
pub mod compare;
pub mod fields;
pub mod observability;
pub mod storage;
pub mod value;
pub mod versioning;
