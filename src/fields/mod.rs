//! Field classification
//!
//! Static per-field metadata for a versioned table:
//!
//! - `id`: identifies the logical entity; part of every lookup
//! - `compare`: a difference opens a new version
//! - `update`: a difference rewrites the active version in place
//! - `lazy`: written with every new version or update, never compared
//! - `ignore`: part of no generated statement
//!
//! Each field also declares its semantic type, which drives value
//! normalization during comparison. Declaration order fixes the parameter
//! order of generated statements.

mod classification;
mod errors;
mod names;
mod types;

pub use classification::{FieldClassification, FieldDescriptor, FieldKind};
pub use errors::{FieldError, FieldResult};
pub use names::FieldNames;
pub use types::SemanticType;
