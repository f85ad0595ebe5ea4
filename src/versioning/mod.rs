//! Versioning sessions
//!
//! A [`Versioning`] session synchronizes a stream of rows with a type-2
//! slowly changing dimension table. For every row it:
//!
//! 1. Looks up the active version and classifies the row
//! 2. Stamps version and validity columns
//! 3. Runs the storage mutation the status calls for
//! 4. Reports a [`VersioningResult`] and updates the line statistics
//!
//! `finish` optionally purges versions not seen during the session, then
//! commits and closes.
//!
//! ```ignore
//! let mut session = Versioning::open(options, Box::new(SqliteConnector::file("dw.db")))?;
//! for row in rows {
//!     if let Some(result) = session.process(row)? {
//!         println!("{}", result.status);
//!     }
//! }
//! session.finish()?;
//! ```

mod clock;
mod errors;
mod mutation;
mod options;
mod result;
mod session;
mod statistics;

pub use clock::SessionClock;
pub use errors::{Result, VersioningError};
pub use mutation::MutationRequest;
pub use options::{ValidityHorizon, VersioningOptions};
pub use result::{SkipReason, VersioningResult};
pub use session::Versioning;
pub use statistics::{LineCounters, Statistic};
