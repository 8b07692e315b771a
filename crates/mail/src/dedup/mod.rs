//! Heuristic duplicate detection
//!
//! Provides:
//! - SimHash fingerprints for fuzzy body comparison
//! - Raw/MIME content comparison between two messages
//! - Destination search for copies of a source message

mod compare;
mod detector;
mod simhash;

pub use compare::is_duplicate;
pub use detector::{DEFAULT_DUPLICATE_THRESHOLD, DuplicateDetector, probe_query};
pub use simhash::Fingerprint;
