//! Migration engine
//!
//! [`Migrator`] drives a run: it enumerates the source messages exchanged
//! with the chosen correspondents, then for each one fetches it, checks the
//! destination for a copy, inserts it (labelled and threaded) unless a copy
//! exists, and trashes the original. All per-run state lives in a
//! [`Session`] owned by the migrator.

mod executor;
mod labels;
mod session;

pub use executor::{MessageOutcome, Migrator};
pub use labels::{DEFAULT_LABEL_NAME, LabelEnsurer, MarkerLabel};
pub use session::{RunStats, Session, ThreadMap};
