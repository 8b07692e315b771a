//! Mail crate - moving correspondence between Gmail accounts
//!
//! This crate provides the migration engine behind the `mailsplit` CLI:
//! - Domain models (Message, Label, Thread IDs)
//! - Mailbox trait with a Gmail API client and an in-memory double
//! - Bounded retry for remote calls
//! - Correspondent search and paginated enumeration
//! - Duplicate detection (exact bytes, body equality, SimHash)
//! - The per-message migration state machine
//!
//! Everything is synchronous; a run is a single sequential pass.

pub mod config;
pub mod dedup;
pub mod gmail;
pub mod mailbox;
pub mod migrate;
pub mod models;
pub mod retry;
pub mod search;

pub use config::{GmailCredentials, MigrationOptions, Settings};
pub use dedup::{DEFAULT_DUPLICATE_THRESHOLD, DuplicateDetector, Fingerprint, is_duplicate};
pub use gmail::{GmailAuth, GmailClient, clear_all_credentials};
pub use mailbox::{
    AccountMismatchError, InMemoryMailbox, InsertRequest, InsertedMessage, Mailbox, MailboxCall,
    MessageNotFoundError, MessagePage, MessageRef, Profile, verify_account,
};
pub use migrate::{MarkerLabel, MessageOutcome, Migrator, RunStats, Session, ThreadMap};
pub use models::{Label, LabelId, Message, MessageId, NewLabel, ThreadId};
pub use retry::{Interrupt, InterruptedError, RemoteExecutor, RetryPolicy};
pub use search::{Direction, Enumeration, Enumerator, SearchQuery};
