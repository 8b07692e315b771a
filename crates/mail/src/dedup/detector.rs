//! Duplicate detection against the destination mailbox
//!
//! Gmail cannot look up a message by content hash, so detection is a
//! two-step heuristic: a metadata search (subject, snippet, received day)
//! narrows the destination down to a handful of candidates, then each
//! candidate is downloaded and compared with [`is_duplicate`].

use anyhow::Result;
use log::debug;

use super::is_duplicate;
use crate::mailbox::{Mailbox, MessageNotFoundError};
use crate::models::{Message, MessageId};
use crate::retry::RemoteExecutor;
use crate::search::{Enumerator, SearchQuery};

/// Default maximum SimHash distance (exclusive) for multipart duplicates
pub const DEFAULT_DUPLICATE_THRESHOLD: u32 = 3;

/// Finds copies of a source message in the destination mailbox
pub struct DuplicateDetector<'a> {
    destination: &'a dyn Mailbox,
    executor: &'a RemoteExecutor,
    threshold: u32,
}

impl<'a> DuplicateDetector<'a> {
    pub fn new(destination: &'a dyn Mailbox, executor: &'a RemoteExecutor) -> Self {
        Self {
            destination,
            executor,
            threshold: DEFAULT_DUPLICATE_THRESHOLD,
        }
    }

    /// Set the SimHash distance below which multipart messages match
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Search the destination for a copy of `message`
    ///
    /// Returns the ID of the first matching destination message, in the
    /// order the destination listed them.
    pub fn find_duplicate(&self, message: &Message) -> Result<Option<MessageId>> {
        let query = probe_query(message).render();
        let candidates = Enumerator::new(self.destination, self.executor).list_all(&query)?;
        debug!(
            "{} candidate(s) for message {} in destination",
            candidates.len(),
            message.id
        );

        for candidate in candidates {
            let fetched = match self.executor.execute("Fetch candidate message", || {
                self.destination.get_raw_message(&candidate.id)
            }) {
                Ok(fetched) => fetched,
                Err(e) if e.is::<MessageNotFoundError>() => {
                    debug!("Candidate {} disappeared, skipping", candidate.id);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if is_duplicate(message, &fetched, self.threshold) {
                return Ok(Some(fetched.id));
            }
        }

        Ok(None)
    }
}

/// Metadata search that should find any copy of `message`
///
/// Subject and snippet are only included when non-blank; the date range
/// covers the UTC day the message was received.
///
/// The day is intentionally UTC, not the local day of the machine running
/// the migration. Keep it that way so results are independent of time zone.
pub fn probe_query(message: &Message) -> SearchQuery {
    let day = message.received_at.date_naive();
    let next_day = day.succ_opt().unwrap_or(day);
    let mut query = SearchQuery::new();

    let subject = message.subject();
    if !subject.trim().is_empty() {
        query = query.subject(subject);
    }
    query = query.date_range(day, next_day);
    if !message.snippet.trim().is_empty() {
        query = query.phrase(message.snippet.as_str());
    }

    query
}
