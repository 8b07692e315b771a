//! Per-message migration and the run loop

use anyhow::Result;
use log::{debug, info, warn};

use super::{LabelEnsurer, RunStats, Session};
use crate::config::MigrationOptions;
use crate::dedup::DuplicateDetector;
use crate::mailbox::{InsertRequest, InsertedMessage, Mailbox, MessageNotFoundError};
use crate::models::{Message, MessageId};
use crate::retry::{InterruptedError, RemoteExecutor};
use crate::search::Enumerator;

/// What happened to a single source message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Could not be fetched from the source; left untouched
    Unavailable,
    /// Copied to the destination and trashed at the source
    ///
    /// Holds `None` in a dry run, where nothing is inserted.
    Inserted(Option<InsertedMessage>),
    /// Already present at the destination (holds the copy's ID); trashed at
    /// the source without inserting
    SkippedAsDuplicate(MessageId),
}

/// Moves correspondence from the source mailbox to the destination
///
/// Messages are processed one at a time: fetch, check for a duplicate,
/// insert or skip, then trash the original.
pub struct Migrator<'a> {
    source: &'a dyn Mailbox,
    destination: &'a dyn Mailbox,
    executor: RemoteExecutor,
    options: MigrationOptions,
    session: Session,
}

impl<'a> Migrator<'a> {
    pub fn new(
        source: &'a dyn Mailbox,
        destination: &'a dyn Mailbox,
        executor: RemoteExecutor,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source,
            destination,
            executor,
            options,
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stats(&self) -> &RunStats {
        &self.session.stats
    }

    /// Migrate every message exchanged with the configured correspondents
    ///
    /// Stops early, returning the statistics so far, when the interrupt flag
    /// is raised. A message that has been changed is always finished first.
    /// Any remote failure other than a missing source message aborts the run.
    pub fn run(&mut self) -> Result<RunStats> {
        let enumeration = match Enumerator::new(self.source, &self.executor)
            .enumerate(&self.options.correspondents, self.options.limit)
        {
            Ok(enumeration) => enumeration,
            Err(e) if e.is::<InterruptedError>() => {
                warn!("Interrupted while listing messages");
                return Ok(self.finish());
            }
            Err(e) => return Err(e),
        };

        let mut ids = enumeration.messages;
        if let Some(limit) = self.options.limit {
            ids.truncate(limit);
        }

        let total = ids.len();
        for (i, id) in ids.iter().enumerate() {
            if self.executor.interrupt().is_triggered() {
                warn!("Interrupted after {} of {} messages", i, total);
                break;
            }

            if self.options.dry_run {
                info!(
                    "[{}/{}] Moving message with id {} (dry run - no changes will be made!)",
                    i + 1,
                    total,
                    id
                );
            } else {
                info!("[{}/{}] Moving message with id {}", i + 1, total, id);
            }

            match self.move_message(id) {
                Ok(_) => {}
                Err(e) if e.is::<InterruptedError>() => {
                    warn!("Interrupted before message {} was changed", id);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(self.finish())
    }

    /// Log the summary line and hand back the statistics
    fn finish(&self) -> RunStats {
        let stats = &self.session.stats;
        if self.options.dry_run {
            info!(
                "Finished (dry run) - would have created {} messages, trashed {}",
                stats.simulated_inserted, stats.simulated_trashed
            );
        } else {
            info!(
                "Finished - created {} messages, trashed {}",
                stats.inserted, stats.trashed
            );
        }
        if stats.duplicates > 0 || stats.unavailable > 0 {
            info!(
                "{} duplicate(s) skipped, {} message(s) unavailable",
                stats.duplicates, stats.unavailable
            );
        }
        stats.clone()
    }

    /// Move one message from the source to the destination
    pub fn move_message(&mut self, id: &MessageId) -> Result<MessageOutcome> {
        let message = match self
            .executor
            .execute("Fetch message", || self.source.get_raw_message(id))
        {
            Ok(message) => message,
            Err(e) if e.is::<MessageNotFoundError>() => {
                warn!("Message {} is no longer available, skipping", id);
                self.session.stats.unavailable += 1;
                return Ok(MessageOutcome::Unavailable);
            }
            Err(e) => return Err(e),
        };
        debug!("Fetched message {} ({} bytes)", id, message.size());
        self.session.stats.fetched += 1;

        let duplicate = if self.options.skip_deduplicate {
            None
        } else {
            DuplicateDetector::new(self.destination, &self.executor)
                .with_threshold(self.options.duplicate_threshold)
                .find_duplicate(&message)?
        };

        let outcome = match duplicate {
            Some(existing) => {
                info!(
                    "Skipping message id {}: found duplicate {} in destination",
                    id, existing
                );
                self.session.stats.duplicates += 1;
                MessageOutcome::SkippedAsDuplicate(existing)
            }
            None => MessageOutcome::Inserted(self.insert(&message)?),
        };

        self.trash(&message.id)?;
        Ok(outcome)
    }

    fn insert(&mut self, message: &Message) -> Result<Option<InsertedMessage>> {
        let thread_id = self.session.thread_map.get(&message.thread_id).cloned();
        let label = LabelEnsurer::new(
            self.destination,
            &self.executor,
            &self.options.label_name,
            self.options.dry_run,
        )
        .resolve(&mut self.session)?;

        if self.options.dry_run {
            info!(
                "Would have inserted message id {} (size {}): {}",
                message.id,
                message.size(),
                message.snippet
            );
            self.session.stats.simulated_inserted += 1;
            return Ok(None);
        }

        info!("Inserting message id {}: {}", message.id, message.snippet);
        let request = InsertRequest {
            raw: message.raw.clone(),
            label_ids: label.id().cloned().into_iter().collect(),
            thread_id,
        };
        let inserted = self.executor.execute("Insert message", || {
            self.destination.insert_message(request.clone())
        })?;

        self.session
            .thread_map
            .set(message.thread_id.clone(), inserted.thread_id.clone());
        self.session.stats.inserted += 1;
        Ok(Some(inserted))
    }

    fn trash(&mut self, id: &MessageId) -> Result<()> {
        if self.options.dry_run {
            info!("Would have trashed original message {}", id);
            self.session.stats.simulated_trashed += 1;
            return Ok(());
        }

        // The message is already settled at the destination, so finish it
        info!("Trashing original message {}", id);
        self.executor
            .uninterruptible()
            .execute("Trash message", || self.source.trash_message(id))?;
        self.session.stats.trashed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{InMemoryMailbox, MailboxCall};
    use crate::models::ThreadId;
    use crate::retry::RetryPolicy;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn executor() -> RemoteExecutor {
        RemoteExecutor::new(RetryPolicy::new(2, Duration::ZERO))
    }

    fn options() -> MigrationOptions {
        MigrationOptions::new(vec!["alice@example.com".to_string()])
    }

    fn make_message(id: &str, thread_id: &str, body: &str) -> Message {
        let raw = format!(
            "Message-ID: <{}@example.com>\r\nFrom: alice@example.com\r\nTo: work@example.com\r\n\
             Date: Tue, 5 Mar 2024 12:00:00 +0000\r\nSubject: Plans\r\n\r\n{}\r\n",
            id, body
        );
        Message::builder(MessageId::new(id), ThreadId::new(thread_id))
            .raw(raw)
            .snippet(body)
            .received_at(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap())
            .build()
    }

    #[test]
    fn test_move_inserts_labels_and_trashes() {
        let source = InMemoryMailbox::new("work@example.com");
        let destination = InMemoryMailbox::new("home@example.com");
        source.add_message(make_message("m1", "t1", "Lunch on Friday"));

        let mut migrator = Migrator::new(&source, &destination, executor(), options());
        let outcome = migrator.move_message(&MessageId::new("m1")).unwrap();

        let MessageOutcome::Inserted(Some(inserted)) = outcome else {
            panic!("expected insert, got {:?}", outcome);
        };
        let label = migrator.session().label.clone().unwrap();
        assert_eq!(destination.labels_of(&inserted.id), vec![label.id().cloned().unwrap()]);
        assert!(source.is_trashed(&MessageId::new("m1")));
        assert_eq!(migrator.stats().inserted, 1);
        assert_eq!(migrator.stats().trashed, 1);
    }

    #[test]
    fn test_unavailable_message_is_not_trashed() {
        let source = InMemoryMailbox::new("work@example.com");
        let destination = InMemoryMailbox::new("home@example.com");

        let mut migrator = Migrator::new(&source, &destination, executor(), options());
        let outcome = migrator.move_message(&MessageId::new("gone")).unwrap();

        assert_eq!(outcome, MessageOutcome::Unavailable);
        assert!(source.mutating_calls().is_empty());
        assert!(destination.calls().is_empty());
        assert_eq!(migrator.stats().unavailable, 1);
        assert_eq!(migrator.stats().trashed, 0);
    }

    #[test]
    fn test_duplicate_is_skipped_but_trashed() {
        let source = InMemoryMailbox::new("work@example.com");
        let destination = InMemoryMailbox::new("home@example.com");
        let original = make_message("m1", "t1", "Lunch on Friday");
        source.add_message(original.clone());
        destination.add_message(Message {
            id: MessageId::new("copy"),
            ..original
        });

        let mut migrator = Migrator::new(&source, &destination, executor(), options());
        let outcome = migrator.move_message(&MessageId::new("m1")).unwrap();

        assert_eq!(outcome, MessageOutcome::SkippedAsDuplicate(MessageId::new("copy")));
        assert_eq!(
            destination.count_calls(|c| matches!(c, MailboxCall::InsertMessage { .. })),
            0
        );
        assert!(source.is_trashed(&MessageId::new("m1")));
        assert!(migrator.session().thread_map.is_empty());
        assert_eq!(migrator.stats().duplicates, 1);
    }

    #[test]
    fn test_skip_deduplicate_never_searches_destination() {
        let source = InMemoryMailbox::new("work@example.com");
        let destination = InMemoryMailbox::new("home@example.com");
        source.add_message(make_message("m1", "t1", "Lunch on Friday"));

        let mut opts = options();
        opts.skip_deduplicate = true;
        let mut migrator = Migrator::new(&source, &destination, executor(), opts);
        migrator.move_message(&MessageId::new("m1")).unwrap();

        assert_eq!(
            destination.count_calls(|c| matches!(c, MailboxCall::ListMessages { .. })),
            0
        );
        assert_eq!(migrator.stats().inserted, 1);
    }

    #[test]
    fn test_insert_failure_aborts_without_trashing() {
        let source = InMemoryMailbox::new("work@example.com");
        let destination = InMemoryMailbox::new("home@example.com");
        source.add_message(make_message("m1", "t1", "One"));
        source.add_message(make_message("m2", "t2", "Two"));

        let mut opts = options();
        opts.skip_deduplicate = true;
        let mut migrator = Migrator::new(&source, &destination, executor(), opts);
        migrator.move_message(&MessageId::new("m1")).unwrap();

        // Label is cached now, so the next destination calls are insert attempts
        destination.fail_next(3);
        let err = migrator.move_message(&MessageId::new("m2")).unwrap_err();

        assert!(format!("{:#}", err).contains("Insert message failed after 3 attempt(s)"));
        assert!(!source.is_trashed(&MessageId::new("m2")));
        assert_eq!(migrator.stats().inserted, 1);
        assert_eq!(migrator.stats().trashed, 1);
    }

    #[test]
    fn test_interrupt_stops_between_messages() {
        let source = InMemoryMailbox::new("work@example.com");
        let destination = InMemoryMailbox::new("home@example.com");
        source.add_message(make_message("m1", "t1", "One"));
        source.add_message(make_message("m2", "t2", "Two"));

        let executor = executor();
        executor.interrupt().trigger();
        let mut migrator = Migrator::new(&source, &destination, executor, options());
        let stats = migrator.run().unwrap();

        assert_eq!(stats, RunStats::default());
        assert_eq!(
            source.count_calls(|c| matches!(c, MailboxCall::GetRawMessage(_))),
            0
        );
    }
}
