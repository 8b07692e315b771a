//! Paginated discovery of messages matching correspondent filters

use anyhow::Result;
use log::{debug, info};
use std::collections::HashSet;

use super::{Direction, SearchQuery};
use crate::mailbox::{Mailbox, MessagePage, MessageRef};
use crate::models::{MessageId, ThreadId};
use crate::retry::RemoteExecutor;

/// Unique message and thread IDs found by [`Enumerator::enumerate`]
///
/// Both lists keep the order in which IDs were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enumeration {
    pub messages: Vec<MessageId>,
    pub threads: Vec<ThreadId>,
}

impl Enumeration {
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

/// Running, de-duplicated collection of listing results
#[derive(Default)]
struct Accumulator {
    refs: Vec<MessageRef>,
    seen_messages: HashSet<MessageId>,
    threads: Vec<ThreadId>,
    seen_threads: HashSet<ThreadId>,
}

impl Accumulator {
    fn extend(&mut self, refs: Vec<MessageRef>) {
        for msg_ref in refs {
            if self.seen_threads.insert(msg_ref.thread_id.clone()) {
                self.threads.push(msg_ref.thread_id.clone());
            }
            if self.seen_messages.insert(msg_ref.id.clone()) {
                self.refs.push(msg_ref);
            }
        }
    }

    fn len(&self) -> usize {
        self.refs.len()
    }

    fn reached(&self, limit: Option<usize>) -> bool {
        limit.is_some_and(|limit| self.len() >= limit)
    }
}

/// Lists messages in a mailbox, following pagination cursors
pub struct Enumerator<'a> {
    mailbox: &'a dyn Mailbox,
    executor: &'a RemoteExecutor,
}

impl<'a> Enumerator<'a> {
    pub fn new(mailbox: &'a dyn Mailbox, executor: &'a RemoteExecutor) -> Self {
        Self { mailbox, executor }
    }

    /// List every message matching `query`, across all pages
    pub fn list_all(&self, query: &str) -> Result<Vec<MessageRef>> {
        let mut acc = Accumulator::default();
        self.collect_pages(query, &mut acc, None)?;
        Ok(acc.refs)
    }

    /// Find messages exchanged with any of `correspondents`
    ///
    /// Queries `to:` and `from:` for every correspondent. With a `limit`,
    /// no further page is requested once the running total reaches it;
    /// pages are consumed whole, so the result may exceed the limit by up
    /// to one page.
    pub fn enumerate(&self, correspondents: &[String], limit: Option<usize>) -> Result<Enumeration> {
        let mut acc = Accumulator::default();

        'pairs: for correspondent in correspondents {
            for direction in Direction::ALL {
                let query = SearchQuery::new()
                    .correspondent(direction, correspondent.as_str())
                    .render();
                self.collect_pages(&query, &mut acc, limit)?;
                if acc.reached(limit) {
                    break 'pairs;
                }
            }
        }

        let enumeration = Enumeration {
            messages: acc.refs.into_iter().map(|r| r.id).collect(),
            threads: acc.threads,
        };

        let directions: Vec<&str> = Direction::ALL.iter().map(|d| d.operator()).collect();
        info!(
            "Found {} messages ({} threads) sent {} {}",
            enumeration.message_count(),
            enumeration.thread_count(),
            directions.join("/"),
            correspondents.join(", ")
        );

        Ok(enumeration)
    }

    fn collect_pages(&self, query: &str, acc: &mut Accumulator, limit: Option<usize>) -> Result<()> {
        let mut page_token: Option<String> = None;

        loop {
            if acc.reached(limit) {
                break;
            }

            let page = self.list_page(query, page_token.as_deref())?;
            acc.extend(page.messages);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(())
    }

    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<MessagePage> {
        debug!("Getting results page for query {}", query);
        self.executor.execute("List messages", || {
            self.mailbox.list_messages(query, page_token)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{InMemoryMailbox, MailboxCall};
    use crate::models::Message;
    use crate::retry::RetryPolicy;
    use std::time::Duration;

    fn make_message(id: &str, thread_id: &str, from: &str, to: &str) -> Message {
        let raw = format!("From: {}\r\nTo: {}\r\nSubject: Hi\r\n\r\nBody\r\n", from, to);
        Message::builder(MessageId::new(id), ThreadId::new(thread_id))
            .raw(raw)
            .build()
    }

    fn executor() -> RemoteExecutor {
        RemoteExecutor::new(RetryPolicy::new(2, Duration::ZERO))
    }

    fn correspondents(addrs: &[&str]) -> Vec<String> {
        addrs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_enumerate_deduplicates_across_pairs() {
        let mailbox = InMemoryMailbox::new("work@example.com");
        // Matches from:alice and to:bob
        mailbox.add_message(make_message("m1", "t1", "alice@example.com", "bob@example.com"));
        mailbox.add_message(make_message("m2", "t1", "work@example.com", "alice@example.com"));
        mailbox.add_message(make_message("m3", "t2", "bob@example.com", "work@example.com"));
        mailbox.add_message(make_message("m4", "t3", "carol@example.com", "work@example.com"));

        let executor = executor();
        let found = Enumerator::new(&mailbox, &executor)
            .enumerate(&correspondents(&["alice@example.com", "bob@example.com"]), None)
            .unwrap();

        let ids: Vec<&str> = found.messages.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m1", "m3"]);
        assert_eq!(found.thread_count(), 2);

        let unique: HashSet<_> = found.messages.iter().collect();
        assert_eq!(unique.len(), found.message_count());
    }

    #[test]
    fn test_enumerate_follows_pagination() {
        let mailbox = InMemoryMailbox::new("work@example.com").with_page_size(2);
        for i in 0..5 {
            mailbox.add_message(make_message(
                &format!("m{}", i),
                &format!("t{}", i),
                "alice@example.com",
                "work@example.com",
            ));
        }

        let executor = executor();
        let found = Enumerator::new(&mailbox, &executor)
            .enumerate(&correspondents(&["alice@example.com"]), None)
            .unwrap();

        assert_eq!(found.message_count(), 5);
        // to: query has one empty page, from: query has three
        let listings = mailbox.count_calls(|c| matches!(c, MailboxCall::ListMessages { .. }));
        assert_eq!(listings, 4);
    }

    #[test]
    fn test_limit_overshoots_by_at_most_one_page() {
        let mailbox = InMemoryMailbox::new("work@example.com").with_page_size(3);
        for i in 0..5 {
            mailbox.add_message(make_message(
                &format!("m{}", i),
                &format!("t{}", i),
                "work@example.com",
                "alice@example.com",
            ));
        }

        let executor = executor();
        let found = Enumerator::new(&mailbox, &executor)
            .enumerate(&correspondents(&["alice@example.com"]), Some(2))
            .unwrap();

        assert_eq!(found.message_count(), 3);
        let listings = mailbox.count_calls(|c| matches!(c, MailboxCall::ListMessages { .. }));
        assert_eq!(listings, 1);
    }

    #[test]
    fn test_list_all_retries_transient_failures() {
        let mailbox = InMemoryMailbox::new("home@example.com");
        mailbox.add_message(make_message("m1", "t1", "alice@example.com", "home@example.com"));
        mailbox.fail_next(2);

        let executor = executor();
        let refs = Enumerator::new(&mailbox, &executor)
            .list_all("from:alice@example.com")
            .unwrap();

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].thread_id.as_str(), "t1");
    }
}
