//! In-memory mailbox implementation
//!
//! Used by tests as a stand-in for a Gmail account. Every call is recorded
//! so tests can assert which remote operations the engine performed, and
//! transient failures can be scripted to exercise retry behavior.

use anyhow::{Result, anyhow};
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use super::{
    InsertRequest, InsertedMessage, Mailbox, MessageNotFoundError, MessagePage, MessageRef,
    Profile,
};
use crate::models::{Label, LabelId, Message, MessageId, NewLabel, ThreadId};
use crate::search::{ParsedQuery, parse_query};

/// Default number of messages per listing page
const DEFAULT_PAGE_SIZE: usize = 100;

/// Maximum snippet length for inserted messages
const SNIPPET_CHARS: usize = 100;

/// A remote call observed by [`InMemoryMailbox`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxCall {
    ListMessages {
        query: String,
        page_token: Option<String>,
    },
    GetRawMessage(MessageId),
    InsertMessage {
        label_ids: Vec<LabelId>,
        thread_id: Option<ThreadId>,
    },
    TrashMessage(MessageId),
    ListLabels,
    CreateLabel(String),
    GetProfile,
}

impl MailboxCall {
    /// Whether this call changes mailbox state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            MailboxCall::InsertMessage { .. }
                | MailboxCall::TrashMessage(_)
                | MailboxCall::CreateLabel(_)
        )
    }
}

struct StoredMessage {
    message: Message,
    label_ids: Vec<LabelId>,
    trashed: bool,
}

/// In-memory implementation of Mailbox
///
/// Listings return messages in the order they were added. Trashed messages
/// are excluded from listings but can still be fetched by ID, as in Gmail.
pub struct InMemoryMailbox {
    email: String,
    page_size: usize,
    messages: RwLock<Vec<StoredMessage>>,
    labels: RwLock<Vec<Label>>,
    calls: Mutex<Vec<MailboxCall>>,
    /// Number of upcoming calls that fail with a transient error
    pending_failures: Mutex<u32>,
    next_id: AtomicU64,
}

impl InMemoryMailbox {
    /// Create an empty mailbox authorized for `email`
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            page_size: DEFAULT_PAGE_SIZE,
            messages: RwLock::new(Vec::new()),
            labels: RwLock::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            pending_failures: Mutex::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Set the number of messages returned per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add an existing message
    pub fn add_message(&self, message: Message) {
        self.messages.write().unwrap().push(StoredMessage {
            message,
            label_ids: Vec::new(),
            trashed: false,
        });
    }

    /// Add an existing label
    pub fn add_label(&self, label: Label) {
        self.labels.write().unwrap().push(label);
    }

    /// Permanently delete a message, bypassing the call log
    pub fn remove_message(&self, id: &MessageId) {
        self.messages
            .write()
            .unwrap()
            .retain(|stored| &stored.message.id != id);
    }

    /// Make the next `count` calls fail with a transient error
    pub fn fail_next(&self, count: u32) {
        *self.pending_failures.lock().unwrap() = count;
    }

    /// All calls observed so far, in order
    pub fn calls(&self) -> Vec<MailboxCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that changed mailbox state
    pub fn mutating_calls(&self) -> Vec<MailboxCall> {
        self.calls()
            .into_iter()
            .filter(MailboxCall::is_mutating)
            .collect()
    }

    /// Count observed calls matching a predicate
    pub fn count_calls(&self, predicate: impl Fn(&MailboxCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    /// Get a stored message regardless of trash state
    pub fn message(&self, id: &MessageId) -> Option<Message> {
        self.messages
            .read()
            .unwrap()
            .iter()
            .find(|stored| &stored.message.id == id)
            .map(|stored| stored.message.clone())
    }

    /// Messages that are not in the trash
    pub fn live_messages(&self) -> Vec<Message> {
        self.messages
            .read()
            .unwrap()
            .iter()
            .filter(|stored| !stored.trashed)
            .map(|stored| stored.message.clone())
            .collect()
    }

    /// Whether a message is in the trash
    pub fn is_trashed(&self, id: &MessageId) -> bool {
        self.messages
            .read()
            .unwrap()
            .iter()
            .any(|stored| &stored.message.id == id && stored.trashed)
    }

    /// Labels attached to a message
    pub fn labels_of(&self, id: &MessageId) -> Vec<LabelId> {
        self.messages
            .read()
            .unwrap()
            .iter()
            .find(|stored| &stored.message.id == id)
            .map(|stored| stored.label_ids.clone())
            .unwrap_or_default()
    }

    /// Labels currently defined
    pub fn labels(&self) -> Vec<Label> {
        self.labels.read().unwrap().clone()
    }

    fn record(&self, call: MailboxCall) -> Result<()> {
        self.calls.lock().unwrap().push(call);

        let mut pending = self.pending_failures.lock().unwrap();
        if *pending > 0 {
            *pending -= 1;
            return Err(anyhow!("Simulated transient failure (503 Service Unavailable)"));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Mailbox for InMemoryMailbox {
    fn list_messages(&self, query: &str, page_token: Option<&str>) -> Result<MessagePage> {
        self.record(MailboxCall::ListMessages {
            query: query.to_string(),
            page_token: page_token.map(str::to_string),
        })?;

        let offset: usize = match page_token {
            Some(token) => token
                .parse()
                .map_err(|_| anyhow!("Invalid page token: {}", token))?,
            None => 0,
        };

        let parsed = parse_query(query);
        let messages = self.messages.read().unwrap();
        let matching: Vec<MessageRef> = messages
            .iter()
            .filter(|stored| !stored.trashed && matches_query(&parsed, &stored.message))
            .map(|stored| MessageRef {
                id: stored.message.id.clone(),
                thread_id: stored.message.thread_id.clone(),
            })
            .collect();

        let end = (offset + self.page_size).min(matching.len());
        let page = matching.get(offset..end).unwrap_or_default().to_vec();
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        Ok(MessagePage {
            messages: page,
            next_page_token,
        })
    }

    fn get_raw_message(&self, id: &MessageId) -> Result<Message> {
        self.record(MailboxCall::GetRawMessage(id.clone()))?;
        self.message(id)
            .ok_or_else(|| MessageNotFoundError(id.clone()).into())
    }

    fn insert_message(&self, request: InsertRequest) -> Result<InsertedMessage> {
        self.record(MailboxCall::InsertMessage {
            label_ids: request.label_ids.clone(),
            thread_id: request.thread_id.clone(),
        })?;

        let id = MessageId::new(self.next_id("msg"));
        let thread_id = request
            .thread_id
            .unwrap_or_else(|| ThreadId::new(self.next_id("thread")));

        let probe = Message::builder(id.clone(), thread_id.clone())
            .raw(request.raw)
            .build();
        let received_at = probe
            .header_raw("Date")
            .and_then(|raw| mailparse::dateparse(&String::from_utf8_lossy(&raw)).ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now);
        let snippet = snippet_from_body(&probe);
        let message = Message::builder(id.clone(), thread_id.clone())
            .raw(probe.raw)
            .snippet(snippet)
            .received_at(received_at)
            .build();

        self.messages.write().unwrap().push(StoredMessage {
            message,
            label_ids: request.label_ids,
            trashed: false,
        });

        Ok(InsertedMessage { id, thread_id })
    }

    fn trash_message(&self, id: &MessageId) -> Result<()> {
        self.record(MailboxCall::TrashMessage(id.clone()))?;
        let mut messages = self.messages.write().unwrap();
        let stored = messages
            .iter_mut()
            .find(|stored| &stored.message.id == id)
            .ok_or_else(|| MessageNotFoundError(id.clone()))?;
        stored.trashed = true;
        Ok(())
    }

    fn list_labels(&self) -> Result<Vec<Label>> {
        self.record(MailboxCall::ListLabels)?;
        Ok(self.labels())
    }

    fn create_label(&self, label: NewLabel) -> Result<Label> {
        self.record(MailboxCall::CreateLabel(label.name.clone()))?;
        let created = Label::new(self.next_id("Label"), label.name);
        self.labels.write().unwrap().push(created.clone());
        Ok(created)
    }

    fn get_profile(&self) -> Result<Profile> {
        self.record(MailboxCall::GetProfile)?;
        Ok(Profile {
            email_address: self.email.clone(),
        })
    }
}

/// Evaluate the subset of Gmail search syntax the engine produces
fn matches_query(query: &ParsedQuery, message: &Message) -> bool {
    let header = |name: &str| {
        message
            .header_raw(name)
            .map(|raw| String::from_utf8_lossy(&raw).to_lowercase())
            .unwrap_or_default()
    };

    if !query.from.is_empty() {
        let from = header("From");
        if !query.from.iter().all(|addr| from.contains(&addr.to_lowercase())) {
            return false;
        }
    }

    if !query.to.is_empty() {
        let recipients = format!("{} {}", header("To"), header("Cc"));
        if !query
            .to
            .iter()
            .all(|addr| recipients.contains(&addr.to_lowercase()))
        {
            return false;
        }
    }

    let subject_words = words(&message.subject());
    if !query
        .subject
        .iter()
        .all(|phrase| contains_phrase(&subject_words, &words(phrase)))
    {
        return false;
    }

    if let Some(after) = query.after
        && message.received_at < after
    {
        return false;
    }
    if let Some(before) = query.before
        && message.received_at >= before
    {
        return false;
    }

    let mut text_words = subject_words;
    text_words.extend(words(&message.snippet));
    query
        .terms
        .iter()
        .all(|term| contains_phrase(&text_words, &words(term)))
}

/// Lower-cased word tokens of `text`
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '\''))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `phrase` occurs as a contiguous run in `haystack`
fn contains_phrase(haystack: &[String], phrase: &[String]) -> bool {
    phrase.is_empty() || haystack.windows(phrase.len()).any(|window| window == phrase)
}

/// Build a preview from the first text body of a message
fn snippet_from_body(message: &Message) -> String {
    let Ok(parsed) = message.parse() else {
        return String::new();
    };
    let part = parsed.subparts.first().unwrap_or(&parsed);
    let body = part.get_body().unwrap_or_default();
    body.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(SNIPPET_CHARS)
        .collect()
}
