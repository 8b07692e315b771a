//! Message model representing a raw Gmail message

use super::ThreadId;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mailparse::ParsedMail;
use serde::{Deserialize, Serialize};

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message fetched in raw form from a mailbox
///
/// `raw` holds the complete RFC 5322 message exactly as the server returned
/// it. A `Message` is never mutated after it has been fetched; headers and
/// body parts are derived from `raw` on demand.
#[derive(Debug, Clone)]
pub struct Message {
    /// Gmail message ID
    pub id: MessageId,
    /// ID of the thread this message belongs to
    pub thread_id: ThreadId,
    /// Full encoded message bytes
    pub raw: Vec<u8>,
    /// Plain text preview, HTML entities already unescaped
    pub snippet: String,
    /// Gmail's internal received time
    pub received_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message builder
    pub fn builder(id: MessageId, thread_id: ThreadId) -> MessageBuilder {
        MessageBuilder::new(id, thread_id)
    }

    /// Decoded Subject header, or an empty string when there is none
    pub fn subject(&self) -> String {
        self.header_raw("Subject")
            .map(|raw| decode_header_value(&raw))
            .unwrap_or_default()
    }

    /// Raw (undecoded) value of the first header with the given name
    pub fn header_raw(&self, name: &str) -> Option<Vec<u8>> {
        let (headers, _) = mailparse::parse_headers(&self.raw).ok()?;
        headers
            .iter()
            .find(|h| h.get_key_ref().eq_ignore_ascii_case(name))
            .map(|h| h.get_value_raw().to_vec())
    }

    /// Parse the MIME structure of the raw message
    pub fn parse(&self) -> Result<ParsedMail<'_>> {
        mailparse::parse_mail(&self.raw)
            .with_context(|| format!("Failed to parse message {}", self.id))
    }

    /// Size of the raw message in bytes
    pub fn size(&self) -> usize {
        self.raw.len()
    }
}

/// Decode an RFC 2047 header value
///
/// Falls back to the raw value (lossily converted to UTF-8) when the header
/// cannot be parsed.
fn decode_header_value(raw: &[u8]) -> String {
    // mailparse wants a complete "Key: value" line
    let mut line = b"Subject: ".to_vec();
    line.extend_from_slice(raw);
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((header, _)) => header.get_value(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    thread_id: ThreadId,
    raw: Vec<u8>,
    snippet: String,
    received_at: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    fn new(id: MessageId, thread_id: ThreadId) -> Self {
        Self {
            id,
            thread_id,
            raw: Vec::new(),
            snippet: String::new(),
            received_at: None,
        }
    }

    pub fn raw(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            thread_id: self.thread_id,
            raw: self.raw,
            snippet: self.snippet,
            received_at: self.received_at.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_raw(raw: &str) -> Message {
        Message::builder(MessageId::new("m1"), ThreadId::new("t1"))
            .raw(raw.as_bytes())
            .build()
    }

    #[test]
    fn test_subject_plain() {
        let msg = message_with_raw("From: a@example.com\r\nSubject: Lunch plans\r\n\r\nBody\r\n");
        assert_eq!(msg.subject(), "Lunch plans");
    }

    #[test]
    fn test_subject_encoded_word() {
        let msg = message_with_raw(
            "From: a@example.com\r\nSubject: =?UTF-8?B?Q2Fmw6kgdG9uaWdodA==?=\r\n\r\nBody\r\n",
        );
        assert_eq!(msg.subject(), "Café tonight");
    }

    #[test]
    fn test_subject_unknown_charset_keeps_raw_value() {
        let msg = message_with_raw("Subject: =?x-unknown?B?SGVsbG8=?=\r\n\r\nBody\r\n");
        assert_eq!(msg.subject(), "=?x-unknown?B?SGVsbG8=?=");
    }

    #[test]
    fn test_subject_malformed_encoded_word_keeps_raw_value() {
        let msg = message_with_raw("Subject: =?utf-8?X?SGVsbG8=?=\r\n\r\nBody\r\n");
        assert_eq!(msg.subject(), "=?utf-8?X?SGVsbG8=?=");
    }

    #[test]
    fn test_decode_header_value_falls_back_to_raw() {
        assert_eq!(decode_header_value(b"=?x-unknown?Q?caf=E9?="), "=?x-unknown?Q?caf=E9?=");
        assert_eq!(decode_header_value(b"Plain text"), "Plain text");
    }

    #[test]
    fn test_subject_header_name_case_insensitive() {
        let msg = message_with_raw("SUBJECT: Shouting\r\n\r\nBody\r\n");
        assert_eq!(msg.subject(), "Shouting");
    }

    #[test]
    fn test_subject_missing() {
        let msg = message_with_raw("From: a@example.com\r\n\r\nBody\r\n");
        assert_eq!(msg.subject(), "");
    }

    #[test]
    fn test_size() {
        let msg = message_with_raw("Subject: x\r\n\r\n");
        assert_eq!(msg.size(), 14);
    }
}
