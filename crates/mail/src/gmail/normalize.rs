//! Gmail API response normalization
//!
//! Converts Gmail API responses to domain models.

use anyhow::{Context, Result};
use base64::prelude::*;
use chrono::{TimeZone, Utc};

use super::api::{GmailLabel, RawMessage};
use crate::models::{Label, Message, MessageId, ThreadId};

/// Normalize a `format=raw` message
pub fn normalize_message(gmail_msg: RawMessage) -> Result<Message> {
    let id = MessageId::new(&gmail_msg.id);
    let thread_id = ThreadId::new(&gmail_msg.thread_id);

    let raw = decode_base64(&gmail_msg.raw)
        .with_context(|| format!("Message {} has undecodable raw content", gmail_msg.id))?;

    let internal_date: i64 = gmail_msg
        .internal_date
        .as_deref()
        .and_then(|d| d.parse().ok())
        .unwrap_or(0);
    let received_at = Utc
        .timestamp_millis_opt(internal_date)
        .single()
        .unwrap_or_else(Utc::now);

    Ok(Message::builder(id, thread_id)
        .raw(raw)
        .snippet(decode_html_entities(&gmail_msg.snippet))
        .received_at(received_at)
        .build())
}

pub fn normalize_label(label: GmailLabel) -> Label {
    Label::new(label.id, label.name)
}

/// Encode raw message bytes for `messages.insert`
pub fn encode_raw(raw: &[u8]) -> String {
    BASE64_URL_SAFE.encode(raw)
}

/// Decode base64-encoded raw data
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
fn decode_base64(data: &str) -> Option<Vec<u8>> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    decoders.iter().find_map(|decoder| decoder.decode(data).ok())
}

/// Decode HTML character references in snippet text
///
/// Covers the full HTML5 named set as well as numeric references, in a
/// single pass.
pub fn decode_html_entities(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_message(raw: &str, snippet: &str) -> RawMessage {
        RawMessage {
            id: "18c2".to_string(),
            thread_id: "18c0".to_string(),
            snippet: snippet.to_string(),
            internal_date: Some("1709640000000".to_string()),
            raw: raw.to_string(),
        }
    }

    #[test]
    fn test_normalize_message() {
        // "Subject: Hi\r\n\r\nHello\r\n" in base64url
        let msg = normalize_message(raw_message(
            "U3ViamVjdDogSGkNCg0KSGVsbG8NCg",
            "Fish &amp; chips",
        ))
        .unwrap();

        assert_eq!(msg.id.as_str(), "18c2");
        assert_eq!(msg.thread_id.as_str(), "18c0");
        assert_eq!(msg.raw, b"Subject: Hi\r\n\r\nHello\r\n");
        assert_eq!(msg.subject(), "Hi");
        assert_eq!(msg.snippet, "Fish & chips");
        assert_eq!(
            msg.received_at,
            Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_normalize_rejects_garbage_raw() {
        assert!(normalize_message(raw_message("!!not base64!!", "")).is_err());
    }

    #[test]
    fn test_decode_html_entities() {
        let input = "Hello &amp; welcome &lt;user&gt; &#39;quoted&#39; &#x263A; &copy;";
        let output = decode_html_entities(input);
        assert_eq!(output, "Hello & welcome <user> 'quoted' \u{263A} \u{A9}");
    }

    #[test]
    fn test_decode_named_html5_entities() {
        assert_eq!(
            decode_html_entities("caf&eacute; &hellip; it&rsquo;s &mdash; done"),
            "caf\u{E9} \u{2026} it\u{2019}s \u{2014} done"
        );
    }

    #[test]
    fn test_accented_snippet_reaches_duplicate_probe() {
        let msg = normalize_message(raw_message(
            "U3ViamVjdDogSGkNCg0KSGVsbG8NCg",
            "Lunch at the caf&eacute;",
        ))
        .unwrap();

        let query = crate::dedup::probe_query(&msg).render();
        assert!(query.ends_with("\"Lunch at the caf\u{E9}\""), "{}", query);
    }

    #[test]
    fn test_decode_html_entities_single_pass() {
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_encode_raw_is_url_safe() {
        let encoded = encode_raw(&[0xfb, 0xff, 0xfe]);
        assert_eq!(encoded, "-__-");
        assert_eq!(decode_base64(&encoded), Some(vec![0xfb, 0xff, 0xfe]));
    }
}
