//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 authentication flow with per-account tokens
//! - Gmail API client implementing [`Mailbox`](crate::mailbox::Mailbox)
//! - Response normalization to domain models

mod auth;
mod client;
mod normalize;

pub use auth::{GmailAuth, clear_all_credentials, tokens_dir};
pub use client::GmailClient;
pub use normalize::{decode_html_entities, encode_raw, normalize_label, normalize_message};

/// Gmail API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    ///
    /// Also the response body of an insert.
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: String,
    }

    /// Message fetched with `format=raw`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawMessage {
        pub id: String,
        pub thread_id: String,
        #[serde(default)]
        pub snippet: String,
        /// Milliseconds since the epoch, as a decimal string
        pub internal_date: Option<String>,
        /// Base64url-encoded RFC 5322 message
        pub raw: String,
    }

    /// Body of `messages.insert`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct InsertMessageRequest {
        pub raw: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        pub label_ids: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub thread_id: Option<String>,
    }

    /// Response from listing labels
    #[derive(Debug, Deserialize)]
    pub struct ListLabelsResponse {
        pub labels: Option<Vec<GmailLabel>>,
    }

    /// Label as returned by the API
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GmailLabel {
        pub id: String,
        pub name: String,
        #[serde(rename = "type")]
        pub label_type: Option<String>,
    }

    /// Response from `users/me/profile`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ProfileResponse {
        pub email_address: String,
        pub messages_total: Option<u64>,
        pub threads_total: Option<u64>,
        pub history_id: Option<String>,
    }
}
