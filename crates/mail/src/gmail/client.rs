//! Gmail API HTTP client
//!
//! Implements [`Mailbox`] over the Gmail REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic. Retries are the
//! caller's business; every method makes exactly one request.

use anyhow::{Context, Result};
use log::debug;

use super::GmailAuth;
use super::api::{
    GmailLabel, InsertMessageRequest, ListLabelsResponse, ListMessagesResponse, MessageRef as ApiMessageRef,
    ProfileResponse, RawMessage,
};
use super::normalize::{encode_raw, normalize_label, normalize_message};
use crate::mailbox::{
    InsertRequest, InsertedMessage, Mailbox, MessageNotFoundError, MessagePage, MessageRef,
    Profile,
};
use crate::models::{Label, Message, MessageId, NewLabel, ThreadId};

/// Gmail API client for one authorized account
pub struct GmailClient {
    auth: GmailAuth,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Messages per listing page (API maximum)
    const PAGE_SIZE: usize = 500;

    pub fn new(auth: GmailAuth) -> Self {
        Self { auth }
    }

    /// Account this client was created for
    pub fn email(&self) -> &str {
        self.auth.email()
    }

    /// Trigger the authentication flow if no usable token is stored
    pub fn authenticate(&self) -> Result<()> {
        self.auth.get_access_token()?;
        Ok(())
    }

    /// Forget the stored token for this account
    pub fn logout(&self) -> Result<()> {
        self.auth.logout()
    }

    fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.auth.get_access_token()?))
    }
}

impl Mailbox for GmailClient {
    fn list_messages(&self, query: &str, page_token: Option<&str>) -> Result<MessagePage> {
        let mut url = format!(
            "{}/users/me/messages?maxResults={}&q={}",
            Self::BASE_URL,
            Self::PAGE_SIZE,
            urlencoding::encode(query)
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        let mut response = ureq::get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        debug!(
            "Listed {} message(s), estimate {:?}",
            list.messages.as_ref().map_or(0, Vec::len),
            list.result_size_estimate
        );

        Ok(MessagePage {
            messages: list
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| MessageRef {
                    id: MessageId::new(m.id),
                    thread_id: ThreadId::new(m.thread_id),
                })
                .collect(),
            next_page_token: list.next_page_token,
        })
    }

    fn get_raw_message(&self, id: &MessageId) -> Result<Message> {
        let url = format!(
            "{}/users/me/messages/{}?format=raw",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        let response = ureq::get(&url)
            .header("Authorization", &self.bearer()?)
            .call();

        match response {
            Ok(mut resp) => {
                let raw: RawMessage = resp
                    .body_mut()
                    .read_json()
                    .context("Failed to parse message response")?;
                normalize_message(raw)
            }
            Err(ureq::Error::StatusCode(404)) => Err(MessageNotFoundError(id.clone()).into()),
            Err(e) => Err(anyhow::anyhow!("Failed to fetch message {}: {}", id, e)),
        }
    }

    fn insert_message(&self, request: InsertRequest) -> Result<InsertedMessage> {
        let url = format!(
            "{}/users/me/messages?internalDateSource=dateHeader",
            Self::BASE_URL
        );
        let body = InsertMessageRequest {
            raw: encode_raw(&request.raw),
            label_ids: request
                .label_ids
                .into_iter()
                .map(|id| id.as_str().to_string())
                .collect(),
            thread_id: request.thread_id.map(|t| t.as_str().to_string()),
        };

        let mut response = ureq::post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(&body)
            .context("Failed to send insert message request")?;

        let inserted: ApiMessageRef = response
            .body_mut()
            .read_json()
            .context("Failed to parse insert message response")?;

        Ok(InsertedMessage {
            id: MessageId::new(inserted.id),
            thread_id: ThreadId::new(inserted.thread_id),
        })
    }

    fn trash_message(&self, id: &MessageId) -> Result<()> {
        let url = format!(
            "{}/users/me/messages/{}/trash",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        match ureq::post(&url)
            .header("Authorization", &self.bearer()?)
            .send_empty()
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(404)) => Err(MessageNotFoundError(id.clone()).into()),
            Err(e) => Err(anyhow::anyhow!("Failed to trash message {}: {}", id, e)),
        }
    }

    fn list_labels(&self) -> Result<Vec<Label>> {
        let url = format!("{}/users/me/labels", Self::BASE_URL);

        let mut response = ureq::get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send list labels request")?;

        let labels: ListLabelsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse labels response")?;

        Ok(labels
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(normalize_label)
            .collect())
    }

    fn create_label(&self, label: NewLabel) -> Result<Label> {
        let url = format!("{}/users/me/labels", Self::BASE_URL);

        let mut response = ureq::post(&url)
            .header("Authorization", &self.bearer()?)
            .send_json(&label)
            .with_context(|| format!("Failed to create label {}", label.name))?;

        let created: GmailLabel = response
            .body_mut()
            .read_json()
            .context("Failed to parse create label response")?;

        Ok(normalize_label(created))
    }

    fn get_profile(&self) -> Result<Profile> {
        let url = format!("{}/users/me/profile", Self::BASE_URL);

        let mut response = ureq::get(&url)
            .header("Authorization", &self.bearer()?)
            .call()
            .context("Failed to send profile request")?;

        let profile: ProfileResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse profile response")?;

        Ok(Profile {
            email_address: profile.email_address,
        })
    }
}
