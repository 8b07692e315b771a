//! Remote mailbox abstraction
//!
//! The migration engine talks to both accounts exclusively through the
//! [`Mailbox`] trait. [`GmailClient`](crate::gmail::GmailClient) implements it
//! against the Gmail REST API; [`InMemoryMailbox`] implements it in memory and
//! records every call, which is what the engine's tests run against.

mod memory;
mod traits;

pub use memory::{InMemoryMailbox, MailboxCall};
pub use traits::Mailbox;

use anyhow::Result;
use log::info;

use crate::models::{LabelId, MessageId, ThreadId};

/// Error indicating a message could not be retrieved (deleted, trashed or never existed)
#[derive(Debug, thiserror::Error)]
#[error("Message {0} not found")]
pub struct MessageNotFoundError(pub MessageId);

/// Error indicating the authorized account is not the one that was requested
#[derive(Debug, thiserror::Error)]
#[error("Authorized account {actual} does not match expected account {expected}")]
pub struct AccountMismatchError {
    pub expected: String,
    pub actual: String,
}

/// Reference to a message returned by a listing (just ID and thread ID)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: MessageId,
    pub thread_id: ThreadId,
}

/// One page of a message listing
#[derive(Debug, Clone, Default)]
pub struct MessagePage {
    pub messages: Vec<MessageRef>,
    /// Cursor for the next page; `None` on the last page
    pub next_page_token: Option<String>,
}

/// A raw message to be inserted into a mailbox
#[derive(Debug, Clone)]
pub struct InsertRequest {
    /// Full RFC 5322 message bytes
    pub raw: Vec<u8>,
    pub label_ids: Vec<LabelId>,
    /// Existing thread to attach the message to; `None` lets the server pick
    pub thread_id: Option<ThreadId>,
}

/// Result of a successful insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedMessage {
    pub id: MessageId,
    /// Thread the server placed the message in (possibly newly created)
    pub thread_id: ThreadId,
}

/// Identity of the account a mailbox is authorized for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub email_address: String,
}

/// Check that `mailbox` is authorized for `expected`
///
/// Addresses are compared case-insensitively.
pub fn verify_account(mailbox: &dyn Mailbox, expected: &str) -> Result<Profile> {
    let profile = mailbox.get_profile()?;
    if !profile.email_address.eq_ignore_ascii_case(expected) {
        return Err(AccountMismatchError {
            expected: expected.to_string(),
            actual: profile.email_address,
        }
        .into());
    }
    info!("Authorized as {}", profile.email_address);
    Ok(profile)
}
