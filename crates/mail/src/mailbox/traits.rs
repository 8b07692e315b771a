//! Mailbox trait definition

use anyhow::Result;

use super::{InsertRequest, InsertedMessage, MessagePage, Profile};
use crate::models::{Label, Message, MessageId, NewLabel};

/// Trait for remote mailbox operations
///
/// Implementations perform exactly one remote request per call and never
/// retry on their own; retrying is the job of
/// [`RemoteExecutor`](crate::retry::RemoteExecutor).
pub trait Mailbox: Send + Sync {
    /// List one page of messages matching a Gmail search query
    fn list_messages(&self, query: &str, page_token: Option<&str>) -> Result<MessagePage>;

    /// Fetch a message in raw form
    ///
    /// Fails with [`MessageNotFoundError`](super::MessageNotFoundError) when
    /// the message does not exist.
    fn get_raw_message(&self, id: &MessageId) -> Result<Message>;

    /// Insert a raw message
    fn insert_message(&self, request: InsertRequest) -> Result<InsertedMessage>;

    /// Move a message to the trash
    fn trash_message(&self, id: &MessageId) -> Result<()>;

    /// List all labels
    fn list_labels(&self) -> Result<Vec<Label>>;

    /// Create a label
    fn create_label(&self, label: NewLabel) -> Result<Label>;

    /// Get the profile of the authorized account
    fn get_profile(&self) -> Result<Profile>;
}
