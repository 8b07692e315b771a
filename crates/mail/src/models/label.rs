//! Label model representing a Gmail label

use serde::{Deserialize, Serialize};

/// Unique identifier for a label (Gmail label ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelId(pub String);

impl LabelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LabelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LabelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A mail label as it exists in a mailbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label ID (e.g., "INBOX", "Label_123")
    pub id: LabelId,
    /// Display name
    pub name: String,
}

impl Label {
    /// Create a new label
    pub fn new(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Whether messages carrying a label are shown in the message list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageListVisibility {
    Show,
    Hide,
}

/// Whether a label is shown in the label list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LabelListVisibility {
    LabelShow,
    LabelShowIfUnread,
    LabelHide,
}

/// Request body for creating a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLabel {
    pub name: String,
    pub message_list_visibility: MessageListVisibility,
    pub label_list_visibility: LabelListVisibility,
}

impl NewLabel {
    /// A label that stays out of both the message list and the label list
    pub fn hidden(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message_list_visibility: MessageListVisibility::Hide,
            label_list_visibility: LabelListVisibility::LabelHide,
        }
    }
}
