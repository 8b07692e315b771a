//! Domain models for mail entities

mod label;
mod message;
mod thread;

pub use label::{Label, LabelId, LabelListVisibility, MessageListVisibility, NewLabel};
pub use message::{Message, MessageBuilder, MessageId};
pub use thread::ThreadId;
