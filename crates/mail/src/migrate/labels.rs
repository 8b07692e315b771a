//! Marker label for migrated messages

use anyhow::Result;
use log::info;

use super::Session;
use crate::mailbox::Mailbox;
use crate::models::{Label, LabelId, NewLabel};
use crate::retry::RemoteExecutor;

/// Name of the label attached to every migrated message
pub const DEFAULT_LABEL_NAME: &str = "mailsplit";

/// The marker label as far as this run knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerLabel {
    /// Exists at the destination
    Resolved(Label),
    /// Would be created, but this is a dry run
    Planned(String),
}

impl MarkerLabel {
    /// Label ID, unavailable for a planned label
    pub fn id(&self) -> Option<&LabelId> {
        match self {
            MarkerLabel::Resolved(label) => Some(&label.id),
            MarkerLabel::Planned(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MarkerLabel::Resolved(label) => &label.name,
            MarkerLabel::Planned(name) => name,
        }
    }
}

/// Finds or creates the marker label at the destination
pub struct LabelEnsurer<'a> {
    destination: &'a dyn Mailbox,
    executor: &'a RemoteExecutor,
    name: &'a str,
    dry_run: bool,
}

impl<'a> LabelEnsurer<'a> {
    pub fn new(
        destination: &'a dyn Mailbox,
        executor: &'a RemoteExecutor,
        name: &'a str,
        dry_run: bool,
    ) -> Self {
        Self {
            destination,
            executor,
            name,
            dry_run,
        }
    }

    /// Resolve the marker label, creating it if needed
    ///
    /// The result is cached in `session`; later calls make no remote
    /// requests. A missing label is created hidden from both the message
    /// list and the label list. In a dry run it is never created and a
    /// [`MarkerLabel::Planned`] placeholder is returned instead.
    pub fn resolve(&self, session: &mut Session) -> Result<MarkerLabel> {
        if let Some(label) = &session.label {
            return Ok(label.clone());
        }

        let labels = self
            .executor
            .execute("List labels", || self.destination.list_labels())?;

        let label = match labels.into_iter().find(|l| l.name == self.name) {
            Some(existing) => MarkerLabel::Resolved(existing),
            None if self.dry_run => {
                info!("Would have created label {}", self.name);
                MarkerLabel::Planned(self.name.to_string())
            }
            None => {
                let created = self.executor.execute("Create label", || {
                    self.destination.create_label(NewLabel::hidden(self.name))
                })?;
                info!("Created label with id {}", created.id.as_str());
                MarkerLabel::Resolved(created)
            }
        };

        session.label = Some(label.clone());
        Ok(label)
    }
}
