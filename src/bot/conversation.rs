//! Per-contact multi-step dialog state.
//!
//! A [`ConversationStore`] holds at most one [`PendingConversation`] per
//! contact. The only flow today is "compose message to group": pick a group
//! from a numbered menu, then type the message body. The candidate list is
//! a snapshot captured when the dialog starts, so menu numbering stays
//! stable even if the group directory is refreshed mid-dialog.
//!
//! Transitions are all-or-nothing: a step either commits fully (state
//! replaced, or the dialog removed) or leaves the dialog untouched. An
//! invalid selection keeps the dialog alive so the contact can retry; only
//! completion and cancellation remove it. Dialogs never expire on a timer.

use std::collections::HashMap;

use super::errors::BotError;

/// Where a dialog currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogStep {
    /// Waiting for a 1-based menu selection (or the cancel keyword).
    SelectGroup,
    /// Group chosen; waiting for the message body (or the cancel keyword).
    InputMessage,
}

/// One in-progress dialog with a single contact.
#[derive(Debug, Clone)]
pub struct PendingConversation {
    pub step: DialogStep,
    /// `(group_id, group_name)` pairs captured at dialog start.
    pub candidate_groups: Vec<(String, String)>,
    pub selected_group: Option<(String, String)>,
}

/// Result of feeding one inbound reply into an open dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The contact typed the cancel keyword; the dialog is gone.
    Cancelled,
    /// Input was not a valid menu number; the dialog is unchanged.
    InvalidSelection,
    /// A group was selected; now waiting for the message body.
    AwaitingMessage { group_name: String },
    /// The dialog completed; the caller performs the actual send.
    ReadyToSend {
        group_id: String,
        group_name: String,
        body: String,
    },
}

/// Dialogs for one session, keyed by contact identity.
#[derive(Debug)]
pub struct ConversationStore {
    dialogs: HashMap<String, PendingConversation>,
    cancel_keyword: String,
}

impl ConversationStore {
    pub fn new(cancel_keyword: impl Into<String>) -> Self {
        Self {
            dialogs: HashMap::new(),
            cancel_keyword: cancel_keyword.into().to_lowercase(),
        }
    }

    /// Whether this contact has an open dialog.
    pub fn has_pending(&self, contact_id: &str) -> bool {
        self.dialogs.contains_key(contact_id)
    }

    pub fn len(&self) -> usize {
        self.dialogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialogs.is_empty()
    }

    /// Start a dialog at [`DialogStep::SelectGroup`] with a snapshot of the
    /// current candidate groups.
    pub fn begin(
        &mut self,
        contact_id: &str,
        candidate_groups: Vec<(String, String)>,
    ) -> Result<(), BotError> {
        if self.dialogs.contains_key(contact_id) {
            return Err(BotError::AlreadyInProgress);
        }
        self.dialogs.insert(
            contact_id.to_string(),
            PendingConversation {
                step: DialogStep::SelectGroup,
                candidate_groups,
                selected_group: None,
            },
        );
        Ok(())
    }

    /// Advance the contact's dialog with one inbound reply.
    pub fn advance(&mut self, contact_id: &str, input: &str) -> Result<Outcome, BotError> {
        let dialog = self
            .dialogs
            .get(contact_id)
            .ok_or(BotError::NoActiveConversation)?;

        let trimmed = input.trim();
        if trimmed.to_lowercase() == self.cancel_keyword {
            self.dialogs.remove(contact_id);
            return Ok(Outcome::Cancelled);
        }

        match dialog.step {
            DialogStep::SelectGroup => {
                // 1-based index into the snapshot. Parse and bounds-check
                // before touching any state.
                let selection: usize = match trimmed.parse() {
                    Ok(n) => n,
                    Err(_) => return Ok(Outcome::InvalidSelection),
                };
                if selection < 1 || selection > dialog.candidate_groups.len() {
                    return Ok(Outcome::InvalidSelection);
                }
                let chosen = dialog.candidate_groups[selection - 1].clone();
                let dialog = self
                    .dialogs
                    .get_mut(contact_id)
                    .expect("dialog present; checked above");
                dialog.selected_group = Some(chosen.clone());
                dialog.step = DialogStep::InputMessage;
                Ok(Outcome::AwaitingMessage {
                    group_name: chosen.1,
                })
            }
            DialogStep::InputMessage => {
                let dialog = self
                    .dialogs
                    .remove(contact_id)
                    .expect("dialog present; checked above");
                let (group_id, group_name) = dialog
                    .selected_group
                    .expect("InputMessage step always has a selection");
                Ok(Outcome::ReadyToSend {
                    group_id,
                    group_name,
                    body: input.to_string(),
                })
            }
        }
    }

    /// Peek at a contact's dialog (tests and diagnostics).
    pub fn get(&self, contact_id: &str) -> Option<&PendingConversation> {
        self.dialogs.get(contact_id)
    }
}
