//! Session-local cache of group chats.
//!
//! The directory backs the numbered menus shown to contacts, so iteration
//! order must be stable between a refresh and the dialog snapshot taken
//! from it: entries keep the order the backend reported them in.

use std::collections::HashSet;

use log::debug;

use crate::backend::{BackendError, MessagingClient};

/// Cache of `(group_id, group_name)` for one session.
///
/// Rebuilt wholesale by [`refresh`](GroupDirectory::refresh), never patched
/// incrementally; readers only ever observe the previous or the new list.
#[derive(Debug, Default)]
pub struct GroupDirectory {
    entries: Vec<(String, String)>,
}

impl GroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the directory with the backend's current group list.
    ///
    /// Duplicated ids in the chat list are collapsed, first occurrence
    /// wins. On a fetch error the existing entries are left untouched and
    /// the error is returned to the caller.
    pub async fn refresh(&mut self, client: &dyn MessagingClient) -> Result<(), BackendError> {
        let chats = client.fetch_chats().await?;
        self.rebuild_from(chats);
        Ok(())
    }

    /// Rebuild from an already-fetched chat list (shared with the ready
    /// handler, which needs the full list for the broadcast check too).
    pub(crate) fn rebuild_from(&mut self, chats: Vec<crate::backend::ChatInfo>) {
        let mut fresh = Vec::new();
        let mut seen = HashSet::new();
        for chat in chats {
            if chat.is_group && seen.insert(chat.id.clone()) {
                fresh.push((chat.id, chat.name));
            }
        }
        debug!("group directory refreshed: {} group(s)", fresh.len());
        self.entries = fresh;
    }

    /// Entries in last-refresh discovery order.
    pub fn list_ordered(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Snapshot for a dialog's candidate list.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }

    /// Case-insensitive substring match over group names; first match in
    /// iteration order wins.
    pub fn find_by_name_substring(&self, query: &str) -> Option<&str> {
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .find(|(_, name)| name.to_lowercase().contains(&needle))
            .map(|(id, _)| id.as_str())
    }

    /// Display name for a group id, if present.
    pub fn name_of(&self, group_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == group_id)
            .map(|(_, name)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the numbered menu shown before a group selection.
    pub fn render_menu(&self, header: &str, footer: &str) -> String {
        let mut out = String::from(header);
        out.push_str("\n\n");
        for (index, (_, name)) in self.entries.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", index + 1, name));
        }
        out.push('\n');
        out.push_str(footer);
        out
    }

    #[cfg(test)]
    pub fn with_entries(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }
}
