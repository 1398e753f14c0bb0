use thiserror::Error;

use crate::backend::BackendError;

/// Errors raised by the bot core: registry operations, dialog transitions
/// and command handling.
///
/// Backend failures wrap [`BackendError`] and are always reported back to
/// the chat that triggered them. Validation variants carry enough context
/// to render a user-facing message. Nothing here terminates the process;
/// fatal conditions go through the supervisor's fatal channel instead.
#[derive(Debug, Error)]
pub enum BotError {
    /// Wrapper around failures from the messaging backend.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// `begin` was called while the contact already has an open dialog.
    #[error("a dialog is already in progress for this contact")]
    AlreadyInProgress,

    /// `advance` was called for a contact with no open dialog.
    #[error("no active conversation for this contact")]
    NoActiveConversation,

    /// Session name already registered (case-insensitive).
    #[error("a bot named \"{0}\" already exists")]
    DuplicateName(String),

    /// No session with the given id in the registry.
    #[error("no bot with id {0}")]
    SessionNotFound(u64),

    /// Rejected session name (empty, too long).
    #[error("invalid bot name: {0}")]
    InvalidName(String),

    /// Media exceeds the configured payload cap.
    #[error("media too large: {size} bytes (limit {limit})")]
    MediaTooLarge { size: usize, limit: usize },

    /// Roster or auth-state filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Roster serialization failure.
    #[error("roster serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
