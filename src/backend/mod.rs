//! Messaging backend boundary.
//!
//! The actual backend client (connection handshake, QR pairing, transport,
//! media codecs) lives outside this crate. Everything here is the seam the
//! core talks through: a normalized event set, explicit data contracts for
//! inbound messages and chats, and the [`MessagingClient`] /
//! [`ClientConnector`] capability traits a deployment implements against its
//! bridge. The core never references backend-specific event names.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod detached;

/// Reserved destination for the backend's status/story feed.
pub const BROADCAST_TARGET: &str = "status@broadcast";

/// Errors surfaced by the messaging backend.
///
/// Always caught at the command-handler boundary and turned into a chat
/// reply plus a log line; a backend failure never crashes a session.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The client is not connected or not yet authenticated.
    #[error("backend not connected")]
    NotConnected,

    /// The backend accepted the request but reported a failure.
    #[error("backend rejected operation: {0}")]
    Rejected(String),

    /// Transport-level failure (socket, bridge process, timeout).
    #[error("backend transport error: {0}")]
    Transport(String),
}

/// Stable reference to a message, sufficient to forward it or download
/// its media later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: String,
    pub message_id: String,
}

/// Normalized inbound message, decoupled from the backend's object shape.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Reference to this message itself (for forward / media download).
    pub message_ref: MessageRef,
    /// Stable identity of the sending contact.
    pub sender_id: String,
    /// Chat the message arrived in; replies go back here.
    pub chat_id: String,
    pub body: String,
    /// True for a one-on-one chat, false for a group chat.
    pub is_private: bool,
    pub has_media: bool,
    /// Set when this message quotes (replies to) another message.
    pub quoted: Option<MessageRef>,
}

/// One entry from the backend's chat list.
#[derive(Debug, Clone)]
pub struct ChatInfo {
    pub id: String,
    pub name: String,
    pub is_group: bool,
}

/// Downloaded media blob.
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub mime: String,
    pub data: Vec<u8>,
}

impl MediaPayload {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Lifecycle and message events for one session, delivered in arrival
/// order over the channel returned by [`ClientConnector::connect`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A pairing code needs to be scanned by the operator.
    Qr(String),
    /// Credentials were accepted (from a fresh scan or a saved session).
    Authenticated,
    /// Authentication failed; saved credentials are no longer valid.
    AuthFailure(String),
    /// The session is fully connected and can send.
    Ready,
    /// The backend link dropped.
    Disconnected(String),
    Message(InboundMessage),
}

/// One authenticated connection to the messaging backend.
///
/// All operations are fire-and-forget from the dispatch algorithm's point
/// of view but each awaits backend acknowledgement before returning, so a
/// handler's turn ends only after its side effects are settled.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn send_text(&self, chat_id: &str, body: &str) -> Result<(), BackendError>;

    async fn send_media(&self, chat_id: &str, media: MediaPayload) -> Result<(), BackendError>;

    /// Server-side forward of an existing message to another chat.
    async fn forward_message(&self, msg: &MessageRef, chat_id: &str) -> Result<(), BackendError>;

    async fn download_media(&self, msg: &MessageRef) -> Result<MediaPayload, BackendError>;

    /// Full chat list (groups, private chats and the broadcast feed).
    async fn fetch_chats(&self) -> Result<Vec<ChatInfo>, BackendError>;

    /// Accept a group invitation by its invite code.
    async fn accept_invite(&self, code: &str) -> Result<(), BackendError>;

    /// Tear down the connection and release backend-side resources.
    async fn destroy(&self) -> Result<(), BackendError>;
}

/// Options passed to the connector when a session starts.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Directory holding this session's persisted credentials.
    pub auth_path: PathBuf,
    /// How many pairing codes to offer before giving up. Unattended
    /// deployments use a tight budget so a stuck session fails fast.
    pub qr_max_retries: u32,
}

/// Factory for backend clients. A deployment implements this once against
/// its bridge; the registry calls it for every session it starts.
#[async_trait]
pub trait ClientConnector: Send + Sync {
    async fn connect(
        &self,
        session_id: u64,
        opts: ConnectOptions,
    ) -> Result<
        (
            Arc<dyn MessagingClient>,
            mpsc::UnboundedReceiver<SessionEvent>,
        ),
        BackendError,
    >;
}
