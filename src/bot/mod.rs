//! # Bot Core Module
//!
//! Everything that makes a fleet of chat bots tick: per-session
//! conversational state, command dispatch, the session registry and the
//! process supervisor.
//!
//! ## Components
//!
//! - [`session`] - One bot session: lifecycle state machine and event task
//! - [`commands`] - Chat command surface and dispatch priority order
//! - [`conversation`] - Per-contact multi-step dialog state
//! - [`groups`] - Session-local group directory cache
//! - [`registry`] - Session registry and JSON roster persistence
//! - [`supervisor`] - Health report, keep-alive restart, stale cleanup
//! - [`errors`] - Domain error type
//!
//! ## Concurrency model
//!
//! Each session is logically single-threaded: its events are consumed one
//! at a time by one spawned task, so dialog and group state need no
//! internal locks. Sessions run independently; a slow backend call in one
//! never stalls another. The registry lives behind a `tokio::sync::Mutex`
//! shared by the menu and the supervisor, whose periodic actions only read
//! lock-free status snapshots or remove whole entries.

pub mod commands;
pub mod conversation;
pub mod errors;
pub mod groups;
pub mod registry;
pub mod session;
pub mod supervisor;

pub use conversation::{ConversationStore, Outcome};
pub use errors::BotError;
pub use groups::GroupDirectory;
pub use registry::SessionRegistry;
pub use session::{BotSession, ReadyState, SessionSettings, SessionStatus};
pub use supervisor::Supervisor;
