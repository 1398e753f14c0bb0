//! Bot session lifecycle.
//!
//! A [`BotSession`] wraps one authenticated backend connection. Events for
//! a session are processed strictly one at a time, in arrival order, by a
//! dedicated task spawned in [`spawn_session`]; conversation and group
//! state therefore need no internal locking. The registry and supervisor
//! observe a session only through its shared [`SessionStatus`] snapshot,
//! which the owning task alone mutates.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::backend::{InboundMessage, MessagingClient, SessionEvent, BROADCAST_TARGET};
use crate::config::{Config, DeployMode};
use crate::logutil::escape_log;

use super::commands;
use super::conversation::ConversationStore;
use super::groups::GroupDirectory;

/// Connection lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Created = 0,
    Authenticating = 1,
    Ready = 2,
    Disconnected = 3,
}

impl ReadyState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ReadyState::Authenticating,
            2 => ReadyState::Ready,
            3 => ReadyState::Disconnected,
            _ => ReadyState::Created,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReadyState::Created => "created",
            ReadyState::Authenticating => "authenticating",
            ReadyState::Ready => "ready",
            ReadyState::Disconnected => "disconnected",
        }
    }
}

/// Lock-free status snapshot shared with the registry and supervisor.
///
/// Only the session's own event task writes these fields; everyone else
/// takes plain snapshot reads.
#[derive(Debug, Default)]
pub struct SessionStatus {
    ready_state: AtomicU8,
    authenticated: AtomicBool,
}

impl SessionStatus {
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready_state.load(Ordering::Relaxed))
    }

    pub fn is_ready(&self) -> bool {
        self.ready_state() == ReadyState::Ready
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Relaxed)
    }

    fn set_ready_state(&self, state: ReadyState) {
        self.ready_state.store(state as u8, Ordering::Relaxed);
    }

    fn set_authenticated(&self, value: bool) {
        self.authenticated.store(value, Ordering::Relaxed);
    }
}

/// Per-session knobs carried over from the config and deployment mode.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub cancel_keyword: String,
    pub max_media_bytes: usize,
    pub mode: DeployMode,
}

impl SessionSettings {
    pub fn from_config(config: &Config, mode: DeployMode) -> Self {
        Self {
            cancel_keyword: config.manager.cancel_keyword.clone(),
            max_media_bytes: config.manager.max_media_bytes,
            mode,
        }
    }
}

/// One chat-bot session: identity, backend client, dialog and group state.
pub struct BotSession {
    pub id: u64,
    pub name: String,
    pub(crate) client: Arc<dyn MessagingClient>,
    pub(crate) status: Arc<SessionStatus>,
    pub(crate) conversations: ConversationStore,
    pub(crate) groups: GroupDirectory,
    pub(crate) settings: SessionSettings,
}

impl BotSession {
    pub fn new(
        id: u64,
        name: String,
        client: Arc<dyn MessagingClient>,
        status: Arc<SessionStatus>,
        settings: SessionSettings,
    ) -> Self {
        let conversations = ConversationStore::new(settings.cancel_keyword.clone());
        Self {
            id,
            name,
            client,
            status,
            conversations,
            groups: GroupDirectory::new(),
            settings,
        }
    }

    pub fn status(&self) -> Arc<SessionStatus> {
        Arc::clone(&self.status)
    }

    /// Apply one backend event. The lifecycle runs `Created` to
    /// `Authenticating` (on a pairing code or auth event) to `Ready`, and
    /// `Ready` and `Disconnected` alternate on reconnects; `authenticated`
    /// tracks auth events independently and is cleared on auth failure and
    /// on disconnect.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Qr(code) => {
                if self.status.ready_state() == ReadyState::Created {
                    self.status.set_ready_state(ReadyState::Authenticating);
                }
                info!(
                    "bot {} ({}): scan pairing code to log in:\n{}",
                    self.name, self.id, code
                );
                if self.settings.mode.is_unattended() {
                    warn!(
                        "bot {}: unattended deployment; scan before the QR retry budget runs out or the process will restart",
                        self.name
                    );
                }
            }
            SessionEvent::Authenticated => {
                self.status.set_authenticated(true);
                if self.status.ready_state() == ReadyState::Created {
                    self.status.set_ready_state(ReadyState::Authenticating);
                }
                info!("bot {}: authenticated", self.name);
            }
            SessionEvent::AuthFailure(reason) => {
                self.status.set_authenticated(false);
                error!("bot {}: authentication failed: {}", self.name, escape_log(&reason));
            }
            SessionEvent::Ready => {
                self.status.set_ready_state(ReadyState::Ready);
                self.status.set_authenticated(true);
                info!(
                    "bot {} ready (environment: {})",
                    self.name,
                    self.settings.mode.label()
                );
                match self.client.fetch_chats().await {
                    Ok(chats) => {
                        let has_broadcast = chats.iter().any(|c| c.id == BROADCAST_TARGET);
                        self.groups.rebuild_from(chats);
                        info!(
                            "bot {}: {} group(s), broadcast feed {}",
                            self.name,
                            self.groups.len(),
                            if has_broadcast { "available" } else { "unavailable" }
                        );
                    }
                    Err(e) => warn!("bot {}: could not list chats after ready: {}", self.name, e),
                }
            }
            SessionEvent::Disconnected(reason) => {
                self.status.set_ready_state(ReadyState::Disconnected);
                self.status.set_authenticated(false);
                warn!("bot {} disconnected: {}", self.name, escape_log(&reason));
            }
            SessionEvent::Message(msg) => {
                self.dispatch(msg).await;
            }
        }
    }

    /// Route one inbound message through the command surface.
    pub async fn dispatch(&mut self, msg: InboundMessage) {
        debug!(
            "bot {}: message from {} ({}): {}",
            self.name,
            escape_log(&msg.sender_id),
            if msg.is_private { "private" } else { "group" },
            escape_log(&msg.body)
        );
        commands::dispatch(self, &msg).await;
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.client.destroy().await {
            warn!("bot {}: backend teardown reported: {}", self.name, e);
        }
        self.status.set_ready_state(ReadyState::Disconnected);
        self.status.set_authenticated(false);
        info!("bot \"{}\" stopped", self.name);
    }
}

pub enum ControlMessage {
    Shutdown(oneshot::Sender<()>),
}

/// Handle kept by the registry for a running session task.
pub struct SessionHandle {
    pub id: u64,
    pub name: String,
    status: Arc<SessionStatus>,
    control_tx: mpsc::UnboundedSender<ControlMessage>,
    join: JoinHandle<()>,
}

impl SessionHandle {
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Graceful stop: the session finishes its in-flight event, tears the
    /// backend connection down and acknowledges before the task exits.
    pub async fn shutdown(self) {
        let (tx, rx) = oneshot::channel();
        if self.control_tx.send(ControlMessage::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        let _ = self.join.await;
    }
}

/// Spawn the event task that owns a session.
///
/// Events are consumed one at a time; a slow handler in this session never
/// stalls other sessions, which run their own tasks. When the event channel
/// closes (backend bridge gone) the task marks the session disconnected and
/// lingers until the registry shuts it down.
pub fn spawn_session(
    mut session: BotSession,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) -> SessionHandle {
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let id = session.id;
    let name = session.name.clone();
    let status = session.status();

    let join = tokio::spawn(async move {
        let mut events_open = true;
        loop {
            tokio::select! {
                cmd = control_rx.recv() => {
                    match cmd {
                        Some(ControlMessage::Shutdown(ack)) => {
                            session.shutdown().await;
                            let _ = ack.send(());
                            break;
                        }
                        None => {
                            // Registry dropped the handle without a shutdown;
                            // tear down anyway.
                            session.shutdown().await;
                            break;
                        }
                    }
                }
                ev = events.recv(), if events_open => {
                    match ev {
                        Some(ev) => session.handle_event(ev).await,
                        None => {
                            events_open = false;
                            session.handle_event(SessionEvent::Disconnected(
                                "event stream closed".to_string(),
                            )).await;
                        }
                    }
                }
            }
        }
        debug!("session task for bot {} terminated", session.name);
    });

    SessionHandle {
        id,
        name,
        status,
        control_tx,
        join,
    }
}
