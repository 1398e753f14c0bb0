//! Test utilities & fixtures.
//!
//! `MockClient` is a scriptable [`MessagingClient`] that records every
//! outbound call; `MockConnector` hands out mock clients and keeps the
//! event senders so tests can drive session lifecycles.

#![allow(dead_code)] // Each test target uses a subset of these helpers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use botfleet::backend::{
    BackendError, ChatInfo, ClientConnector, ConnectOptions, MediaPayload, MessageRef,
    MessagingClient, SessionEvent,
};

#[derive(Default)]
pub struct MockClient {
    pub chats: Mutex<Vec<ChatInfo>>,
    pub downloadable: Mutex<Option<MediaPayload>>,
    pub fail_fetch: AtomicBool,
    pub fail_forward: AtomicBool,
    pub fail_send_text: AtomicBool,
    pub sent_texts: Mutex<Vec<(String, String)>>,
    pub sent_media: Mutex<Vec<(String, usize)>>,
    pub forwards: Mutex<Vec<(String, String)>>,
    pub invites: Mutex<Vec<String>>,
    pub destroyed: AtomicBool,
}

impl MockClient {
    pub fn with_chats(chats: Vec<ChatInfo>) -> Arc<Self> {
        let client = Self::default();
        *client.chats.lock().unwrap() = chats;
        Arc::new(client)
    }

    pub fn set_downloadable(&self, mime: &str, bytes: usize) {
        *self.downloadable.lock().unwrap() = Some(MediaPayload {
            mime: mime.to_string(),
            data: vec![0u8; bytes],
        });
    }

    /// All text replies sent to one chat, in order.
    pub fn texts_to(&self, chat_id: &str) -> Vec<String> {
        self.sent_texts
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == chat_id)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn last_text_to(&self, chat_id: &str) -> Option<String> {
        self.texts_to(chat_id).pop()
    }
}

#[async_trait]
impl MessagingClient for MockClient {
    async fn send_text(&self, chat_id: &str, body: &str) -> Result<(), BackendError> {
        if self.fail_send_text.load(Ordering::Relaxed) {
            return Err(BackendError::Transport("send failed".to_string()));
        }
        self.sent_texts
            .lock()
            .unwrap()
            .push((chat_id.to_string(), body.to_string()));
        Ok(())
    }

    async fn send_media(&self, chat_id: &str, media: MediaPayload) -> Result<(), BackendError> {
        self.sent_media
            .lock()
            .unwrap()
            .push((chat_id.to_string(), media.size()));
        Ok(())
    }

    async fn forward_message(&self, msg: &MessageRef, chat_id: &str) -> Result<(), BackendError> {
        if self.fail_forward.load(Ordering::Relaxed) {
            return Err(BackendError::Rejected("forward refused".to_string()));
        }
        self.forwards
            .lock()
            .unwrap()
            .push((msg.message_id.clone(), chat_id.to_string()));
        Ok(())
    }

    async fn download_media(&self, _msg: &MessageRef) -> Result<MediaPayload, BackendError> {
        self.downloadable
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BackendError::Rejected("no media".to_string()))
    }

    async fn fetch_chats(&self) -> Result<Vec<ChatInfo>, BackendError> {
        if self.fail_fetch.load(Ordering::Relaxed) {
            return Err(BackendError::Transport("link down".to_string()));
        }
        Ok(self.chats.lock().unwrap().clone())
    }

    async fn accept_invite(&self, code: &str) -> Result<(), BackendError> {
        self.invites.lock().unwrap().push(code.to_string());
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        self.destroyed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

/// Connector that hands each session a fresh [`MockClient`] and remembers
/// both the client and the event sender, keyed by session id.
#[derive(Default)]
pub struct MockConnector {
    pub clients: Mutex<HashMap<u64, Arc<MockClient>>>,
    pub event_senders: Mutex<HashMap<u64, mpsc::UnboundedSender<SessionEvent>>>,
}

impl MockConnector {
    pub fn client(&self, session_id: u64) -> Arc<MockClient> {
        Arc::clone(self.clients.lock().unwrap().get(&session_id).expect("client"))
    }

    pub fn send_event(&self, session_id: u64, event: SessionEvent) {
        self.event_senders
            .lock()
            .unwrap()
            .get(&session_id)
            .expect("event sender")
            .send(event)
            .expect("session task alive");
    }
}

#[async_trait]
impl ClientConnector for MockConnector {
    async fn connect(
        &self,
        session_id: u64,
        _opts: ConnectOptions,
    ) -> Result<
        (
            Arc<dyn MessagingClient>,
            mpsc::UnboundedReceiver<SessionEvent>,
        ),
        BackendError,
    > {
        let client = Arc::new(MockClient::default());
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients
            .lock()
            .unwrap()
            .insert(session_id, Arc::clone(&client));
        self.event_senders.lock().unwrap().insert(session_id, tx);
        Ok((client, rx))
    }
}

pub fn group(id: &str, name: &str) -> ChatInfo {
    ChatInfo {
        id: id.to_string(),
        name: name.to_string(),
        is_group: true,
    }
}

pub fn private_chat(id: &str, name: &str) -> ChatInfo {
    ChatInfo {
        id: id.to_string(),
        name: name.to_string(),
        is_group: false,
    }
}
