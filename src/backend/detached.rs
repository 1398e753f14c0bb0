//! Detached backend: lets the manager run with no bridge attached.
//!
//! Every session connected through [`DetachedConnector`] immediately
//! observes a `Disconnected` event and all client operations fail with
//! `NotConnected`. Useful for exercising the registry, menu and supervisor
//! on a machine without backend credentials.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    BackendError, ChatInfo, ClientConnector, ConnectOptions, MediaPayload, MessageRef,
    MessagingClient, SessionEvent,
};

pub struct DetachedConnector;

struct DetachedClient;

#[async_trait]
impl MessagingClient for DetachedClient {
    async fn send_text(&self, _chat_id: &str, _body: &str) -> Result<(), BackendError> {
        Err(BackendError::NotConnected)
    }

    async fn send_media(&self, _chat_id: &str, _media: MediaPayload) -> Result<(), BackendError> {
        Err(BackendError::NotConnected)
    }

    async fn forward_message(&self, _msg: &MessageRef, _chat_id: &str) -> Result<(), BackendError> {
        Err(BackendError::NotConnected)
    }

    async fn download_media(&self, _msg: &MessageRef) -> Result<MediaPayload, BackendError> {
        Err(BackendError::NotConnected)
    }

    async fn fetch_chats(&self) -> Result<Vec<ChatInfo>, BackendError> {
        Err(BackendError::NotConnected)
    }

    async fn accept_invite(&self, _code: &str) -> Result<(), BackendError> {
        Err(BackendError::NotConnected)
    }

    async fn destroy(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

#[async_trait]
impl ClientConnector for DetachedConnector {
    async fn connect(
        &self,
        _session_id: u64,
        _opts: ConnectOptions,
    ) -> Result<
        (
            Arc<dyn MessagingClient>,
            mpsc::UnboundedReceiver<SessionEvent>,
        ),
        BackendError,
    > {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(SessionEvent::Disconnected(
            "no backend bridge attached".to_string(),
        ));
        Ok((Arc::new(DetachedClient), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detached_client_rejects_sends() {
        let (client, mut rx) = DetachedConnector
            .connect(
                1,
                ConnectOptions {
                    auth_path: std::path::PathBuf::from("/tmp/none"),
                    qr_max_retries: 1,
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(SessionEvent::Disconnected(_))
        ));
        assert!(matches!(
            client.send_text("chat", "hi").await,
            Err(BackendError::NotConnected)
        ));
    }
}
