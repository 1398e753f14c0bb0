//! Message dispatch flows: command surface, dialogs, broadcast publishing.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use botfleet::backend::{InboundMessage, MessageRef, SessionEvent, BROADCAST_TARGET};
use botfleet::bot::{BotSession, SessionSettings, SessionStatus};
use botfleet::config::DeployMode;

use common::{group, private_chat, MockClient};

fn settings(mode: DeployMode) -> SessionSettings {
    SessionSettings {
        cancel_keyword: "batal".to_string(),
        max_media_bytes: 15 * 1024 * 1024,
        mode,
    }
}

fn session_with(client: Arc<MockClient>, mode: DeployMode) -> BotSession {
    BotSession::new(
        7,
        "TestBot".to_string(),
        client,
        Arc::new(SessionStatus::default()),
        settings(mode),
    )
}

fn private_msg(sender: &str, body: &str) -> InboundMessage {
    InboundMessage {
        message_ref: MessageRef {
            chat_id: sender.to_string(),
            message_id: "m1".to_string(),
        },
        sender_id: sender.to_string(),
        chat_id: sender.to_string(),
        body: body.to_string(),
        is_private: true,
        has_media: false,
        quoted: None,
    }
}

fn media_msg(sender: &str, body: &str) -> InboundMessage {
    InboundMessage {
        has_media: true,
        ..private_msg(sender, body)
    }
}

fn two_group_client() -> Arc<MockClient> {
    MockClient::with_chats(vec![
        group("g1", "Alpha"),
        group("g2", "Beta"),
        private_chat("p1", "Carol"),
    ])
}

#[tokio::test]
async fn plain_text_without_dialog_is_ignored() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", "1")).await;
    session.dispatch(private_msg("alice", "hello there")).await;

    assert!(client.sent_texts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn ack_command_replies_in_any_chat() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", ".ABSEN")).await;
    assert_eq!(client.last_text_to("alice"), Some("ngok".to_string()));

    // Also matches in group chats.
    let mut from_group = private_msg("bob", ".absen");
    from_group.is_private = false;
    from_group.chat_id = "g1".to_string();
    session.dispatch(from_group).await;
    assert_eq!(client.last_text_to("g1"), Some("ngok".to_string()));
}

#[tokio::test]
async fn private_only_commands_are_ignored_in_groups() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    let mut msg = private_msg("alice", ".kirim_pesan");
    msg.is_private = false;
    msg.chat_id = "g1".to_string();
    session.dispatch(msg).await;

    assert!(client.sent_texts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn compose_flow_end_to_end() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", ".kirim_pesan")).await;
    let menu = client.last_text_to("alice").unwrap();
    assert!(menu.contains("1. Alpha"));
    assert!(menu.contains("2. Beta"));

    session.dispatch(private_msg("alice", "1")).await;
    assert!(client.last_text_to("alice").unwrap().contains("Alpha"));

    session.dispatch(private_msg("alice", "hello")).await;
    assert_eq!(client.texts_to("g1"), vec!["hello".to_string()]);
    assert!(client.last_text_to("alice").unwrap().contains("sent"));

    // Dialog is gone: a stray number routes nowhere.
    let before = client.sent_texts.lock().unwrap().len();
    session.dispatch(private_msg("alice", "2")).await;
    assert_eq!(client.sent_texts.lock().unwrap().len(), before);
    assert!(client.texts_to("g2").is_empty());
}

#[tokio::test]
async fn invalid_selection_keeps_dialog_alive() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", ".kirim_pesan")).await;
    session.dispatch(private_msg("alice", "3")).await;
    assert!(client.last_text_to("alice").unwrap().contains("Invalid choice"));

    // Retry with a valid number still works against the same snapshot.
    session.dispatch(private_msg("alice", "2")).await;
    assert!(client.last_text_to("alice").unwrap().contains("Beta"));
}

#[tokio::test]
async fn cancel_keyword_ends_dialog_at_any_step() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", ".kirim_pesan")).await;
    session.dispatch(private_msg("alice", "batal")).await;
    assert_eq!(client.last_text_to("alice"), Some("Cancelled.".to_string()));

    // Back to stateless routing: numbers are ignored again.
    let before = client.sent_texts.lock().unwrap().len();
    session.dispatch(private_msg("alice", "1")).await;
    assert_eq!(client.sent_texts.lock().unwrap().len(), before);
}

#[tokio::test]
async fn compose_while_dialog_open_is_rejected() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", ".kirim_pesan")).await;
    session.dispatch(private_msg("alice", ".kirim_pesan")).await;
    assert!(client
        .last_text_to("alice")
        .unwrap()
        .contains("already have a dialog"));

    // The original dialog still advances normally.
    session.dispatch(private_msg("alice", "1")).await;
    assert!(client.last_text_to("alice").unwrap().contains("Alpha"));
}

#[tokio::test]
async fn dialogs_do_not_interfere_across_contacts() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", ".kirim_pesan")).await;
    session.dispatch(private_msg("alice", "1")).await;

    // Bob has no dialog; his text routes to stateless matching only.
    session.dispatch(private_msg("bob", "2")).await;
    assert!(client.texts_to("bob").is_empty());

    session.dispatch(private_msg("alice", "for the group")).await;
    assert_eq!(client.texts_to("g1"), vec!["for the group".to_string()]);
}

#[tokio::test]
async fn compose_with_no_groups_stops_early() {
    let client = MockClient::with_chats(vec![private_chat("p1", "Carol")]);
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", ".kirim_pesan")).await;
    assert!(client
        .last_text_to("alice")
        .unwrap()
        .contains("not joined any group"));
}

#[tokio::test]
async fn broadcast_publish_prefers_direct_forward() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);
    session.handle_event(SessionEvent::Ready).await;

    session.dispatch(media_msg("alice", ".bikin_sw")).await;

    let forwards = client.forwards.lock().unwrap().clone();
    assert_eq!(forwards, vec![("m1".to_string(), BROADCAST_TARGET.to_string())]);
    assert!(client.sent_media.lock().unwrap().is_empty());
    assert!(client.last_text_to("alice").unwrap().contains("published"));
}

#[tokio::test]
async fn broadcast_fallback_downloads_and_resends() {
    let client = two_group_client();
    client.fail_forward.store(true, Ordering::Relaxed);
    client.set_downloadable("image/jpeg", 1024);
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);
    session.handle_event(SessionEvent::Ready).await;

    session.dispatch(media_msg("alice", ".bikin_sw")).await;

    let media = client.sent_media.lock().unwrap().clone();
    assert_eq!(media, vec![(BROADCAST_TARGET.to_string(), 1024)]);
    assert!(client.last_text_to("alice").unwrap().contains("fallback"));
}

#[tokio::test]
async fn oversized_media_never_reaches_fallback_send() {
    let client = two_group_client();
    client.fail_forward.store(true, Ordering::Relaxed);
    client.set_downloadable("video/mp4", 16 * 1024 * 1024);
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);
    session.handle_event(SessionEvent::Ready).await;

    session.dispatch(media_msg("alice", ".bikin_sw")).await;

    assert!(client.sent_media.lock().unwrap().is_empty());
    let reply = client.last_text_to("alice").unwrap();
    assert!(reply.contains("too large"));
    assert!(reply.contains("16.00MB"));
}

#[tokio::test]
async fn broadcast_publish_requires_ready_session() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(media_msg("alice", ".bikin_sw")).await;

    assert!(client.forwards.lock().unwrap().is_empty());
    assert!(client.last_text_to("alice").unwrap().contains("not ready"));
}

#[tokio::test]
async fn quoted_forward_requires_a_quote() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", ".forward_status")).await;
    assert!(client.last_text_to("alice").unwrap().contains("Reply-quote"));
    assert!(client.forwards.lock().unwrap().is_empty());

    let mut with_quote = private_msg("alice", ".forward_status");
    with_quote.quoted = Some(MessageRef {
        chat_id: "alice".to_string(),
        message_id: "q9".to_string(),
    });
    session.dispatch(with_quote).await;
    assert_eq!(
        client.forwards.lock().unwrap().clone(),
        vec![("q9".to_string(), BROADCAST_TARGET.to_string())]
    );
}

#[tokio::test]
async fn media_to_named_group_resolves_substring() {
    let client = two_group_client();
    client.set_downloadable("image/png", 2048);
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session
        .dispatch(media_msg("alice", ".kirim_ke_grup alpha"))
        .await;

    assert_eq!(
        client.sent_media.lock().unwrap().clone(),
        vec![("g1".to_string(), 2048)]
    );
    assert!(client.last_text_to("alice").unwrap().contains("Alpha"));
}

#[tokio::test]
async fn media_to_unknown_group_shows_menu() {
    let client = two_group_client();
    client.set_downloadable("image/png", 2048);
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session
        .dispatch(media_msg("alice", ".kirim_ke_grup nosuch"))
        .await;

    assert!(client.sent_media.lock().unwrap().is_empty());
    let reply = client.last_text_to("alice").unwrap();
    assert!(reply.contains("1. Alpha"));
    assert!(reply.contains("Usage:"));
}

#[tokio::test]
async fn invitation_link_triggers_auto_join() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session
        .dispatch(private_msg(
            "alice",
            "join us! https://chat.whatsapp.com/AbC123xyz see you there",
        ))
        .await;

    assert_eq!(
        client.invites.lock().unwrap().clone(),
        vec!["AbC123xyz".to_string()]
    );
    assert!(client.last_text_to("alice").unwrap().contains("Joined"));
}

#[tokio::test]
async fn ping_reports_identity_and_uptime() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);

    session.dispatch(private_msg("alice", ".ping")).await;
    let reply = client.last_text_to("alice").unwrap();
    assert!(reply.contains("Pong!"));
    assert!(reply.contains("TestBot"));
}

#[tokio::test]
async fn env_info_only_in_unattended_mode() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);
    session.dispatch(private_msg("alice", ".railway")).await;
    assert!(client.sent_texts.lock().unwrap().is_empty());

    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Unattended);
    session.dispatch(private_msg("alice", ".railway")).await;
    assert!(client
        .last_text_to("alice")
        .unwrap()
        .contains("Deployment Info"));
}

#[tokio::test]
async fn help_lists_env_command_only_when_unattended() {
    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Interactive);
    session.dispatch(private_msg("alice", ".help")).await;
    let reply = client.last_text_to("alice").unwrap();
    assert!(reply.contains(".kirim_pesan"));
    assert!(!reply.contains(".railway"));

    let client = two_group_client();
    let mut session = session_with(Arc::clone(&client), DeployMode::Unattended);
    session.dispatch(private_msg("alice", ".help")).await;
    assert!(client.last_text_to("alice").unwrap().contains(".railway"));
}
