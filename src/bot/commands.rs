//! Chat command surface and dispatch.
//!
//! One inbound message is matched against the handlers below in priority
//! order; the first match wins and there is no fallthrough. Command words
//! are the bot's wire surface and are matched case-insensitively. Every
//! handler catches its own failures and answers the originating chat with
//! a human-readable error instead of propagating; a backend hiccup in one
//! handler must never take the session down.

use log::{error, info, warn};

use crate::backend::{InboundMessage, MessageRef, BROADCAST_TARGET};
use crate::logutil::escape_log;
use crate::procinfo;

use super::conversation::Outcome;
use super::errors::BotError;
use super::session::BotSession;

/// Marker that identifies a group invitation link in a message body.
const INVITE_LINK_MARKER: &str = "chat.whatsapp.com";

const CMD_MEDIA_TO_GROUP: &str = ".kirim_ke_grup";
const CMD_ACK: &str = ".absen";
const CMD_COMPOSE: &str = ".kirim_pesan";
const CMD_STATUS: &str = ".cek_status";
const CMD_BROADCAST_MEDIA: &str = ".bikin_sw";
const CMD_FORWARD_QUOTED: &str = ".forward_status";
const CMD_HELP: &str = ".help";
const CMD_PING: &str = ".ping";
const CMD_ENV_INFO: &str = ".railway";

pub(crate) async fn dispatch(session: &mut BotSession, msg: &InboundMessage) {
    let lower = msg.body.to_lowercase();

    // 1. Media to a named group (prefix command; carries the target name
    //    as a trailing argument).
    if lower.starts_with(CMD_MEDIA_TO_GROUP) && msg.is_private && msg.has_media {
        handle_media_to_group(session, msg).await;
        return;
    }

    // 2. Group invitation auto-join.
    if msg.body.contains(INVITE_LINK_MARKER) && msg.is_private {
        handle_invitation(session, msg).await;
        return;
    }

    // 3. Stateless exact-match commands: pure read + reply.
    if lower == CMD_ACK {
        reply(session, msg, "ngok").await;
        info!("bot {}: replied to {} with ack", session.name, CMD_ACK);
        return;
    }
    if lower == CMD_HELP && msg.is_private {
        let text = help_text(session);
        reply(session, msg, &text).await;
        return;
    }
    if lower == CMD_STATUS && msg.is_private {
        handle_status(session, msg).await;
        return;
    }
    if lower == CMD_PING && msg.is_private {
        let text = format!(
            "Pong!\n\nBot: {}\nEnvironment: {}\nUptime: {}s\nMemory: {}",
            session.name,
            session.settings.mode.label(),
            procinfo::uptime_secs(),
            procinfo::rss_display()
        );
        reply(session, msg, &text).await;
        return;
    }
    if lower == CMD_ENV_INFO && msg.is_private && session.settings.mode.is_unattended() {
        let text = env_info_text();
        reply(session, msg, &text).await;
        return;
    }

    // 4. Publish attached media to the broadcast feed.
    if lower == CMD_BROADCAST_MEDIA && msg.is_private && msg.has_media {
        handle_broadcast_media(session, msg).await;
        return;
    }

    // 5. Forward a quoted message to the broadcast feed.
    if lower == CMD_FORWARD_QUOTED && msg.is_private {
        handle_forward_quoted(session, msg).await;
        return;
    }

    // 6. Interactive compose-to-group dialog.
    if lower == CMD_COMPOSE && msg.is_private {
        handle_compose(session, msg).await;
        return;
    }

    // 8. Continuation of an open dialog with this contact.
    if session.conversations.has_pending(&msg.sender_id) {
        handle_pending(session, msg).await;
        return;
    }

    // 9. Not for us.
}

/// Reply in the chat the message arrived in. Send failures are logged;
/// there is nobody further up to report them to.
async fn reply(session: &BotSession, msg: &InboundMessage, text: &str) {
    if let Err(e) = session.client.send_text(&msg.chat_id, text).await {
        error!(
            "bot {}: failed to reply to {}: {}",
            session.name,
            escape_log(&msg.chat_id),
            e
        );
    }
}

fn help_text(session: &BotSession) -> String {
    let mut text = String::from("*BOT COMMANDS*\n\n");
    text.push_str(".absen - Quick ack (replies \"ngok\")\n");
    text.push_str(".kirim_pesan - Compose a message to a group\n");
    text.push_str(".kirim_ke_grup <name> - Send attached media to a group\n");
    text.push_str(".bikin_sw - Publish attached media to the broadcast feed\n");
    text.push_str(".forward_status - Forward a quoted message to the broadcast feed\n");
    text.push_str(".cek_status - Bot status info\n");
    text.push_str(".ping - Test bot response\n");
    if session.settings.mode.is_unattended() {
        text.push_str(".railway - Deployment environment info\n");
    }
    text.push_str(&format!(
        "\nEnvironment: {}\nMedia formats: JPG, PNG, MP4 (max 15MB)",
        session.settings.mode.label()
    ));
    text
}

fn env_info_text() -> String {
    let flag = |name: &str| {
        if std::env::var(name).is_ok() {
            "set"
        } else {
            "unset"
        }
    };
    format!(
        "*Deployment Info*\n\nEnvironment variables:\n\
         - RAILWAY_PROJECT_ID: {}\n- RAILWAY_ENVIRONMENT: {}\n- RAILWAY_STATIC_URL: {}\n\n\
         Performance:\n- Memory: {}\n- Uptime: {}s\n- Version: {}\n\n\
         Auto-restart: active\nSession state: persisted on disk",
        flag("RAILWAY_PROJECT_ID"),
        std::env::var("RAILWAY_ENVIRONMENT").unwrap_or_else(|_| "undefined".to_string()),
        flag("RAILWAY_STATIC_URL"),
        procinfo::rss_display(),
        procinfo::uptime_secs(),
        env!("CARGO_PKG_VERSION")
    )
}

async fn handle_status(session: &mut BotSession, msg: &InboundMessage) {
    match session.client.fetch_chats().await {
        Ok(chats) => {
            let has_broadcast = chats.iter().any(|c| c.id == BROADCAST_TARGET);
            let text = format!(
                "*Bot Status*\n\nBot: {}\nState: {}\nEnvironment: {}\nUptime: {}s\nMemory: {}\nBroadcast feed: {}",
                session.name,
                session.status.ready_state().label(),
                session.settings.mode.label(),
                procinfo::uptime_secs(),
                procinfo::rss_display(),
                if has_broadcast { "available" } else { "unavailable" }
            );
            reply(session, msg, &text).await;
        }
        Err(e) => {
            warn!("bot {}: status check failed: {}", session.name, e);
            reply(session, msg, "Failed to check bot status.").await;
        }
    }
}

async fn handle_invitation(session: &mut BotSession, msg: &InboundMessage) {
    let marker = format!("{}/", INVITE_LINK_MARKER);
    let code = msg
        .body
        .split_once(&marker)
        .map(|(_, rest)| rest.split_whitespace().next().unwrap_or(""))
        .unwrap_or("");
    if code.is_empty() {
        return;
    }
    match session.client.accept_invite(code).await {
        Ok(()) => {
            info!("bot {}: accepted group invite", session.name);
            reply(session, msg, "Joined the group! Waiting for admin approval...").await;
        }
        Err(e) => {
            warn!("bot {}: group join failed: {}", session.name, e);
            reply(session, msg, "Failed to join group. Invite link invalid or expired.").await;
        }
    }
}

async fn handle_media_to_group(session: &mut BotSession, msg: &InboundMessage) {
    if let Err(e) = session.groups.refresh(session.client.as_ref()).await {
        warn!("bot {}: group refresh failed: {}", session.name, e);
    }
    if session.groups.is_empty() {
        reply(session, msg, "The bot has not joined any group yet.").await;
        return;
    }

    let target_name = msg
        .body
        .split_whitespace()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let target_id = if target_name.is_empty() {
        None
    } else {
        session
            .groups
            .find_by_name_substring(&target_name)
            .map(|s| s.to_string())
    };

    let Some(group_id) = target_id else {
        let menu = session.groups.render_menu(
            "*Pick a group for the media:*",
            "Usage: .kirim_ke_grup <group name>",
        );
        reply(session, msg, &menu).await;
        return;
    };

    let group_name = session
        .groups
        .name_of(&group_id)
        .unwrap_or("?")
        .to_string();
    let sent = async {
        let media = session.client.download_media(&msg.message_ref).await?;
        session.client.send_media(&group_id, media).await?;
        Ok::<(), BotError>(())
    }
    .await;

    match sent {
        Ok(()) => {
            info!("bot {}: media sent to group {}", session.name, escape_log(&group_name));
            reply(session, msg, &format!("Media sent to *{}*!", group_name)).await;
        }
        Err(e) => {
            error!("bot {}: send media to group failed: {}", session.name, e);
            reply(session, msg, "Failed to send media to the group.").await;
        }
    }
}

async fn handle_broadcast_media(session: &mut BotSession, msg: &InboundMessage) {
    if !session.status.is_ready() {
        reply(session, msg, "Bot is not ready yet, try again shortly...").await;
        return;
    }

    reply(session, msg, "Processing media for the broadcast feed...").await;

    // Preferred path: server-side forward, no payload transfer.
    match session
        .client
        .forward_message(&msg.message_ref, BROADCAST_TARGET)
        .await
    {
        Ok(()) => {
            info!("bot {}: media forwarded to broadcast feed", session.name);
            reply(
                session,
                msg,
                "*Media published to the broadcast feed!*\n\nCheck on your phone; it can take a few minutes to appear.",
            )
            .await;
        }
        Err(forward_err) => {
            warn!(
                "bot {}: broadcast forward failed ({}), trying download-and-resend",
                session.name, forward_err
            );
            if let Err(e) = broadcast_fallback(session, &msg.message_ref).await {
                match e {
                    BotError::MediaTooLarge { size, limit } => {
                        let text = format!(
                            "Media too large ({:.2}MB). Max {}MB.",
                            size as f64 / (1024.0 * 1024.0),
                            limit / (1024 * 1024)
                        );
                        reply(session, msg, &text).await;
                    }
                    other => {
                        error!("bot {}: broadcast fallback failed: {}", session.name, other);
                        reply(session, msg, "Failed to publish media. Try again or contact the operator.")
                            .await;
                    }
                }
            } else {
                info!("bot {}: media sent to broadcast feed (fallback)", session.name);
                reply(
                    session,
                    msg,
                    "*Media published to the broadcast feed!* (fallback path)\n\nCheck on your phone.",
                )
                .await;
            }
        }
    }
}

/// Download-then-resend path for broadcast publishing. The size cap is
/// enforced before any send attempt; oversize media never reaches the
/// backend.
async fn broadcast_fallback(session: &BotSession, msg_ref: &MessageRef) -> Result<(), BotError> {
    let media = session.client.download_media(msg_ref).await?;
    let limit = session.settings.max_media_bytes;
    if media.size() > limit {
        return Err(BotError::MediaTooLarge {
            size: media.size(),
            limit,
        });
    }
    session.client.send_media(BROADCAST_TARGET, media).await?;
    Ok(())
}

async fn handle_forward_quoted(session: &mut BotSession, msg: &InboundMessage) {
    let Some(quoted) = &msg.quoted else {
        reply(
            session,
            msg,
            "Reply-quote the message you want to forward, then type .forward_status",
        )
        .await;
        return;
    };
    match session.client.forward_message(quoted, BROADCAST_TARGET).await {
        Ok(()) => {
            info!("bot {}: quoted message forwarded to broadcast feed", session.name);
            reply(
                session,
                msg,
                "Message forwarded to the broadcast feed!\n\nCheck on your phone.",
            )
            .await;
        }
        Err(e) => {
            warn!("bot {}: quoted forward failed: {}", session.name, e);
            reply(session, msg, "Failed to forward to the broadcast feed.").await;
        }
    }
}

async fn handle_compose(session: &mut BotSession, msg: &InboundMessage) {
    // Refresh fails open: a stale snapshot is still usable for the menu.
    if let Err(e) = session.groups.refresh(session.client.as_ref()).await {
        warn!("bot {}: group refresh failed: {}", session.name, e);
    }
    if session.groups.is_empty() {
        reply(session, msg, "The bot has not joined any group yet.").await;
        return;
    }

    match session
        .conversations
        .begin(&msg.sender_id, session.groups.snapshot())
    {
        Ok(()) => {
            let menu = session
                .groups
                .render_menu("*Pick a group for your message:*", "Type the group number:");
            reply(session, msg, &menu).await;
        }
        Err(BotError::AlreadyInProgress) => {
            let text = format!(
                "You already have a dialog in progress. Type \"{}\" to cancel it first.",
                session.settings.cancel_keyword
            );
            reply(session, msg, &text).await;
        }
        Err(e) => {
            error!("bot {}: could not start dialog: {}", session.name, e);
            reply(session, msg, "Failed to start the dialog.").await;
        }
    }
}

async fn handle_pending(session: &mut BotSession, msg: &InboundMessage) {
    let outcome = match session.conversations.advance(&msg.sender_id, &msg.body) {
        Ok(outcome) => outcome,
        Err(e) => {
            // Only reachable if the dialog vanished between the has_pending
            // check and here, which the single-task model rules out.
            error!("bot {}: dialog advance failed: {}", session.name, e);
            return;
        }
    };

    match outcome {
        Outcome::Cancelled => {
            reply(session, msg, "Cancelled.").await;
        }
        Outcome::InvalidSelection => {
            let text = format!(
                "Invalid choice. Type a group number or \"{}\".",
                session.settings.cancel_keyword
            );
            reply(session, msg, &text).await;
        }
        Outcome::AwaitingMessage { group_name } => {
            let text = format!(
                "Group: *{}*\n\nType your message or \"{}\":",
                group_name, session.settings.cancel_keyword
            );
            reply(session, msg, &text).await;
        }
        Outcome::ReadyToSend {
            group_id,
            group_name,
            body,
        } => match session.client.send_text(&group_id, &body).await {
            Ok(()) => {
                info!("bot {}: message sent to group {}", session.name, escape_log(&group_name));
                reply(session, msg, &format!("Message sent to *{}*!", group_name)).await;
            }
            Err(e) => {
                error!("bot {}: send to group failed: {}", session.name, e);
                reply(session, msg, "Failed to send the message.").await;
            }
        },
    }
}
