//! Templated notifications: new match, new message and profile view.

use futures::future::join;
use rendezvous_common::models::NotificationType;
use rendezvous_common::{invalid_argument, CallContext, RendezvousError};
use std::sync::Arc;

use crate::dispatcher::{
    DeliveryReport, Dispatched, NotificationDispatcher, NotificationOptions, SendNotification,
};

pub const MATCH_TITLE: &str = "🎉 New Match!";
pub const MATCH_BODY: &str = "You have a new match! Check out who it is.";
pub const MESSAGE_TITLE: &str = "💬 New Message";
pub const PROFILE_VIEW_TITLE: &str = "👤 Profile View";
pub const PROFILE_VIEW_BODY: &str = "Someone viewed your profile!";

/// Message previews longer than this many characters are cut.
pub const MESSAGE_PREVIEW_CHARS: usize = 50;

/// The `new_match` notification for `recipient`, pointing at `other`.
pub fn new_match(recipient: &str, other: &str) -> SendNotification {
    SendNotification::new(recipient, MATCH_TITLE, MATCH_BODY)
        .with_options(NotificationOptions::new(NotificationType::NewMatch, other))
}

/// The `new_message` notification for `receiver`, pointing at the match.
pub fn new_message(receiver: &str, match_id: &str, text: &str) -> SendNotification {
    SendNotification::new(receiver, MESSAGE_TITLE, message_preview(text))
        .with_options(NotificationOptions::new(NotificationType::NewMessage, match_id))
}

/// The `profile_view` notification for `profile_user`, pointing at the viewer.
pub fn profile_view(profile_user: &str, viewer: &str) -> SendNotification {
    SendNotification::new(profile_user, PROFILE_VIEW_TITLE, PROFILE_VIEW_BODY)
        .with_options(NotificationOptions::new(NotificationType::ProfileView, viewer))
}

/// First [`MESSAGE_PREVIEW_CHARS`] characters of `text`, with `...` when cut.
pub fn message_preview(text: &str) -> String {
    match text.char_indices().nth(MESSAGE_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn require(fields: &[&str], message: &str) -> Result<(), RendezvousError> {
    if fields.iter().any(|field| field.trim().is_empty()) {
        return Err(invalid_argument(message));
    }
    Ok(())
}

/// Sends both participants their match announcement, concurrently.
///
/// Failures are reported per participant, never raised.
pub async fn announce_match(
    dispatcher: &NotificationDispatcher,
    ctx: &CallContext,
    user_a: &str,
    user_b: &str,
) -> Vec<DeliveryReport> {
    let (first, second) = join(
        dispatcher.send(ctx, new_match(user_a, user_b)),
        dispatcher.send(ctx, new_match(user_b, user_a)),
    )
    .await;

    vec![
        DeliveryReport::from_result(user_a, first),
        DeliveryReport::from_result(user_b, second),
    ]
}

/// Entry points for the templated notifications.
pub struct Notices {
    dispatcher: Arc<NotificationDispatcher>,
}

impl Notices {
    pub fn new(dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub async fn send_match_notification(
        &self,
        ctx: &CallContext,
        user_id_1: &str,
        user_id_2: &str,
    ) -> Result<Vec<DeliveryReport>, RendezvousError> {
        require(
            &[user_id_1, user_id_2],
            "Missing required fields: userId1, userId2",
        )?;
        Ok(announce_match(&self.dispatcher, ctx, user_id_1, user_id_2).await)
    }

    pub async fn send_message_notification(
        &self,
        ctx: &CallContext,
        match_id: &str,
        sender_id: &str,
        receiver_id: &str,
        message_text: &str,
    ) -> Result<Dispatched, RendezvousError> {
        require(
            &[match_id, sender_id, receiver_id, message_text],
            "Missing required fields: matchId, senderId, receiverId, messageText",
        )?;
        self.dispatcher
            .send(ctx, new_message(receiver_id, match_id, message_text))
            .await
    }

    pub async fn send_profile_view_notification(
        &self,
        ctx: &CallContext,
        profile_user_id: &str,
        viewer_id: &str,
    ) -> Result<Dispatched, RendezvousError> {
        require(
            &[profile_user_id, viewer_id],
            "Missing required fields: profileUserId, viewerId",
        )?;
        self.dispatcher
            .send(ctx, profile_view(profile_user_id, viewer_id))
            .await
    }
}
