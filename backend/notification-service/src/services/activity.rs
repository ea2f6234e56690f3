/// Social activity flows
///
/// Each operation resolves every document it touches before writing any of
/// them, applies its document changes, then fans out:
/// push notifications through the dispatcher and realtime signals through
/// the hub. Fan-out is best effort and never fails the operation.
use std::sync::Arc;

use chrono::Utc;
use document_store::{
    ChatMember, ChatMessage, ChatUpdate, DocumentStore, Event, EventUpdate, InboxEntry, InboxKind,
    StoryImage, User, UserUpdate,
};
use push_gateway::is_expo_push_token;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::dispatcher::NotificationDispatcher;
use crate::error::{AppError, Result};
use crate::realtime::messages::events;
use crate::realtime::RealtimeHub;

/// Response to an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rsvp {
    Accepted,
    Viewed,
    Rejected,
}

#[derive(Clone)]
pub struct SocialActivityService {
    store: Arc<dyn DocumentStore>,
    dispatcher: NotificationDispatcher,
    hub: RealtimeHub,
}

impl SocialActivityService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        dispatcher: NotificationDispatcher,
        hub: RealtimeHub,
    ) -> Self {
        Self {
            store,
            dispatcher,
            hub,
        }
    }

    /// Send (`want = true`) or revoke a friend request
    pub async fn send_friend_request(
        &self,
        sender: Uuid,
        sender_name: &str,
        receiver: Uuid,
        want: bool,
    ) -> Result<()> {
        if sender == receiver {
            return Err(AppError::BadRequest(
                "cannot send a friend request to yourself".to_string(),
            ));
        }
        let receiver_doc = self.require_user(receiver).await?;

        if !want {
            self.update_user(receiver, &[UserUpdate::PullFriendRequestsFrom(sender)])
                .await?;
            tracing::debug!(sender = %sender, receiver = %receiver, "Friend request revoked");
            return Ok(());
        }

        if receiver_doc.is_blocked_with(&sender) {
            return Err(AppError::Forbidden("users are blocked".to_string()));
        }

        // Replace any earlier request from the same sender
        self.update_user(
            receiver,
            &[
                UserUpdate::PullFriendRequestsFrom(sender),
                UserUpdate::PushNotification(InboxEntry::new(InboxKind::FriendRequest { sender })),
            ],
        )
        .await?;

        self.push(
            &receiver_doc,
            "New friend request",
            format!("{} sent you a friend request", sender_name),
        );
        self.hub
            .send_user_event(receiver, events::NOTIFICATIONS_UPDATED)
            .await;

        tracing::info!(sender = %sender, receiver = %receiver, "Friend request sent");
        Ok(())
    }

    /// Accept or decline a pending friend request
    ///
    /// Accepting requires a `FriendRequest` from `sender` in the receiver's
    /// inbox.
    pub async fn respond_friend_request(
        &self,
        sender: Uuid,
        receiver: Uuid,
        receiver_name: &str,
        accepted: bool,
    ) -> Result<()> {
        let receiver_doc = self.require_user(receiver).await?;

        let mut receiver_ops = vec![UserUpdate::PullFriendRequestsFrom(sender)];
        if !accepted {
            self.update_user(receiver, &receiver_ops).await?;
            return Ok(());
        }

        if receiver_doc.is_blocked_with(&sender) {
            return Err(AppError::Forbidden("users are blocked".to_string()));
        }
        let pending = receiver_doc
            .notifications
            .iter()
            .any(|entry| entry.kind == InboxKind::FriendRequest { sender });
        if !pending {
            return Err(AppError::BadRequest(format!(
                "no pending friend request from {}",
                sender
            )));
        }
        self.require_user(sender).await?;

        let sender_doc = self
            .update_user(
                sender,
                &[
                    UserUpdate::AddFriend(receiver),
                    UserUpdate::PullFriendRecommendation(receiver),
                    UserUpdate::PushNotification(InboxEntry::new(InboxKind::FriendAccepted {
                        friend: receiver,
                    })),
                ],
            )
            .await?;
        receiver_ops.push(UserUpdate::AddFriend(sender));
        receiver_ops.push(UserUpdate::PullFriendRecommendation(sender));
        self.update_user(receiver, &receiver_ops).await?;

        self.push(
            &sender_doc,
            "Friend Request Accepted",
            format!("{} accepted your friend request", receiver_name),
        );
        self.hub
            .send_user_event(sender, events::NOTIFICATIONS_UPDATED)
            .await;
        self.hub.send_user_event(sender, events::FRIEND_CHANGE).await;
        self.hub
            .send_user_event(receiver, events::FRIEND_CHANGE)
            .await;

        tracing::info!(sender = %sender, receiver = %receiver, "Friend request accepted");
        Ok(())
    }

    pub async fn unfriend(&self, user: Uuid, friend: Uuid) -> Result<()> {
        self.require_user(user).await?;
        self.require_user(friend).await?;

        self.update_user(user, &[UserUpdate::RemoveFriend(friend)])
            .await?;
        self.update_user(friend, &[UserUpdate::RemoveFriend(user)])
            .await?;

        self.hub.send_user_event(user, events::FRIEND_CHANGE).await;
        self.hub.send_user_event(friend, events::FRIEND_CHANGE).await;
        Ok(())
    }

    /// Invite a friend to an event; the event lands in their pending list
    pub async fn invite_friend(
        &self,
        sender: Uuid,
        sender_name: &str,
        friend: Uuid,
        event: Uuid,
        event_name: &str,
    ) -> Result<()> {
        let friend_doc = self.require_user(friend).await?;
        if friend_doc.is_blocked_with(&sender) {
            return Err(AppError::Forbidden("users are blocked".to_string()));
        }

        let friend_doc = self
            .update_user(
                friend,
                &[
                    UserUpdate::PushPendingEvents(vec![event]),
                    UserUpdate::PushNotification(InboxEntry::new(InboxKind::EventInvite {
                        sender,
                        sender_name: sender_name.to_string(),
                        event,
                        event_name: event_name.to_string(),
                    })),
                ],
            )
            .await?;

        self.push(
            &friend_doc,
            "New Event Invitation",
            format!("{} just invited you to attend {}!", sender_name, event_name),
        );
        self.hub
            .send_user_event(friend, events::NOTIFICATIONS_UPDATED)
            .await;
        Ok(())
    }

    pub async fn delete_notification(&self, user: Uuid, notification: Uuid) -> Result<()> {
        self.update_user(user, &[UserUpdate::PullNotification(notification)])
            .await?;
        Ok(())
    }

    /// Record a user's response to an event
    pub async fn rsvp(&self, user: Uuid, event: Uuid, action: Rsvp) -> Result<()> {
        let event_doc = self.require_event(event).await?;
        let user_doc = self.require_user(user).await?;

        match action {
            Rsvp::Viewed => {
                self.update_user(user, &[UserUpdate::AddViewedEvent(event)])
                    .await?;
                self.store
                    .update_event(event, &[EventUpdate::AddViewer(user)])
                    .await?;
                return Ok(());
            }
            Rsvp::Accepted => {
                self.store
                    .update_event(event, &[EventUpdate::AddAttendee(user)])
                    .await?;

                let mut user_ops = vec![
                    UserUpdate::PushAcceptedEvent(event),
                    UserUpdate::PullPendingEvent(event),
                ];
                match self.store.find_chat_by_event(event).await? {
                    Some(chat) => {
                        let member = ChatMember::from_user(&user_doc);
                        self.store
                            .update_chat(chat.id, &[ChatUpdate::AddMember(member)])
                            .await?;
                        user_ops.push(UserUpdate::AddChat(chat.id));
                    }
                    None => {
                        tracing::warn!(event_id = %event, "Accepted event has no chat");
                    }
                }
                self.update_user(user, &user_ops).await?;
                self.hub.send_user_event(user, events::EVENTS_UPDATED).await;
            }
            Rsvp::Rejected => {
                self.update_user(
                    user,
                    &[
                        UserUpdate::PushRejectedEvent(event),
                        UserUpdate::PullPendingEvent(event),
                    ],
                )
                .await?;
                self.store
                    .update_event(event, &[EventUpdate::AddRejecter(user)])
                    .await?;
            }
        }

        self.hub
            .send_user_event(event_doc.creator, events::RSVP_OCCURRED)
            .await;

        tracing::debug!(user_id = %user, event_id = %event, action = ?action, "RSVP recorded");
        Ok(())
    }

    /// Move an accepted event back to pending and leave its chat
    ///
    /// # Returns
    ///
    /// The id of the chat the user left, if the event has one
    pub async fn undo_accept(&self, user: Uuid, event: Uuid) -> Result<Option<Uuid>> {
        self.require_event(event).await?;
        self.require_user(user).await?;

        let mut user_ops = vec![
            UserUpdate::PullAcceptedEvent(event),
            UserUpdate::PushPendingEvents(vec![event]),
        ];

        let chat = self.store.find_chat_by_event(event).await?;
        if let Some(chat) = &chat {
            self.store
                .update_chat(chat.id, &[ChatUpdate::RemoveMember(user)])
                .await?;
            user_ops.push(UserUpdate::RemoveChat(chat.id));
        }

        self.update_user(user, &user_ops).await?;
        self.store
            .update_event(event, &[EventUpdate::RemoveAttendee(user)])
            .await?;

        self.hub.send_user_event(user, events::EVENTS_UPDATED).await;
        Ok(chat.map(|c| c.id))
    }

    /// Move a rejected event back to pending
    pub async fn undo_reject(&self, user: Uuid, event: Uuid) -> Result<()> {
        self.require_event(event).await?;
        self.update_user(
            user,
            &[
                UserUpdate::PullRejectedEvent(event),
                UserUpdate::PushPendingEvents(vec![event]),
            ],
        )
        .await?;
        self.store
            .update_event(event, &[EventUpdate::RemoveRejecter(user)])
            .await?;
        Ok(())
    }

    /// Append a chat message and notify every other member
    pub async fn send_chat_message(
        &self,
        chat: Uuid,
        sender: Uuid,
        sender_name: &str,
        body: &str,
    ) -> Result<()> {
        if body.trim().is_empty() {
            return Err(AppError::BadRequest("message body is empty".to_string()));
        }

        let message = ChatMessage {
            sender_id: sender,
            sender_name: sender_name.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
        };
        let chat_doc = self
            .store
            .update_chat(chat, &[ChatUpdate::PushMessage(message)])
            .await?
            .ok_or_else(|| AppError::NotFound(format!("chat {}", chat)))?;

        let tokens: Vec<String> = chat_doc
            .members
            .iter()
            .filter(|member| member.user_id != sender)
            .flat_map(|member| member.tokens.iter().cloned())
            .collect();
        self.push_tokens(
            tokens,
            &chat_doc.title,
            format!("{}: {}", sender_name, body),
        );
        Ok(())
    }

    pub async fn mark_chat_read(&self, chat: Uuid, user: Uuid) -> Result<()> {
        self.store
            .update_chat(chat, &[ChatUpdate::MarkRead(user)])
            .await?
            .ok_or_else(|| AppError::NotFound(format!("chat {}", chat)))?;
        Ok(())
    }

    /// Post a story image and tell every attendee
    ///
    /// Attendees get `existingStoryUpdate` with the event id when the event
    /// already had story images, `newStoryUpdate` otherwise.
    pub async fn upload_story(
        &self,
        event: Uuid,
        user: Uuid,
        image_url: &str,
    ) -> Result<StoryImage> {
        let image = StoryImage {
            id: Uuid::new_v4(),
            image_url: image_url.to_string(),
            poster: user,
            posted_at: Utc::now(),
            viewers: Default::default(),
        };
        let event_doc = self
            .store
            .update_event(event, &[EventUpdate::PushStoryImage(image.clone())])
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {}", event)))?;

        let existing = event_doc.story_images.len() > 1;
        for attendee in &event_doc.attendees {
            if existing {
                self.hub
                    .send_data_event(*attendee, json!(event), events::EXISTING_STORY_UPDATE)
                    .await;
            } else {
                self.hub
                    .send_user_event(*attendee, events::NEW_STORY_UPDATE)
                    .await;
            }
        }

        Ok(image)
    }

    pub async fn view_story(&self, event: Uuid, image: Uuid, user: Uuid) -> Result<()> {
        let event_doc = self
            .store
            .update_event(event, &[EventUpdate::AddStoryViewer { image, viewer: user }])
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {}", event)))?;

        if !event_doc.story_images.iter().any(|s| s.id == image) {
            return Err(AppError::NotFound(format!("story image {}", image)));
        }
        Ok(())
    }

    /// Block (`blocking = true`) or unblock another user
    pub async fn block_user(&self, user: Uuid, other: Uuid, blocking: bool) -> Result<()> {
        if user == other {
            return Err(AppError::BadRequest("cannot block yourself".to_string()));
        }

        let (user_ops, other_ops) = if blocking {
            (
                vec![
                    UserUpdate::AddBlockedUser(other),
                    UserUpdate::RemoveFriend(other),
                    UserUpdate::PullFriendRecommendation(other),
                    UserUpdate::PullFriendRequestsFrom(other),
                ],
                vec![
                    UserUpdate::AddBlockedBy(user),
                    UserUpdate::RemoveFriend(user),
                    UserUpdate::PullFriendRecommendation(user),
                    UserUpdate::PullFriendRequestsFrom(user),
                ],
            )
        } else {
            (
                vec![UserUpdate::RemoveBlockedUser(other)],
                vec![UserUpdate::RemoveBlockedBy(user)],
            )
        };

        self.require_user(user).await?;
        self.require_user(other).await?;
        self.update_user(user, &user_ops).await?;
        self.update_user(other, &other_ops).await?;

        tracing::info!(user_id = %user, other = %other, blocking, "Block state changed");
        Ok(())
    }

    pub async fn register_push_token(&self, user: Uuid, token: &str) -> Result<()> {
        if !is_expo_push_token(token) {
            return Err(AppError::BadRequest(format!("invalid push token: {}", token)));
        }
        self.update_user(user, &[UserUpdate::AddToken(token.to_string())])
            .await?;
        Ok(())
    }

    async fn require_user(&self, id: Uuid) -> Result<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }

    async fn require_event(&self, id: Uuid) -> Result<Event> {
        self.store
            .find_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {}", id)))
    }

    async fn update_user(&self, id: Uuid, ops: &[UserUpdate]) -> Result<User> {
        self.store
            .update_user(id, ops)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }

    fn push(&self, recipient: &User, title: &str, body: String) {
        self.push_tokens(recipient.tokens.iter().cloned().collect(), title, body);
    }

    fn push_tokens(&self, tokens: Vec<String>, title: &str, body: String) {
        if tokens.is_empty() {
            return;
        }
        self.dispatcher.dispatch(tokens, title.to_string(), body);
    }
}
