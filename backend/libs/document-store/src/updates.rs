//! Typed document update operations
//!
//! Each variant mirrors one `set` / `push` / `pull` / `addToSet` clause of a
//! document-store update. A slice of operations is applied in order to a single
//! document, atomically with respect to other writers of that document.
use crate::models::{Chat, ChatMember, ChatMessage, Event, InboxEntry, InboxKind, StoryImage, User};
use chrono::Utc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum UserUpdate {
    /// Replace the cached friend suggestions wholesale
    SetFriendRecommendations(Vec<Uuid>),
    PullFriendRecommendation(Uuid),
    /// Append event ids to the pending list, skipping ids already pending
    PushPendingEvents(Vec<Uuid>),
    PullPendingEvent(Uuid),
    PushAcceptedEvent(Uuid),
    PullAcceptedEvent(Uuid),
    PushRejectedEvent(Uuid),
    PullRejectedEvent(Uuid),
    AddViewedEvent(Uuid),
    AddFriend(Uuid),
    RemoveFriend(Uuid),
    AddBlockedUser(Uuid),
    RemoveBlockedUser(Uuid),
    AddBlockedBy(Uuid),
    RemoveBlockedBy(Uuid),
    AddChat(Uuid),
    RemoveChat(Uuid),
    AddToken(String),
    RemoveToken(String),
    PushNotification(InboxEntry),
    PullNotification(Uuid),
    /// Remove every pending friend request sent by this user
    PullFriendRequestsFrom(Uuid),
}

impl UserUpdate {
    pub fn apply(&self, user: &mut User) {
        match self {
            UserUpdate::SetFriendRecommendations(ids) => {
                user.friend_recommendations = ids.clone();
            }
            UserUpdate::PullFriendRecommendation(id) => {
                user.friend_recommendations.retain(|r| r != id);
            }
            UserUpdate::PushPendingEvents(ids) => {
                for id in ids {
                    if !user.pending_events.contains(id) {
                        user.pending_events.push(*id);
                    }
                }
            }
            UserUpdate::PullPendingEvent(id) => user.pending_events.retain(|e| e != id),
            UserUpdate::PushAcceptedEvent(id) => {
                if !user.accepted_events.contains(id) {
                    user.accepted_events.push(*id);
                }
            }
            UserUpdate::PullAcceptedEvent(id) => user.accepted_events.retain(|e| e != id),
            UserUpdate::PushRejectedEvent(id) => {
                if !user.rejected_events.contains(id) {
                    user.rejected_events.push(*id);
                }
            }
            UserUpdate::PullRejectedEvent(id) => user.rejected_events.retain(|e| e != id),
            UserUpdate::AddViewedEvent(id) => {
                user.viewed_events.insert(*id);
            }
            UserUpdate::AddFriend(id) => {
                user.friends.insert(*id);
            }
            UserUpdate::RemoveFriend(id) => {
                user.friends.remove(id);
            }
            UserUpdate::AddBlockedUser(id) => {
                user.blocked_users.insert(*id);
            }
            UserUpdate::RemoveBlockedUser(id) => {
                user.blocked_users.remove(id);
            }
            UserUpdate::AddBlockedBy(id) => {
                user.blocked_by.insert(*id);
            }
            UserUpdate::RemoveBlockedBy(id) => {
                user.blocked_by.remove(id);
            }
            UserUpdate::AddChat(id) => {
                user.chats.insert(*id);
            }
            UserUpdate::RemoveChat(id) => {
                user.chats.remove(id);
            }
            UserUpdate::AddToken(token) => {
                user.tokens.insert(token.clone());
            }
            UserUpdate::RemoveToken(token) => {
                user.tokens.remove(token);
            }
            UserUpdate::PushNotification(entry) => user.notifications.push(entry.clone()),
            UserUpdate::PullNotification(id) => user.notifications.retain(|n| n.id != *id),
            UserUpdate::PullFriendRequestsFrom(sender) => {
                user.notifications.retain(|n| {
                    !matches!(&n.kind, InboxKind::FriendRequest { sender: s } if s == sender)
                });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventUpdate {
    AddAttendee(Uuid),
    RemoveAttendee(Uuid),
    AddViewer(Uuid),
    AddRejecter(Uuid),
    RemoveRejecter(Uuid),
    PushStoryImage(StoryImage),
    AddStoryViewer { image: Uuid, viewer: Uuid },
}

impl EventUpdate {
    pub fn apply(&self, event: &mut Event) {
        match self {
            EventUpdate::AddAttendee(id) => {
                event.attendees.insert(*id);
            }
            EventUpdate::RemoveAttendee(id) => {
                event.attendees.remove(id);
            }
            EventUpdate::AddViewer(id) => {
                event.viewers.insert(*id);
            }
            EventUpdate::AddRejecter(id) => {
                event.rejecters.insert(*id);
            }
            EventUpdate::RemoveRejecter(id) => {
                event.rejecters.remove(id);
            }
            EventUpdate::PushStoryImage(image) => event.story_images.push(image.clone()),
            EventUpdate::AddStoryViewer { image, viewer } => {
                if let Some(story) = event.story_images.iter_mut().find(|s| s.id == *image) {
                    story.viewers.insert(*viewer);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatUpdate {
    /// Append a message and mark every member unread
    PushMessage(ChatMessage),
    /// Add a member snapshot, replacing any previous snapshot of the same user
    AddMember(ChatMember),
    RemoveMember(Uuid),
    MarkRead(Uuid),
}

impl ChatUpdate {
    pub fn apply(&self, chat: &mut Chat) {
        match self {
            ChatUpdate::PushMessage(message) => {
                chat.messages.push(message.clone());
                for member in chat.members.iter_mut() {
                    member.read = false;
                }
                chat.last_update = Some(Utc::now());
            }
            ChatUpdate::AddMember(member) => {
                chat.members.retain(|m| m.user_id != member.user_id);
                chat.members.push(member.clone());
            }
            ChatUpdate::RemoveMember(user_id) => chat.members.retain(|m| m.user_id != *user_id),
            ChatUpdate::MarkRead(user_id) => {
                if let Some(member) = chat.members.iter_mut().find(|m| m.user_id == *user_id) {
                    member.read = true;
                }
            }
        }
    }
}
