use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// User document
///
/// Relationship and recommendation fields hold identifiers only; event and
/// user details are fetched by id at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub friends: BTreeSet<Uuid>,
    #[serde(default)]
    pub blocked_users: BTreeSet<Uuid>,
    #[serde(default)]
    pub blocked_by: BTreeSet<Uuid>,
    #[serde(default)]
    pub accepted_events: Vec<Uuid>,
    #[serde(default)]
    pub pending_events: Vec<Uuid>,
    #[serde(default)]
    pub rejected_events: Vec<Uuid>,
    #[serde(default)]
    pub viewed_events: BTreeSet<Uuid>,
    /// Cached ranked friend suggestions, replaced wholesale on every run
    #[serde(default)]
    pub friend_recommendations: Vec<Uuid>,
    #[serde(default)]
    pub chats: BTreeSet<Uuid>,
    /// Push delivery addresses
    #[serde(default)]
    pub tokens: BTreeSet<String>,
    #[serde(default)]
    pub notifications: Vec<InboxEntry>,
}

impl User {
    pub fn new(id: Uuid, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            friends: BTreeSet::new(),
            blocked_users: BTreeSet::new(),
            blocked_by: BTreeSet::new(),
            accepted_events: Vec::new(),
            pending_events: Vec::new(),
            rejected_events: Vec::new(),
            viewed_events: BTreeSet::new(),
            friend_recommendations: Vec::new(),
            chats: BTreeSet::new(),
            tokens: BTreeSet::new(),
            notifications: Vec::new(),
        }
    }

    /// True if either side has blocked the other
    pub fn is_blocked_with(&self, other: &Uuid) -> bool {
        self.blocked_users.contains(other) || self.blocked_by.contains(other)
    }

    /// Ids of every event this user has already responded to or been offered
    pub fn seen_event_ids(&self) -> BTreeSet<Uuid> {
        self.accepted_events
            .iter()
            .chain(self.pending_events.iter())
            .chain(self.rejected_events.iter())
            .copied()
            .collect()
    }
}

/// Inbox entry shown in the user's notification list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: InboxKind,
    pub created_at: DateTime<Utc>,
}

impl InboxEntry {
    pub fn new(kind: InboxKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboxKind {
    FriendRequest {
        sender: Uuid,
    },
    FriendAccepted {
        friend: Uuid,
    },
    EventInvite {
        sender: Uuid,
        #[serde(rename = "senderName")]
        sender_name: String,
        event: Uuid,
        #[serde(rename = "eventName")]
        event_name: String,
    },
}

/// Event document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    /// Organizer
    pub creator: Uuid,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub attendees: BTreeSet<Uuid>,
    #[serde(default)]
    pub viewers: BTreeSet<Uuid>,
    #[serde(default)]
    pub rejecters: BTreeSet<Uuid>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub story_images: Vec<StoryImage>,
}

impl Event {
    pub fn new(
        id: Uuid,
        creator: Uuid,
        title: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            creator,
            tags: BTreeSet::new(),
            attendees: BTreeSet::new(),
            viewers: BTreeSet::new(),
            rejecters: BTreeSet::new(),
            start_date,
            end_date,
            story_images: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attendees(mut self, attendees: impl IntoIterator<Item = Uuid>) -> Self {
        self.attendees = attendees.into_iter().collect();
        self
    }
}

/// Ephemeral story media posted to an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryImage {
    pub id: Uuid,
    pub image_url: String,
    pub poster: Uuid,
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub viewers: BTreeSet<Uuid>,
}

/// Chat document, one per event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    pub event: Uuid,
    pub title: String,
    #[serde(default)]
    pub members: Vec<ChatMember>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub last_update: Option<DateTime<Utc>>,
}

impl Chat {
    pub fn new(id: Uuid, event: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            event,
            title: title.into(),
            members: Vec::new(),
            messages: Vec::new(),
            last_update: None,
        }
    }
}

/// Member snapshot carried by a chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMember {
    pub user_id: Uuid,
    pub username: String,
    pub read: bool,
    #[serde(default)]
    pub tokens: BTreeSet<String>,
}

impl ChatMember {
    /// Snapshot of a user joining a chat, unread
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            read: false,
            tokens: user.tokens.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_entry_wire_format() {
        let sender = Uuid::new_v4();
        let event = Uuid::new_v4();
        let entry = InboxEntry::new(InboxKind::EventInvite {
            sender,
            sender_name: "ana".to_string(),
            event,
            event_name: "Picnic".to_string(),
        });

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "eventInvite");
        assert_eq!(json["senderName"], "ana");
        assert_eq!(json["eventName"], "Picnic");
        assert!(json.get("createdAt").is_some());

        let back: InboxEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_user_defaults_missing_collections() {
        let id = Uuid::new_v4();
        let json = serde_json::json!({ "id": id, "username": "bo" });
        let user: User = serde_json::from_value(json).unwrap();
        assert_eq!(user, User::new(id, "bo"));
    }

    #[test]
    fn test_blocked_either_direction() {
        let mut user = User::new(Uuid::new_v4(), "a");
        let blocked = Uuid::new_v4();
        let blocker = Uuid::new_v4();
        user.blocked_users.insert(blocked);
        user.blocked_by.insert(blocker);

        assert!(user.is_blocked_with(&blocked));
        assert!(user.is_blocked_with(&blocker));
        assert!(!user.is_blocked_with(&Uuid::new_v4()));
    }

    #[test]
    fn test_seen_event_ids_union() {
        let mut user = User::new(Uuid::new_v4(), "a");
        let (a, p, r) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        user.accepted_events.push(a);
        user.pending_events.push(p);
        user.rejected_events.push(r);

        let seen = user.seen_event_ids();
        assert_eq!(seen.len(), 3);
        assert!(seen.contains(&a) && seen.contains(&p) && seen.contains(&r));
    }
}
