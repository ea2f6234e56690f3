use crate::error::{Result, StoreError};
use crate::models::{Chat, Event, User};
use crate::updates::{ChatUpdate, EventUpdate, UserUpdate};
use crate::DocumentStore;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process document store
///
/// Backs tests and local development. Collections are ordered by id so listing
/// and sampling are deterministic. Each collection sits behind its own lock; an
/// update holds the write lock for the duration of its operations.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    users: Arc<RwLock<BTreeMap<Uuid, User>>>,
    events: Arc<RwLock<BTreeMap<Uuid, Event>>>,
    chats: Arc<RwLock<BTreeMap<Uuid, Chat>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn list_user_ids(&self) -> Result<Vec<Uuid>> {
        Ok(self.users.read().await.keys().copied().collect())
    }

    async fn sample_user_ids(&self, exclude: &BTreeSet<Uuid>, limit: usize) -> Result<Vec<Uuid>> {
        Ok(self
            .users
            .read()
            .await
            .keys()
            .filter(|id| !exclude.contains(id))
            .take(limit)
            .copied()
            .collect())
    }

    async fn insert_user(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.id)));
        }
        users.insert(user.id, user);
        Ok(())
    }

    async fn update_user(&self, id: Uuid, ops: &[UserUpdate]) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            for op in ops {
                op.apply(user);
            }
            user.clone()
        }))
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>> {
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn find_events(&self, ids: &[Uuid]) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        Ok(ids.iter().filter_map(|id| events.get(id).cloned()).collect())
    }

    async fn find_open_events(
        &self,
        now: DateTime<Utc>,
        exclude: &BTreeSet<Uuid>,
    ) -> Result<Vec<Event>> {
        Ok(self
            .events
            .read()
            .await
            .values()
            .filter(|e| e.end_date >= now && !exclude.contains(&e.id))
            .cloned()
            .collect())
    }

    async fn insert_event(&self, event: Event) -> Result<()> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.id) {
            return Err(StoreError::Duplicate(format!("event {}", event.id)));
        }
        events.insert(event.id, event);
        Ok(())
    }

    async fn update_event(&self, id: Uuid, ops: &[EventUpdate]) -> Result<Option<Event>> {
        let mut events = self.events.write().await;
        Ok(events.get_mut(&id).map(|event| {
            for op in ops {
                op.apply(event);
            }
            event.clone()
        }))
    }

    async fn find_chat(&self, id: Uuid) -> Result<Option<Chat>> {
        Ok(self.chats.read().await.get(&id).cloned())
    }

    async fn find_chat_by_event(&self, event_id: Uuid) -> Result<Option<Chat>> {
        Ok(self
            .chats
            .read()
            .await
            .values()
            .find(|c| c.event == event_id)
            .cloned())
    }

    async fn insert_chat(&self, chat: Chat) -> Result<()> {
        let mut chats = self.chats.write().await;
        if chats.contains_key(&chat.id) {
            return Err(StoreError::Duplicate(format!("chat {}", chat.id)));
        }
        chats.insert(chat.id, chat);
        Ok(())
    }

    async fn update_chat(&self, id: Uuid, ops: &[ChatUpdate]) -> Result<Option<Chat>> {
        let mut chats = self.chats.write().await;
        Ok(chats.get_mut(&id).map(|chat| {
            for op in ops {
                op.apply(chat);
            }
            chat.clone()
        }))
    }

    async fn remove_push_token(&self, token: &str) -> Result<u64> {
        let mut users = self.users.write().await;
        let mut changed = 0;
        for user in users.values_mut() {
            if user.tokens.remove(token) {
                changed += 1;
            }
        }
        Ok(changed)
    }
}
