/// Document Store Shared Library
///
/// Document model and storage capability shared by the recommendation and
/// notification services.
///
/// It provides:
/// - User / Event / Chat documents
/// - Typed update operations (set, push, pull, addToSet)
/// - The `DocumentStore` trait engines and flows are written against
/// - An in-memory store (tests, local development) and a PostgreSQL JSONB store
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod updates;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use models::{
    Chat, ChatMember, ChatMessage, Event, InboxEntry, InboxKind, StoryImage, User,
};
pub use postgres::PgDocumentStore;
pub use updates::{ChatUpdate, EventUpdate, UserUpdate};

/// Capability interface over the backing document store.
///
/// Lookups by a list of ids silently omit ids that do not resolve; callers treat
/// those as malformed references. Updates are atomic per document and return the
/// updated document, or `None` when the target does not exist.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>>;

    /// All user ids known to the store
    async fn list_user_ids(&self) -> Result<Vec<Uuid>>;

    /// Up to `limit` arbitrary user ids that are not in `exclude`
    async fn sample_user_ids(&self, exclude: &BTreeSet<Uuid>, limit: usize) -> Result<Vec<Uuid>>;

    async fn insert_user(&self, user: User) -> Result<()>;

    async fn update_user(&self, id: Uuid, ops: &[UserUpdate]) -> Result<Option<User>>;

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>>;

    async fn find_events(&self, ids: &[Uuid]) -> Result<Vec<Event>>;

    /// Events ending at or after `now` whose id is not in `exclude`
    async fn find_open_events(
        &self,
        now: DateTime<Utc>,
        exclude: &BTreeSet<Uuid>,
    ) -> Result<Vec<Event>>;

    async fn insert_event(&self, event: Event) -> Result<()>;

    async fn update_event(&self, id: Uuid, ops: &[EventUpdate]) -> Result<Option<Event>>;

    async fn find_chat(&self, id: Uuid) -> Result<Option<Chat>>;

    async fn find_chat_by_event(&self, event_id: Uuid) -> Result<Option<Chat>>;

    async fn insert_chat(&self, chat: Chat) -> Result<()>;

    async fn update_chat(&self, id: Uuid, ops: &[ChatUpdate]) -> Result<Option<Chat>>;

    /// Remove a push token from every user holding it.
    /// Returns the number of users changed.
    async fn remove_push_token(&self, token: &str) -> Result<u64>;

    /// Health check (optional)
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
