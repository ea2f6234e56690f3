use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use document_store::{
    Chat, ChatUpdate, DocumentStore, Event, EventUpdate, InMemoryStore, Result, StoreError, User,
    UserUpdate,
};
use mockall::mock;
use recommendation_service::config::SuggestionLimits;
use recommendation_service::jobs::SuggestionSweeper;
use recommendation_service::AppContext;
use uuid::Uuid;

mock! {
    pub Store {}

    #[async_trait::async_trait]
    impl DocumentStore for Store {
        async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
        async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>>;
        async fn list_user_ids(&self) -> Result<Vec<Uuid>>;
        async fn sample_user_ids(
            &self,
            exclude: &BTreeSet<Uuid>,
            limit: usize,
        ) -> Result<Vec<Uuid>>;
        async fn insert_user(&self, user: User) -> Result<()>;
        async fn update_user(&self, id: Uuid, ops: &[UserUpdate]) -> Result<Option<User>>;
        async fn find_event(&self, id: Uuid) -> Result<Option<Event>>;
        async fn find_events(&self, ids: &[Uuid]) -> Result<Vec<Event>>;
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
        async fn remove_push_token(&self, token: &str) -> Result<u64>;
    }
}

#[tokio::test]
async fn test_sweep_updates_every_user() {
    let store = Arc::new(InMemoryStore::new());
    let mut a = User::new(Uuid::new_v4(), "a");
    let mut b = User::new(Uuid::new_v4(), "b");
    let c = User::new(Uuid::new_v4(), "c");
    a.friends.insert(b.id);
    b.friends.insert(a.id);
    for u in [&a, &b, &c] {
        store.insert_user(u.clone()).await.unwrap();
    }

    let ctx = Arc::new(AppContext::new(store.clone(), SuggestionLimits::default()));
    let sweeper = SuggestionSweeper::new(ctx, 2);

    let report = sweeper.run_sweep().await.unwrap().unwrap();
    assert_eq!(report.users, 3);
    assert_eq!(report.friend_failures, 0);
    assert_eq!(report.event_failures, 0);

    // c is isolated and falls back to a sample of non-friends
    let c_after = store.find_user(c.id).await.unwrap().unwrap();
    assert_eq!(c_after.friend_recommendations.len(), 2);
    assert!(!c_after.friend_recommendations.contains(&c.id));
    assert!(!sweeper.is_running());
}

#[tokio::test]
async fn test_one_failing_user_does_not_abort_sweep() {
    let failing = Uuid::new_v4();
    let healthy = User::new(Uuid::new_v4(), "healthy");
    let healthy_id = healthy.id;

    let mut store = MockStore::new();
    store
        .expect_list_user_ids()
        .returning(move || Ok(vec![failing, healthy_id]));
    let found = healthy.clone();
    store.expect_find_user().returning(move |id| {
        if id == failing {
            Err(StoreError::Duplicate("simulated failure".to_string()))
        } else {
            Ok(Some(found.clone()))
        }
    });
    store.expect_find_users().returning(|_| Ok(Vec::new()));
    store.expect_find_events().returning(|_| Ok(Vec::new()));
    store.expect_sample_user_ids().returning(|_, _| Ok(Vec::new()));
    let updated = healthy.clone();
    store
        .expect_update_user()
        .withf(move |id, _| *id == healthy_id)
        .times(1)
        .returning(move |_, _| Ok(Some(updated.clone())));
    store
        .expect_find_open_events()
        .returning(|_, _| Ok(Vec::new()));

    let ctx = Arc::new(AppContext::new(Arc::new(store), SuggestionLimits::default()));
    let sweeper = SuggestionSweeper::new(ctx, 1);

    let report = sweeper.run_sweep().await.unwrap().unwrap();
    assert_eq!(report.users, 2);
    assert_eq!(report.friend_failures, 1);
    assert_eq!(report.event_failures, 1);
}

#[tokio::test]
async fn test_enumeration_failure_surfaces_and_releases_guard() {
    let mut store = MockStore::new();
    store
        .expect_list_user_ids()
        .returning(|| Err(StoreError::Duplicate("unavailable".to_string())));

    let ctx = Arc::new(AppContext::new(Arc::new(store), SuggestionLimits::default()));
    let sweeper = SuggestionSweeper::new(ctx, 1);

    assert!(sweeper.run_sweep().await.is_err());
    assert!(!sweeper.is_running());
}
