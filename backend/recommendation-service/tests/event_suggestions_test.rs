use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use document_store::{DocumentStore, Event, InMemoryStore, User};
use recommendation_service::config::SuggestionLimits;
use recommendation_service::services::EventSuggestionEngine;
use uuid::Uuid;

fn open_event(creator: Uuid, now: DateTime<Utc>, tags: &[&str]) -> Event {
    Event::new(Uuid::new_v4(), creator, "open", now, now + Duration::days(1))
        .with_tags(tags.iter().copied())
}

fn engine(store: &Arc<InMemoryStore>) -> EventSuggestionEngine {
    EventSuggestionEngine::new(store.clone(), SuggestionLimits::default())
}

async fn insert_events(store: &InMemoryStore, events: &[&Event]) {
    for e in events {
        store.insert_event((*e).clone()).await.unwrap();
    }
}

#[tokio::test]
async fn test_excludes_seen_and_finished_events() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    let org = Uuid::new_v4();

    let accepted = open_event(org, now, &["music"]);
    let pending = open_event(org, now, &["music"]);
    let rejected = open_event(org, now, &["music"]);
    let finished = Event::new(
        Uuid::new_v4(),
        org,
        "old",
        now - Duration::days(3),
        now - Duration::days(2),
    );
    let fresh = open_event(org, now, &["music"]);

    let mut subject = User::new(Uuid::new_v4(), "u");
    subject.accepted_events = vec![accepted.id];
    subject.pending_events = vec![pending.id];
    subject.rejected_events = vec![rejected.id];
    store.insert_user(subject.clone()).await.unwrap();
    insert_events(&store, &[&accepted, &pending, &rejected, &finished, &fresh]).await;

    let suggestions = engine(&store)
        .suggest_events_at(subject.id, now)
        .await
        .unwrap();

    assert_eq!(suggestions, vec![fresh.id]);
}

#[tokio::test]
async fn test_tag_affinity_contributes_per_matching_tag() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();

    // History gives {music: 0.6, art: 0.4}
    let past: Vec<Event> = ["music", "music", "music", "art", "art"]
        .iter()
        .map(|tag| {
            Event::new(
                Uuid::new_v4(),
                Uuid::new_v4(),
                "past",
                now - Duration::days(9),
                now - Duration::days(8),
            )
            .with_tags([*tag])
        })
        .collect();

    let mut subject = User::new(Uuid::new_v4(), "u");
    subject.accepted_events = past.iter().map(|e| e.id).collect();
    store.insert_user(subject.clone()).await.unwrap();
    for e in &past {
        store.insert_event(e.clone()).await.unwrap();
    }

    let both = open_event(Uuid::new_v4(), now, &["music", "art"]);
    let music_only = open_event(Uuid::new_v4(), now, &["music"]);
    let untagged = open_event(Uuid::new_v4(), now, &[]);
    insert_events(&store, &[&untagged, &music_only, &both]).await;

    let suggestions = engine(&store)
        .suggest_events_at(subject.id, now)
        .await
        .unwrap();

    // 1 + 0.6 + 0.4, then 1 + 0.6, then the base score alone
    assert_eq!(suggestions, vec![both.id, music_only.id, untagged.id]);
}

#[tokio::test]
async fn test_new_user_gets_base_score_ranking() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    let subject = User::new(Uuid::new_v4(), "new");
    store.insert_user(subject.clone()).await.unwrap();

    let events: Vec<Event> = (0..25)
        .map(|_| open_event(Uuid::new_v4(), now, &["misc"]))
        .collect();
    for e in &events {
        store.insert_event(e.clone()).await.unwrap();
    }

    let suggestions = engine(&store)
        .suggest_events_at(subject.id, now)
        .await
        .unwrap();

    // All tied at the base score, so ids break the tie
    let mut expected: Vec<Uuid> = events.iter().map(|e| e.id).collect();
    expected.sort();
    expected.truncate(20);
    assert_eq!(suggestions, expected);
}

#[tokio::test]
async fn test_suggestions_are_appended_to_pending() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();

    let already_pending = open_event(Uuid::new_v4(), now, &[]);
    let mut subject = User::new(Uuid::new_v4(), "u");
    subject.pending_events = vec![already_pending.id];
    store.insert_user(subject.clone()).await.unwrap();

    let fresh = open_event(Uuid::new_v4(), now, &[]);
    insert_events(&store, &[&already_pending, &fresh]).await;

    let engine = engine(&store);
    let first = engine.suggest_events_at(subject.id, now).await.unwrap();
    assert_eq!(first, vec![fresh.id]);

    let stored = store.find_user(subject.id).await.unwrap().unwrap();
    assert_eq!(stored.pending_events, vec![already_pending.id, fresh.id]);

    // Re-running finds nothing new and leaves the list alone
    let second = engine.suggest_events_at(subject.id, now).await.unwrap();
    assert!(second.is_empty());
    let stored = store.find_user(subject.id).await.unwrap().unwrap();
    assert_eq!(stored.pending_events, vec![already_pending.id, fresh.id]);
}

#[tokio::test]
async fn test_events_from_blocked_organizers_are_hidden() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();

    let blocked_org = Uuid::new_v4();
    let blocking_org = Uuid::new_v4();
    let mut subject = User::new(Uuid::new_v4(), "u");
    subject.blocked_users.insert(blocked_org);
    subject.blocked_by.insert(blocking_org);
    store.insert_user(subject.clone()).await.unwrap();

    let hidden_a = open_event(blocked_org, now, &[]);
    let hidden_b = open_event(blocking_org, now, &[]);
    let visible = open_event(Uuid::new_v4(), now, &[]);
    insert_events(&store, &[&hidden_a, &hidden_b, &visible]).await;

    let suggestions = engine(&store)
        .suggest_events_at(subject.id, now)
        .await
        .unwrap();
    assert_eq!(suggestions, vec![visible.id]);
}

#[tokio::test]
async fn test_co_attendee_seed_and_organizer_bonus() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();
    let favourite_org = Uuid::new_v4();

    let mut subject = User::new(Uuid::new_v4(), "u");
    let mut peer = User::new(Uuid::new_v4(), "peer");

    let shared = Event::new(
        Uuid::new_v4(),
        favourite_org,
        "shared",
        now - Duration::days(5),
        now - Duration::days(4),
    )
    .with_tags(["hiking", "outdoors"])
    .with_attendees([subject.id, peer.id]);
    subject.accepted_events = vec![shared.id];

    // Seeded at 1/2 (one of two tags) instead of the base score of 1
    let peer_pick = open_event(Uuid::new_v4(), now, &["hiking"]);
    peer.accepted_events = vec![shared.id, peer_pick.id];

    let by_favourite = open_event(favourite_org, now, &[]);
    let plain = open_event(Uuid::new_v4(), now, &[]);

    store.insert_user(subject.clone()).await.unwrap();
    store.insert_user(peer).await.unwrap();
    insert_events(&store, &[&shared, &peer_pick, &by_favourite, &plain]).await;

    let suggestions = engine(&store)
        .suggest_events_at(subject.id, now)
        .await
        .unwrap();

    // by_favourite: 1 + 1.0, peer_pick: 0.5 + 0.5 (hiking), plain: 1
    assert_eq!(suggestions[0], by_favourite.id);
    assert_eq!(suggestions.len(), 3);
    assert!(suggestions.contains(&peer_pick.id));
    assert!(suggestions.contains(&plain.id));
}

#[tokio::test]
async fn test_missing_subject_is_an_error() {
    let store = Arc::new(InMemoryStore::new());
    let result = engine(&store).suggest_events(Uuid::new_v4()).await;
    assert!(result.is_err());
}
