use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use document_store::{DocumentStore, Event, InMemoryStore, User};
use recommendation_service::config::SuggestionLimits;
use recommendation_service::services::FriendSuggestionEngine;
use uuid::Uuid;

fn user(name: &str) -> User {
    User::new(Uuid::new_v4(), name)
}

fn befriend(a: &mut User, b: &mut User) {
    a.friends.insert(b.id);
    b.friends.insert(a.id);
}

async fn seed(store: &InMemoryStore, users: &[&User]) {
    for u in users {
        store.insert_user((*u).clone()).await.unwrap();
    }
}

fn engine(store: &Arc<InMemoryStore>) -> FriendSuggestionEngine {
    FriendSuggestionEngine::new(store.clone(), SuggestionLimits::default())
}

#[tokio::test]
async fn test_common_friend_through_small_circles_ranks_first() {
    let store = Arc::new(InMemoryStore::new());

    let mut subject = user("u");
    let mut f1 = user("f1");
    let mut f2 = user("f2");
    let mut g = user("g");
    let mut x = user("x");
    let mut y: Vec<User> = (0..3).map(|i| user(&format!("y{}", i))).collect();

    befriend(&mut subject, &mut f1);
    befriend(&mut subject, &mut f2);
    // f1: 3 friends
    befriend(&mut f1, &mut g);
    befriend(&mut f1, &mut x);
    // f2: 5 friends
    befriend(&mut f2, &mut g);
    for other in y.iter_mut() {
        befriend(&mut f2, other);
    }

    seed(&store, &[&subject, &f1, &f2, &g, &x]).await;
    seed(&store, &y.iter().collect::<Vec<_>>()).await;

    let suggestions = engine(&store).suggest_friends(subject.id).await.unwrap();

    // g: 1/3 + 1/5, x: 1/3, each y: 1/5
    assert_eq!(suggestions[0], g.id);
    assert_eq!(suggestions[1], x.id);
    assert_eq!(suggestions.len(), 5);
    let y_position = suggestions.iter().position(|id| *id == y[0].id).unwrap();
    assert!(y_position > 1);
}

#[tokio::test]
async fn test_never_suggests_self_or_existing_friends() {
    let store = Arc::new(InMemoryStore::new());

    let mut subject = user("u");
    let mut a = user("a");
    let mut b = user("b");
    let mut c = user("c");
    befriend(&mut subject, &mut a);
    befriend(&mut subject, &mut b);
    befriend(&mut a, &mut b);
    befriend(&mut a, &mut c);

    seed(&store, &[&subject, &a, &b, &c]).await;

    let suggestions = engine(&store).suggest_friends(subject.id).await.unwrap();

    assert_eq!(suggestions, vec![c.id]);
    assert!(!suggestions.contains(&subject.id));
}

#[tokio::test]
async fn test_blocking_hides_both_directions() {
    let store = Arc::new(InMemoryStore::new());

    let mut blocker = user("blocker");
    let mut blocked = user("blocked");
    let mut mutual = user("mutual");
    befriend(&mut blocker, &mut mutual);
    befriend(&mut blocked, &mut mutual);
    blocker.blocked_users.insert(blocked.id);
    blocked.blocked_by.insert(blocker.id);

    let now = Utc::now();
    let event = Event::new(Uuid::new_v4(), mutual.id, "party", now, now + Duration::days(1))
        .with_attendees([blocker.id, blocked.id]);
    blocker.accepted_events.push(event.id);
    blocked.accepted_events.push(event.id);

    seed(&store, &[&blocker, &blocked, &mutual]).await;
    store.insert_event(event).await.unwrap();

    let engine = engine(&store);
    let for_blocker = engine.suggest_friends(blocker.id).await.unwrap();
    let for_blocked = engine.suggest_friends(blocked.id).await.unwrap();

    assert!(!for_blocker.contains(&blocked.id));
    assert!(!for_blocked.contains(&blocker.id));
}

#[tokio::test]
async fn test_block_seen_only_by_subject_still_hides_candidate() {
    let store = Arc::new(InMemoryStore::new());

    let mut subject = user("subject");
    let mut blocker = user("blocker");
    let mut mutual = user("mutual");
    befriend(&mut subject, &mut mutual);
    befriend(&mut blocker, &mut mutual);
    // The blocker's side of the pair is not recorded
    subject.blocked_by.insert(blocker.id);

    seed(&store, &[&subject, &blocker, &mutual]).await;

    let suggestions = engine(&store).suggest_friends(subject.id).await.unwrap();
    assert!(!suggestions.contains(&blocker.id));
}

#[tokio::test]
async fn test_co_attendees_are_weighted_by_event_size() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();

    let mut subject = user("u");
    let small_peer = user("small");
    let crowd: Vec<User> = (0..4).map(|i| user(&format!("crowd{}", i))).collect();

    let small = Event::new(Uuid::new_v4(), small_peer.id, "dinner", now, now)
        .with_attendees([subject.id, small_peer.id]);
    let large = Event::new(Uuid::new_v4(), crowd[0].id, "concert", now, now)
        .with_attendees(crowd.iter().map(|u| u.id).chain([subject.id]));
    subject.accepted_events = vec![small.id, large.id, Uuid::new_v4()];

    seed(&store, &[&subject, &small_peer]).await;
    seed(&store, &crowd.iter().collect::<Vec<_>>()).await;
    store.insert_event(small).await.unwrap();
    store.insert_event(large).await.unwrap();

    let suggestions = engine(&store).suggest_friends(subject.id).await.unwrap();

    assert_eq!(suggestions.len(), 5);
    assert_eq!(suggestions[0], small_peer.id);
}

#[tokio::test]
async fn test_isolated_user_falls_back_to_sample() {
    let store = Arc::new(InMemoryStore::new());

    let mut subject = user("loner");
    let mut blocked = user("blocked");
    subject.blocked_users.insert(blocked.id);
    blocked.blocked_by.insert(subject.id);
    seed(&store, &[&subject, &blocked]).await;

    let others: Vec<User> = (0..8).map(|i| user(&format!("o{}", i))).collect();
    seed(&store, &others.iter().collect::<Vec<_>>()).await;

    let suggestions = engine(&store).suggest_friends(subject.id).await.unwrap();

    assert_eq!(suggestions.len(), 5);
    assert!(!suggestions.contains(&subject.id));
    assert!(!suggestions.contains(&blocked.id));
    let unique: BTreeSet<Uuid> = suggestions.iter().copied().collect();
    assert_eq!(unique.len(), 5);
}

#[tokio::test]
async fn test_result_is_capped_and_replaces_previous_list() {
    let store = Arc::new(InMemoryStore::new());

    let mut subject = user("u");
    let mut hub = user("hub");
    befriend(&mut subject, &mut hub);
    let mut fans: Vec<User> = (0..30).map(|i| user(&format!("fan{}", i))).collect();
    for fan in fans.iter_mut() {
        befriend(&mut hub, fan);
    }
    let stale = Uuid::new_v4();
    subject.friend_recommendations = vec![stale];

    seed(&store, &[&subject, &hub]).await;
    seed(&store, &fans.iter().collect::<Vec<_>>()).await;

    let suggestions = engine(&store).suggest_friends(subject.id).await.unwrap();
    assert_eq!(suggestions.len(), 20);

    let stored = store.find_user(subject.id).await.unwrap().unwrap();
    assert_eq!(stored.friend_recommendations, suggestions);
    assert!(!stored.friend_recommendations.contains(&stale));
}
