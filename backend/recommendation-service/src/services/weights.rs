//! Affinity weight calculators
//!
//! Pure functions over a user's accepted-event history. Every weight produced
//! here is non-negative, and an empty history always yields an empty mapping.

use std::collections::{BTreeSet, HashMap};

use document_store::{Event, User};
use uuid::Uuid;

/// Share of interest per tag; sums to 1.0 whenever non-empty.
///
/// Each accepted event spreads a weight of `1/|tags|` over its own tags.
pub fn tag_affinity(history: &[Event]) -> HashMap<String, f64> {
    let mut weights: HashMap<String, f64> = HashMap::new();

    for event in history {
        if event.tags.is_empty() {
            continue;
        }
        let share = 1.0 / event.tags.len() as f64;
        for tag in &event.tags {
            *weights.entry(tag.clone()).or_insert(0.0) += share;
        }
    }

    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return HashMap::new();
    }
    for weight in weights.values_mut() {
        *weight /= total;
    }
    weights
}

/// Fraction of accepted events created by each organizer
pub fn organizer_affinity(history: &[Event]) -> HashMap<Uuid, f64> {
    if history.is_empty() {
        return HashMap::new();
    }

    let mut counts: HashMap<Uuid, f64> = HashMap::new();
    for event in history {
        *counts.entry(event.creator).or_insert(0.0) += 1.0;
    }

    let total = history.len() as f64;
    for count in counts.values_mut() {
        *count /= total;
    }
    counts
}

/// Seed scores for events accepted by people the subject attended events with.
///
/// For every accepted event and every other attendee of it, each of that
/// attendee's accepted events the subject has not yet seen is scored as
/// `matching tags / |tags(subject event)|`. Only positive matches are kept; when
/// several paths reach the same event the highest similarity wins.
///
/// `peer_history` maps an attendee id to that attendee's accepted events.
/// Attendees missing from it contribute nothing.
pub fn attendee_overlap_affinity(
    subject: &User,
    history: &[Event],
    peer_history: &HashMap<Uuid, Vec<Event>>,
) -> HashMap<Uuid, f64> {
    let seen = subject.seen_event_ids();
    let mut seeds: HashMap<Uuid, f64> = HashMap::new();

    for event in history {
        if event.tags.is_empty() {
            continue;
        }
        let denominator = event.tags.len() as f64;

        for attendee in event.attendees.iter().filter(|a| **a != subject.id) {
            let Some(peer_events) = peer_history.get(attendee) else {
                continue;
            };

            for peer_event in peer_events.iter().filter(|e| !seen.contains(&e.id)) {
                let matching = shared_tag_count(&event.tags, &peer_event.tags);
                if matching == 0 {
                    continue;
                }
                let similarity = matching as f64 / denominator;
                let seed = seeds.entry(peer_event.id).or_insert(0.0);
                if similarity > *seed {
                    *seed = similarity;
                }
            }
        }
    }

    seeds
}

fn shared_tag_count(a: &BTreeSet<String>, b: &BTreeSet<String>) -> usize {
    a.intersection(b).count()
}
