//! Event suggestion engine
//!
//! Ranks open events the subject has not seen yet by tag, organizer and
//! co-attendee affinity, then appends the top events to the pending list.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use document_store::{DocumentStore, Event, User, UserUpdate};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SuggestionLimits;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::services::rank_top;
use crate::services::weights::{attendee_overlap_affinity, organizer_affinity, tag_affinity};

/// Score of a candidate with no overlap seed
const BASE_SCORE: f64 = 1.0;

pub struct EventSuggestionEngine {
    store: Arc<dyn DocumentStore>,
    limits: SuggestionLimits,
}

impl EventSuggestionEngine {
    pub fn new(store: Arc<dyn DocumentStore>, limits: SuggestionLimits) -> Self {
        Self { store, limits }
    }

    pub async fn suggest_events(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.suggest_events_at(user_id, Utc::now()).await
    }

    /// Rank events still open at `now` and append the top ones to the
    /// subject's pending events.
    pub async fn suggest_events_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let subject = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;

        let history = self.store.find_events(&subject.accepted_events).await?;
        if history.len() < subject.accepted_events.len() {
            debug!(
                user_id = %user_id,
                missing = subject.accepted_events.len() - history.len(),
                "Skipping unresolved event references"
            );
        }

        let tags = tag_affinity(&history);
        let organizers = organizer_affinity(&history);
        let peer_history = self.peer_history(&subject, &history).await?;
        let seeds = attendee_overlap_affinity(&subject, &history, &peer_history);

        let candidates: Vec<Event> = self
            .store
            .find_open_events(now, &subject.seen_event_ids())
            .await?
            .into_iter()
            .filter(|event| !subject.is_blocked_with(&event.creator))
            .collect();

        let scores: HashMap<Uuid, f64> = candidates
            .iter()
            .map(|event| (event.id, score_event(event, &seeds, &organizers, &tags)))
            .collect();

        let suggestions = rank_top(scores, self.limits.event_limit);

        if !suggestions.is_empty() {
            self.store
                .update_user(user_id, &[UserUpdate::PushPendingEvents(suggestions.clone())])
                .await?
                .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        }

        metrics::record_suggestions("events", suggestions.len());
        info!(
            user_id = %user_id,
            candidates = candidates.len(),
            count = suggestions.len(),
            "Event suggestions appended"
        );

        Ok(suggestions)
    }

    /// Accepted events of everyone the subject attended an event with
    async fn peer_history(
        &self,
        subject: &User,
        history: &[Event],
    ) -> Result<HashMap<Uuid, Vec<Event>>> {
        let peer_ids: Vec<Uuid> = history
            .iter()
            .flat_map(|event| event.attendees.iter().copied())
            .filter(|id| *id != subject.id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if peer_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let peers = self.store.find_users(&peer_ids).await?;
        let event_ids: Vec<Uuid> = peers
            .iter()
            .flat_map(|peer| peer.accepted_events.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let events: HashMap<Uuid, Event> = self
            .store
            .find_events(&event_ids)
            .await?
            .into_iter()
            .map(|event| (event.id, event))
            .collect();

        Ok(peers
            .into_iter()
            .map(|peer| {
                let accepted = peer
                    .accepted_events
                    .iter()
                    .filter_map(|id| events.get(id).cloned())
                    .collect();
                (peer.id, accepted)
            })
            .collect())
    }
}

/// Overlap seed (or the base score), plus organizer affinity, plus the
/// affinity of every tag the event carries
pub fn score_event(
    event: &Event,
    seeds: &HashMap<Uuid, f64>,
    organizers: &HashMap<Uuid, f64>,
    tags: &HashMap<String, f64>,
) -> f64 {
    let seed = seeds.get(&event.id).copied().unwrap_or(BASE_SCORE);
    let organizer = organizers.get(&event.creator).copied().unwrap_or(0.0);
    let tag_total: f64 = event.tags.iter().filter_map(|tag| tags.get(tag)).sum();
    seed + organizer + tag_total
}
