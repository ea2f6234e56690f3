//! Friend suggestion engine
//!
//! Scores acquaintances reached through existing friends and shared event
//! attendance, then replaces the subject's cached recommendation list.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use document_store::{DocumentStore, User, UserUpdate};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SuggestionLimits;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::services::rank_top;

pub struct FriendSuggestionEngine {
    store: Arc<dyn DocumentStore>,
    limits: SuggestionLimits,
}

impl FriendSuggestionEngine {
    pub fn new(store: Arc<dyn DocumentStore>, limits: SuggestionLimits) -> Self {
        Self { store, limits }
    }

    /// Recompute and store the ranked friend suggestions for `user_id`.
    ///
    /// Returns `NotFound` when the subject does not exist. Friend or event ids
    /// that fail to resolve are skipped.
    ///
    /// Blocks are read from the subject's own `blocked_users` and `blocked_by`
    /// only. Both fields must mirror the other user's, as the block flow
    /// writes them.
    pub async fn suggest_friends(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let subject = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;

        let scores = self.acquaintance_scores(&subject).await?;

        let ranked = rank_top(
            scores
                .into_iter()
                .filter(|(candidate, _)| !subject.friends.contains(candidate))
                .collect(),
            self.limits.friend_limit,
        );

        let suggestions = if ranked.is_empty() {
            let exclude: BTreeSet<Uuid> = std::iter::once(subject.id)
                .chain(subject.friends.iter().copied())
                .chain(subject.blocked_users.iter().copied())
                .chain(subject.blocked_by.iter().copied())
                .collect();
            debug!(user_id = %user_id, "No acquaintances found, sampling fallback suggestions");
            self.store
                .sample_user_ids(&exclude, self.limits.friend_fallback_limit)
                .await?
        } else {
            ranked
        };

        self.store
            .update_user(
                user_id,
                &[UserUpdate::SetFriendRecommendations(suggestions.clone())],
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;

        metrics::record_suggestions("friends", suggestions.len());
        info!(
            user_id = %user_id,
            count = suggestions.len(),
            "Friend suggestions updated"
        );

        Ok(suggestions)
    }

    /// Friend-of-friend and co-attendee weights, merged additively
    async fn acquaintance_scores(&self, subject: &User) -> Result<HashMap<Uuid, f64>> {
        let excluded =
            |candidate: &Uuid| *candidate == subject.id || subject.is_blocked_with(candidate);
        let mut scores: HashMap<Uuid, f64> = HashMap::new();

        let friend_ids: Vec<Uuid> = subject.friends.iter().copied().collect();
        let friends = self.store.find_users(&friend_ids).await?;
        if friends.len() < friend_ids.len() {
            debug!(
                user_id = %subject.id,
                missing = friend_ids.len() - friends.len(),
                "Skipping unresolved friend references"
            );
        }

        for friend in &friends {
            if friend.friends.is_empty() {
                continue;
            }
            let weight = 1.0 / friend.friends.len() as f64;
            for candidate in friend.friends.iter().filter(|c| !excluded(*c)) {
                *scores.entry(*candidate).or_insert(0.0) += weight;
            }
        }

        let history = self.store.find_events(&subject.accepted_events).await?;
        if history.len() < subject.accepted_events.len() {
            debug!(
                user_id = %subject.id,
                missing = subject.accepted_events.len() - history.len(),
                "Skipping unresolved event references"
            );
        }

        for event in &history {
            if event.attendees.is_empty() {
                continue;
            }
            let weight = 1.0 / event.attendees.len() as f64;
            for candidate in event.attendees.iter().filter(|c| !excluded(*c)) {
                *scores.entry(*candidate).or_insert(0.0) += weight;
            }
        }

        Ok(scores)
    }
}
