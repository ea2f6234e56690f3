//! Suggestion engines
//!
//! Friend and event suggestion engines plus the affinity calculators they share.

pub mod event_suggestions;
pub mod friend_suggestions;
pub mod weights;

use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

pub use event_suggestions::EventSuggestionEngine;
pub use friend_suggestions::FriendSuggestionEngine;

/// Highest weight first, ties broken by ascending id, truncated to `limit`
pub(crate) fn rank_top(scores: HashMap<Uuid, f64>, limit: usize) -> Vec<Uuid> {
    let mut ranked: Vec<(Uuid, f64)> = scores.into_iter().collect();
    ranked.sort_by(|(a_id, a), (b_id, b)| {
        b.partial_cmp(a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a_id.cmp(b_id))
    });
    ranked.into_iter().take(limit).map(|(id, _)| id).collect()
}
