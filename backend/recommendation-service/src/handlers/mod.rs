/// Suggestion API Handlers
///
/// On-demand entry points for the friend and event suggestion engines
use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{Envelope, Result};
use crate::state::AppContext;

/// Request body naming the subject user
#[derive(Debug, Deserialize)]
pub struct SubjectRequest {
    pub user: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub user: Uuid,
    pub suggestions: Vec<Uuid>,
}

/// POST /populateFriends
/// Recompute and store the subject's friend suggestions
#[post("/populateFriends")]
pub async fn populate_friends(
    body: web::Json<SubjectRequest>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse> {
    debug!("Populating friend suggestions for user: {}", body.user);

    match ctx.friends.suggest_friends(body.user).await {
        Ok(suggestions) => Ok(HttpResponse::Ok().json(Envelope::success(SuggestionResponse {
            user: body.user,
            suggestions,
        }))),
        Err(err) => {
            error!("Failed to populate friend suggestions: {}", err);
            Err(err)
        }
    }
}

/// POST /addEventSuggestions
/// Append ranked event suggestions to the subject's pending events
#[post("/addEventSuggestions")]
pub async fn add_event_suggestions(
    body: web::Json<SubjectRequest>,
    ctx: web::Data<AppContext>,
) -> Result<HttpResponse> {
    debug!("Adding event suggestions for user: {}", body.user);

    match ctx.events.suggest_events(body.user).await {
        Ok(suggestions) => Ok(HttpResponse::Ok().json(Envelope::success(SuggestionResponse {
            user: body.user,
            suggestions,
        }))),
        Err(err) => {
            error!("Failed to add event suggestions: {}", err);
            Err(err)
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(populate_friends).service(add_event_suggestions);
}
