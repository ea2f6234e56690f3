/// Social Activity API Handlers
///
/// Thin POST routes over [`SocialActivityService`](crate::services::SocialActivityService).
/// Every route answers with the `{"status", "data"}` envelope.
use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Envelope, Result};
use crate::services::Rsvp;
use crate::state::AppState;

fn ok() -> HttpResponse {
    HttpResponse::Ok().json(Envelope::success("OK"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestBody {
    pub sender: Uuid,
    pub name: String,
    pub receiver: Uuid,
    pub want_to_friend: bool,
}

#[derive(Debug, Deserialize)]
pub struct FriendResponseBody {
    pub sender: Uuid,
    pub receiver: Uuid,
    pub name: String,
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct UnfriendBody {
    pub user: Uuid,
    pub friend: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteBody {
    pub sender: Uuid,
    pub sender_name: String,
    pub friend: Uuid,
    pub event: Uuid,
    pub event_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteNotificationBody {
    pub user: Uuid,
    pub notif: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RsvpBody {
    pub user: Uuid,
    pub event: Uuid,
    pub action: Rsvp,
}

#[derive(Debug, Deserialize)]
pub struct UserEventBody {
    pub user: Uuid,
    pub event: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoAcceptResponse {
    pub chat_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageBody {
    pub chat: Uuid,
    pub sender: Uuid,
    pub sender_name: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatReadBody {
    pub user: Uuid,
    pub chat: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UploadStoryBody {
    pub event: Uuid,
    pub user: Uuid,
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct ViewStoryBody {
    pub user: Uuid,
    pub event: Uuid,
    pub image: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockBody {
    pub user: Uuid,
    pub blocked_user: Uuid,
    pub is_blocking: bool,
}

#[derive(Debug, Deserialize)]
pub struct PushTokenBody {
    pub user: Uuid,
    pub token: String,
}

/// POST /friendReq
#[post("/friendReq")]
pub async fn friend_request(
    body: web::Json<FriendRequestBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state
        .activity
        .send_friend_request(body.sender, &body.name, body.receiver, body.want_to_friend)
        .await?;
    Ok(ok())
}

/// POST /determineFriend
#[post("/determineFriend")]
pub async fn determine_friend(
    body: web::Json<FriendResponseBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state
        .activity
        .respond_friend_request(body.sender, body.receiver, &body.name, body.accepted)
        .await?;
    Ok(ok())
}

/// POST /unfriend
#[post("/unfriend")]
pub async fn unfriend(
    body: web::Json<UnfriendBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.activity.unfriend(body.user, body.friend).await?;
    Ok(ok())
}

/// POST /inviteFriend
#[post("/inviteFriend")]
pub async fn invite_friend(
    body: web::Json<InviteBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state
        .activity
        .invite_friend(
            body.sender,
            &body.sender_name,
            body.friend,
            body.event,
            &body.event_name,
        )
        .await?;
    Ok(ok())
}

/// POST /deleteNotif
#[post("/deleteNotif")]
pub async fn delete_notification(
    body: web::Json<DeleteNotificationBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state
        .activity
        .delete_notification(body.user, body.notif)
        .await?;
    Ok(ok())
}

/// POST /eventRSVP
#[post("/eventRSVP")]
pub async fn event_rsvp(
    body: web::Json<RsvpBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.activity.rsvp(body.user, body.event, body.action).await?;
    Ok(ok())
}

/// POST /undoAcceptEvent
#[post("/undoAcceptEvent")]
pub async fn undo_accept_event(
    body: web::Json<UserEventBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let chat_id = state.activity.undo_accept(body.user, body.event).await?;
    Ok(HttpResponse::Ok().json(Envelope::success(UndoAcceptResponse { chat_id })))
}

/// POST /undoRejectEvent
#[post("/undoRejectEvent")]
pub async fn undo_reject_event(
    body: web::Json<UserEventBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.activity.undo_reject(body.user, body.event).await?;
    Ok(HttpResponse::Ok().json(Envelope::success(body.event)))
}

/// POST /sendMessage
#[post("/sendMessage")]
pub async fn send_message(
    body: web::Json<ChatMessageBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state
        .activity
        .send_chat_message(body.chat, body.sender, &body.sender_name, &body.message)
        .await?;
    Ok(ok())
}

/// POST /chatRead
#[post("/chatRead")]
pub async fn chat_read(
    body: web::Json<ChatReadBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.activity.mark_chat_read(body.chat, body.user).await?;
    Ok(ok())
}

/// POST /uploadStory
#[post("/uploadStory")]
pub async fn upload_story(
    body: web::Json<UploadStoryBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let image = state
        .activity
        .upload_story(body.event, body.user, &body.image)
        .await?;
    Ok(HttpResponse::Ok().json(Envelope::success(image)))
}

/// POST /viewStoryImage
#[post("/viewStoryImage")]
pub async fn view_story_image(
    body: web::Json<ViewStoryBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state
        .activity
        .view_story(body.event, body.image, body.user)
        .await?;
    Ok(ok())
}

/// POST /blockUser
#[post("/blockUser")]
pub async fn block_user(
    body: web::Json<BlockBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state
        .activity
        .block_user(body.user, body.blocked_user, body.is_blocking)
        .await?;
    Ok(ok())
}

/// POST /registerPushToken
#[post("/registerPushToken")]
pub async fn register_push_token(
    body: web::Json<PushTokenBody>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state
        .activity
        .register_push_token(body.user, &body.token)
        .await?;
    Ok(ok())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(friend_request)
        .service(determine_friend)
        .service(unfriend)
        .service(invite_friend)
        .service(delete_notification)
        .service(event_rsvp)
        .service(undo_accept_event)
        .service(undo_reject_event)
        .service(send_message)
        .service(chat_read)
        .service(upload_story)
        .service(view_story_image)
        .service(block_user)
        .service(register_push_token);
}
