//! Chat Handlers
//!
//! Presence, messaging and history endpoints under `/api/chat`. Every
//! handler runs behind the auth middleware and reads the caller from the
//! `AuthUser` extension.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::request::{EquipmentRequestRequest, HistoryParams, SendMessageRequest};
use crate::application::dto::response::{
    ChatMessageResponse, ConversationResponse, MarkReadResponse, OnlineAdminsResponse,
    OnlineUsersResponse, PresenceResponse, SendMessageResponse, UnreadCountResponse,
    UserStatusResponse,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Mark the caller online
pub async fn go_online(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Json<PresenceResponse> {
    state.chat.set_user_online(auth.user_id).await;
    Json(PresenceResponse {
        user_id: auth.user_id,
        online: true,
        ttl_secs: Some(state.chat.presence_ttl_secs()),
    })
}

/// Mark the caller offline
pub async fn go_offline(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Json<PresenceResponse> {
    state.chat.set_user_offline(auth.user_id).await;
    Json(PresenceResponse {
        user_id: auth.user_id,
        online: false,
        ttl_secs: None,
    })
}

/// Refresh the caller's presence
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Json<PresenceResponse> {
    state.chat.set_user_online(auth.user_id).await;
    Json(PresenceResponse {
        user_id: auth.user_id,
        online: true,
        ttl_secs: Some(state.chat.presence_ttl_secs()),
    })
}

/// All users currently online
pub async fn online_users(State(state): State<AppState>) -> Json<OnlineUsersResponse> {
    Json(OnlineUsersResponse {
        user_ids: state.chat.get_online_users().await,
    })
}

/// Admins currently online, for the client "is anyone there?" view
pub async fn online_admins(State(state): State<AppState>) -> Result<Json<OnlineAdminsResponse>, AppError> {
    let admin_ids = state.messaging.online_admins().await?;
    Ok(Json(OnlineAdminsResponse {
        any_online: !admin_ids.is_empty(),
        admin_ids,
    }))
}

/// Presence of one user, for the admin client-status view
pub async fn user_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserStatusResponse>, AppError> {
    if !auth.role.is_admin() {
        return Err(AppError::Forbidden("Only admins can look up user status".into()));
    }
    Ok(Json(UserStatusResponse {
        user_id,
        online: state.chat.is_user_online(user_id).await,
    }))
}

/// Send a direct message
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), AppError> {
    body.validate().map_err(validation_error)?;

    let outcome = state.messaging.send_message(auth.user_id, body.into()).await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Send an equipment request to an admin
pub async fn send_equipment_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<EquipmentRequestRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), AppError> {
    if auth.role.is_admin() {
        return Err(AppError::Forbidden("Equipment requests are sent by clients".into()));
    }
    body.validate().map_err(validation_error)?;

    let outcome = state
        .messaging
        .send_equipment_request(auth.user_id, body.into())
        .await?;

    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// Conversations of the caller
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ConversationResponse>>, AppError> {
    let conversations = state.messaging.list_conversations(auth.user_id).await?;

    Ok(Json(
        conversations
            .into_iter()
            .map(|c| ConversationResponse::for_user(c, auth.user_id))
            .collect(),
    ))
}

/// Message history with another user
pub async fn conversation_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(other_user_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ChatMessageResponse>>, AppError> {
    let messages = state
        .messaging
        .history(auth.user_id, other_user_id, params.into())
        .await?;

    Ok(Json(messages.into_iter().map(ChatMessageResponse::from).collect()))
}

/// Mark messages from another user as read
pub async fn mark_conversation_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(other_user_id): Path<i64>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let updated = state.messaging.mark_read(auth.user_id, other_user_id).await?;
    Ok(Json(MarkReadResponse { updated }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = state.messaging.unread_count(auth.user_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}
