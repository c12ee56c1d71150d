use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use kozosseg_types::{
    FriendRequest, FriendRequestAnswer, FriendStatus, Notification, NotificationType, Personal,
    RelationResponse,
};

use super::{get_user_from_headers, ApiError, ApiResult};
use crate::db::repositories::{FriendRepository, NotificationRepository, PersonalRepository};
use crate::state::AppState;

pub const FRIEND_REQUEST_MESSAGE: &str = "ismerősnek jelölt";
pub const FRIEND_ACCEPTED_MESSAGE: &str = "Mostantól ismerősök vagytok.";
pub const FRIEND_REJECTED_MESSAGE: &str = "Ismerősnek jelölés elutasítva.";

/// GET /friends/:user_id - Accepted friends of a user
pub async fn get_friends(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Vec<Personal>>> {
    get_user_from_headers(&state, &headers)?;
    let repo = FriendRepository::new(state.db.pool.clone());
    let friends = repo
        .get_all_friends(user_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(friends))
}

/// GET /friends/:user_id/relation - How the caller relates to a user
pub async fn get_relation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<RelationResponse>> {
    let viewer_id = get_user_from_headers(&state, &headers)?;
    let repo = FriendRepository::new(state.db.pool.clone());
    let relation = repo
        .relation(user_id, viewer_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(RelationResponse {
        user_id,
        viewer_id,
        relation,
    }))
}

/// POST /friends/requests - Send a friend request
///
/// Answers 204 when the receiver has no profile. Repeating a request refreshes
/// the existing notification instead of adding another one.
pub async fn send_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<FriendRequest>,
) -> ApiResult<Response> {
    let sender_id = get_user_from_headers(&state, &headers)?;
    let receiver_id = request.receiver_id;

    let personals = PersonalRepository::new(state.db.pool.clone());
    if !personals
        .exists(receiver_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
    {
        tracing::debug!("Friend request to missing personal {}", receiver_id);
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    if receiver_id == sender_id {
        return Err(ApiError::BadRequest("Cannot send a friend request to yourself".to_string()));
    }

    let friends = FriendRepository::new(state.db.pool.clone());
    let existing = friends
        .find_between(receiver_id, sender_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    if existing.as_ref().is_some_and(|f| f.status == FriendStatus::Accepted) {
        return Err(ApiError::BadRequest("You are already friends".to_string()));
    }

    let notifications = NotificationRepository::new(state.db.pool.clone());
    let previous = notifications
        .find_friend_request(receiver_id, sender_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    let notification = match previous {
        Some(mut notification) => {
            notification.created_at = Utc::now();
            notification.is_new = true;
            notifications
                .update(&notification)
                .map_err(|e| ApiError::InternalError(e.to_string()))?;
            notification
        }
        None => {
            let notification = notifications
                .insert(&Notification::new(
                    receiver_id,
                    sender_id,
                    NotificationType::FriendRequest,
                    FRIEND_REQUEST_MESSAGE,
                ))
                .map_err(|e| ApiError::InternalError(e.to_string()))?;
            if existing.is_none() {
                friends
                    .request_pending(receiver_id, sender_id)
                    .map_err(|e| ApiError::InternalError(e.to_string()))?;
            }
            notification
        }
    };

    tracing::info!("User {} sent a friend request to {}", sender_id, receiver_id);
    state.push_notification(&notification);
    Ok(Json(notification).into_response())
}

/// PUT /friends/requests - Accept or reject a request addressed to the caller
pub async fn answer_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(answer): Json<FriendRequestAnswer>,
) -> ApiResult<Json<Option<Notification>>> {
    let receiver_id = get_user_from_headers(&state, &headers)?;
    let requester_id = answer.requester_id;

    let (content, notification_type) = match answer.status {
        FriendStatus::Accepted => (FRIEND_ACCEPTED_MESSAGE, NotificationType::FriendRequestAccepted),
        FriendStatus::Rejected => (FRIEND_REJECTED_MESSAGE, NotificationType::FriendRequestRejected),
        FriendStatus::Pending => {
            return Err(ApiError::BadRequest("A request can only be accepted or rejected".to_string()))
        }
    };

    let notifications = NotificationRepository::new(state.db.pool.clone());
    let notification = match answer.notification_id {
        Some(id) => {
            let found = notifications
                .get_by_id(id)
                .map_err(|e| ApiError::InternalError(e.to_string()))?;
            if found.as_ref().is_some_and(|n| n.receiver_id != receiver_id) {
                return Err(ApiError::Forbidden("Not your notification".to_string()));
            }
            found
        }
        None => notifications
            .find_friend_request(receiver_id, requester_id)
            .map_err(|e| ApiError::InternalError(e.to_string()))?,
    };

    let friends = FriendRepository::new(state.db.pool.clone());
    match answer.status {
        FriendStatus::Accepted => {
            friends
                .save_accepted(receiver_id, requester_id)
                .map_err(|e| ApiError::InternalError(e.to_string()))?;
        }
        _ => {
            friends
                .delete_pending(receiver_id, requester_id)
                .map_err(|e| ApiError::InternalError(e.to_string()))?;
        }
    }
    tracing::info!(
        "User {} answered the friend request of {} with {:?}",
        receiver_id,
        requester_id,
        answer.status
    );

    let Some(mut notification) = notification else {
        return Ok(Json(None));
    };

    // the request notification becomes the answer to the requester
    notification.content = content.to_string();
    notification.notification_type = notification_type;
    notification.receiver_id = requester_id;
    notification.sender_id = receiver_id;
    notification.is_new = true;
    notification.created_at = Utc::now();
    notifications
        .update(&notification)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    state.push_notification(&notification);
    Ok(Json(Some(notification)))
}

/// DELETE /friends/:friend_id - End a friendship
pub async fn delete_friend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(friend_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = FriendRepository::new(state.db.pool.clone());

    let friendship = repo
        .find_between(user_id, friend_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Friendship not found".to_string()))?;

    repo.delete(friendship.friendship_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    tracing::info!("Friendship {} removed by user {}", friendship.friendship_id, user_id);

    Ok(Json(json!({ "message": "Friendship removed" })))
}
