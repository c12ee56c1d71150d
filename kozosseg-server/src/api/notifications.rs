use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use kozosseg_types::{Notification, NotificationWithAvatar};

use super::{get_user_from_headers, ApiError, ApiResult};
use crate::db::repositories::NotificationRepository;
use crate::state::AppState;

/// GET /notifications - The caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<NotificationWithAvatar>>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = NotificationRepository::new(state.db.pool.clone());
    let notifications = repo
        .get_all_for(user_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(notifications))
}

/// PUT /notifications/:id/read - Mark a notification as seen
pub async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<Notification>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = NotificationRepository::new(state.db.pool.clone());

    let notification = repo
        .get_by_id(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;
    if notification.receiver_id != user_id {
        return Err(ApiError::Forbidden("Not your notification".to_string()));
    }

    repo.mark_read(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(Notification {
        is_new: false,
        ..notification
    }))
}
