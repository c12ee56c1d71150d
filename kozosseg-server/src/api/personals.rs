use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};

use kozosseg_types::{ContentPage, Personal, UpdatePersonalRequest};

use super::{get_user_from_headers, ApiError, ApiResult, PageQuery};
use crate::db::repositories::PersonalRepository;
use crate::state::AppState;

const DEFAULT_PER_PAGE: usize = 20;

/// GET /personals?page=&per_page= - Everyone but the caller, paginated
pub async fn list_personals(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ContentPage<Personal>>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let (page, per_page) = query.resolve(DEFAULT_PER_PAGE)?;

    let repo = PersonalRepository::new(state.db.pool.clone());
    let persons = repo
        .filter_persons(user_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(ContentPage::new(&persons, page, per_page)))
}

/// GET /personals/:id - Get a single profile
pub async fn get_personal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Personal>> {
    let repo = PersonalRepository::new(state.db.pool.clone());
    let personal = repo
        .get(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;
    Ok(Json(personal))
}

/// PUT /personals/me - Update the caller's profile fields
pub async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(changes): Json<UpdatePersonalRequest>,
) -> ApiResult<Json<Personal>> {
    let user_id = get_user_from_headers(&state, &headers)?;

    let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());
    if blank(&changes.first_name) || blank(&changes.last_name) {
        return Err(ApiError::BadRequest("Name fields cannot be empty".to_string()));
    }

    let repo = PersonalRepository::new(state.db.pool.clone());
    let updated = repo
        .update(user_id, &changes)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    if !updated {
        return Err(ApiError::NotFound("Profile not found".to_string()));
    }

    let personal = repo
        .get(user_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;
    tracing::info!("Profile {} updated", user_id);
    Ok(Json(personal))
}
