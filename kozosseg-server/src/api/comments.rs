use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::json;

use kozosseg_types::{Comment, NewCommentRequest, UpdateCommentRequest};

use super::{get_user_from_headers, ApiError, ApiResult};
use crate::db::repositories::{CommentRepository, PersonalRepository, PostRepository};
use crate::state::AppState;

fn load_comment(repo: &CommentRepository, id: i64) -> Result<Comment, ApiError> {
    repo.get_by_id(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))
}

/// GET /comments/:id
pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Comment>> {
    let repo = CommentRepository::new(state.db.pool.clone());
    Ok(Json(load_comment(&repo, id)?))
}

/// POST /comments - Comment on a post
pub async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<NewCommentRequest>,
) -> ApiResult<Json<Comment>> {
    let author_id = get_user_from_headers(&state, &headers)?;

    if !PersonalRepository::new(state.db.pool.clone())
        .exists(author_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
    {
        return Err(ApiError::NotFound("Commenter profile not found".to_string()));
    }
    PostRepository::new(state.db.pool.clone())
        .get_by_id(request.post_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty".to_string()));
    }

    let comment = CommentRepository::new(state.db.pool.clone())
        .insert(request.post_id, author_id, text)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    tracing::debug!("User {} commented on post {}", author_id, request.post_id);

    Ok(Json(comment))
}

/// PUT /comments/:id - Edit one's own comment
pub async fn update_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCommentRequest>,
) -> ApiResult<Json<Comment>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = CommentRepository::new(state.db.pool.clone());

    let comment = load_comment(&repo, id)?;
    if comment.author_id != user_id {
        return Err(ApiError::Forbidden("Only the author can edit this comment".to_string()));
    }
    let text = request.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Comment cannot be empty".to_string()));
    }

    repo.update_text(id, text)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(Comment {
        text: text.to_string(),
        ..comment
    }))
}

/// DELETE /comments/:id - Comment author or post author only
pub async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = CommentRepository::new(state.db.pool.clone());

    let comment = load_comment(&repo, id)?;
    let post_author = PostRepository::new(state.db.pool.clone())
        .get_by_id(comment.post_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .map(|post| post.author_id);

    if comment.author_id != user_id && post_author != Some(user_id) {
        return Err(ApiError::Forbidden("Not allowed to delete this comment".to_string()));
    }

    repo.delete(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    tracing::debug!("Comment {} deleted by user {}", id, user_id);

    Ok(Json(json!({ "message": "Comment deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{auth_headers, seeded_state};

    #[tokio::test]
    async fn test_get_comment() {
        let (_dir, state) = seeded_state();
        let Json(comment) = get_comment(State(state.clone()), Path(1)).await.unwrap();
        assert_eq!(comment.text, "Gratulálok!");
        assert!(matches!(get_comment(State(state), Path(9)).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_comment() {
        let (_dir, state) = seeded_state();
        let headers = auth_headers(&state, 3);

        let Json(comment) = create_comment(
            State(state.clone()),
            headers.clone(),
            Json(NewCommentRequest { post_id: 1, text: " Szuper! ".to_string() }),
        )
        .await
        .unwrap();
        assert_eq!(comment.text, "Szuper!");
        assert_eq!(comment.author_id, 3);

        let no_post = create_comment(
            State(state.clone()),
            headers.clone(),
            Json(NewCommentRequest { post_id: 40, text: "hahó".to_string() }),
        )
        .await;
        assert!(matches!(no_post, Err(ApiError::NotFound(_))));

        let empty = create_comment(
            State(state),
            headers,
            Json(NewCommentRequest { post_id: 1, text: "   ".to_string() }),
        )
        .await;
        assert!(matches!(empty, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_update_comment_author_only() {
        let (_dir, state) = seeded_state();
        let request = || Json(UpdateCommentRequest { text: "Boldog szülinapot!".to_string() });

        let stranger = update_comment(State(state.clone()), auth_headers(&state, 1), Path(1), request()).await;
        assert!(matches!(stranger, Err(ApiError::Forbidden(_))));

        let Json(updated) = update_comment(State(state.clone()), auth_headers(&state, 2), Path(1), request())
            .await
            .unwrap();
        assert_eq!(updated.text, "Boldog szülinapot!");
    }

    #[tokio::test]
    async fn test_delete_comment_permissions() {
        let (_dir, state) = seeded_state();

        // neither comment author (2) nor post author (1)
        let outsider = delete_comment(State(state.clone()), auth_headers(&state, 3), Path(1)).await;
        assert!(matches!(outsider, Err(ApiError::Forbidden(_))));

        // the post author may remove comments under their post
        delete_comment(State(state.clone()), auth_headers(&state, 1), Path(1)).await.unwrap();
        let gone = get_comment(State(state), Path(1)).await;
        assert!(matches!(gone, Err(ApiError::NotFound(_))));
    }
}
