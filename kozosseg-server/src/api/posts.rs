use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::json;

use kozosseg_types::{
    ContentPage, ContentType, CreatePostRequest, Notification, NotificationType, PostView,
    PostWithComments, ReactionCounts, ReactionRequest, UpdatePostRequest,
};

use super::{get_user_from_headers, ApiError, ApiResult, PageQuery};
use crate::db::repositories::{ChatRepository, NotificationRepository, PersonalRepository, PostRepository};
use crate::state::AppState;
use crate::storage::{decode_base64, Bucket};

const DEFAULT_PER_PAGE: usize = 10;

pub const NEW_POST_MESSAGE: &str = "új bejegyzést tett közzé.";

/// GET /posts/:id - A post with its comments
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<PostWithComments>> {
    let repo = PostRepository::new(state.db.pool.clone());
    let post = repo
        .get_post_with_comments(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    Ok(Json(post))
}

/// GET /posts/profile/:profile_id?page=&per_page= - Posts on a profile, newest first
pub async fn get_profile_posts(
    State(state): State<AppState>,
    Path(profile_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ContentPage<PostView>>> {
    let (page, per_page) = query.resolve(DEFAULT_PER_PAGE)?;
    let repo = PostRepository::new(state.db.pool.clone());
    let posts = repo
        .get_all_post(profile_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(ContentPage::new(&posts, page, per_page)))
}

/// POST /posts - Publish a post, optionally with one media attachment
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<Json<PostView>> {
    let author_id = get_user_from_headers(&state, &headers)?;

    let personals = PersonalRepository::new(state.db.pool.clone());
    let author = personals
        .get(author_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Author profile not found".to_string()))?;
    if !personals
        .exists(request.source_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
    {
        return Err(ApiError::NotFound("Profile not found".to_string()));
    }

    let content = request.content.trim();
    if content.is_empty() && request.media.is_none() {
        return Err(ApiError::BadRequest("A post needs text or media".to_string()));
    }

    // store the attachment before the post so a bad upload leaves nothing behind
    let media = match &request.media {
        Some(upload) => {
            let content_type = ContentType::from_mime(&upload.content_type).ok_or_else(|| {
                ApiError::BadRequest(format!("Unsupported media type {}", upload.content_type))
            })?;
            let data = decode_base64(&upload.data).map_err(|e| ApiError::BadRequest(e.to_string()))?;
            let file_name = state
                .storage
                .store(Bucket::Posts, &upload.file_name, &data)
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            Some((file_name, content_type))
        }
        None => None,
    };

    let repo = PostRepository::new(state.db.pool.clone());
    let inserted = repo.insert_with_media(
        request.source_id,
        author_id,
        content,
        media.as_ref().map(|(file_name, content_type)| (file_name.as_str(), *content_type)),
    );
    let post = match inserted {
        Ok((post, _)) => post,
        Err(e) => {
            if let Some((file_name, _)) = &media {
                if let Err(cleanup) = state.storage.delete(Bucket::Posts, file_name).await {
                    tracing::warn!("Failed to remove orphaned media {}: {}", file_name, cleanup);
                }
            }
            return Err(ApiError::InternalError(e.to_string()));
        }
    };
    tracing::info!("User {} created post {}", author_id, post.id);

    let partners = ChatRepository::new(state.db.pool.clone())
        .get_chat_partner_ids(author_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    let notifications = NotificationRepository::new(state.db.pool.clone());
    for partner_id in partners {
        let notification = Notification::new(
            partner_id,
            author_id,
            NotificationType::NewPost,
            format!("{} {}", author.full_name(), NEW_POST_MESSAGE),
        );
        match notifications.insert(&notification) {
            Ok(stored) => state.push_notification(&stored),
            Err(e) => tracing::error!("Failed to notify user {} of post {}: {}", partner_id, post.id, e),
        }
    }

    let view = repo
        .get_view(post.id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::InternalError("Post vanished after insert".to_string()))?;
    Ok(Json(view))
}

/// PUT /posts/:id - Edit the text of one's own post
pub async fn update_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePostRequest>,
) -> ApiResult<Json<PostView>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = PostRepository::new(state.db.pool.clone());

    let view = repo
        .get_view(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    if view.author_id != user_id {
        return Err(ApiError::Forbidden("Only the author can edit this post".to_string()));
    }

    let content = request.content.trim();
    if content.is_empty() && view.media.is_empty() {
        return Err(ApiError::BadRequest("A post needs text or media".to_string()));
    }

    repo.update_content(id, content)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    let view = repo
        .get_view(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    Ok(Json(view))
}

/// DELETE /posts/:id - Remove one's own post with everything hanging off it
pub async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = PostRepository::new(state.db.pool.clone());

    let view = repo
        .get_view(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    if view.author_id != user_id {
        return Err(ApiError::Forbidden("Only the author can delete this post".to_string()));
    }

    repo.delete(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    for media in &view.media {
        if let Err(e) = state.storage.delete(Bucket::Posts, &media.file_name).await {
            tracing::warn!("Failed to remove media {} of post {}: {}", media.file_name, id, e);
        }
    }
    tracing::info!("User {} deleted post {}", user_id, id);

    Ok(Json(json!({ "message": "Post deleted" })))
}

/// POST /posts/:id/reaction - Like or dislike a post
pub async fn react(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(request): Json<ReactionRequest>,
) -> ApiResult<Json<ReactionCounts>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = PostRepository::new(state.db.pool.clone());

    repo.get_by_id(id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let counts = repo
        .react(id, user_id, request.kind)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{auth_headers, seeded_state};
    use kozosseg_types::{FileUpload, PushEvent, ReactionKind};

    fn text_post(source_id: i64, content: &str) -> Json<CreatePostRequest> {
        Json(CreatePostRequest {
            source_id,
            content: content.to_string(),
            media: None,
        })
    }

    #[tokio::test]
    async fn test_get_post() {
        let (_dir, state) = seeded_state();
        let Json(post) = get_post(State(state.clone()), Path(1)).await.unwrap();
        assert_eq!(post.post.author_id, 1);
        assert_eq!(post.comments.len(), 1);
        assert!(matches!(get_post(State(state), Path(50)).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_profile_posts_pagination() {
        let (_dir, state) = seeded_state();
        let repo = PostRepository::new(state.db.pool.clone());
        for i in 0..50 {
            repo.insert(4, 4, &format!("bejegyzés {}", i)).unwrap();
        }

        let Json(page) = get_profile_posts(
            State(state.clone()),
            Path(4),
            Query(PageQuery { page: Some(6), per_page: Some(9) }),
        )
        .await
        .unwrap();
        assert_eq!(page.total_pages, 6);
        assert_eq!(page.data.len(), 5);

        let Json(default_size) = get_profile_posts(State(state), Path(4), Query(PageQuery::default()))
            .await
            .unwrap();
        assert_eq!(default_size.total_pages, 5);
        assert_eq!(default_size.data.len(), 10);
    }

    #[tokio::test]
    async fn test_create_post_notifies_chat_partners() {
        let (_dir, state) = seeded_state();
        let (_, mut rx) = state.hub.connect(2);

        let Json(view) = create_post(State(state.clone()), auth_headers(&state, 1), text_post(1, "Szép napot!"))
            .await
            .unwrap();
        assert_eq!(view.full_name, "Gipsz Jakab");
        assert_eq!(view.content, "Szép napot!");

        // Elek chats with Jakab in the seeded room
        let for_elek = NotificationRepository::new(state.db.pool.clone()).get_all_for(2).unwrap();
        assert_eq!(for_elek.len(), 1);
        assert_eq!(for_elek[0].notification.notification_type, NotificationType::NewPost);
        assert!(matches!(rx.try_recv(), Ok(PushEvent::Notification(_))));
    }

    #[tokio::test]
    async fn test_create_post_with_media() {
        let (dir, state) = seeded_state();
        let Json(view) = create_post(
            State(state.clone()),
            auth_headers(&state, 3),
            Json(CreatePostRequest {
                source_id: 3,
                content: String::new(),
                media: Some(FileUpload {
                    file_name: "nyaralas.jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    data: "aGVsbG8=".to_string(),
                }),
            }),
        )
        .await
        .unwrap();

        assert_eq!(view.media.len(), 1);
        assert_eq!(view.media[0].content_type, ContentType::Image);
        assert!(dir.path().join("posts").join(&view.media[0].file_name).exists());
    }

    #[tokio::test]
    async fn test_create_post_validation() {
        let (_dir, state) = seeded_state();
        let headers = auth_headers(&state, 3);

        let empty = create_post(State(state.clone()), headers.clone(), text_post(3, "  ")).await;
        assert!(matches!(empty, Err(ApiError::BadRequest(_))));

        let bad_media = create_post(
            State(state.clone()),
            headers.clone(),
            Json(CreatePostRequest {
                source_id: 3,
                content: "dokumentum".to_string(),
                media: Some(FileUpload {
                    file_name: "a.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                    data: "aGVsbG8=".to_string(),
                }),
            }),
        )
        .await;
        assert!(matches!(bad_media, Err(ApiError::BadRequest(_))));

        let unknown_profile = create_post(State(state), headers, text_post(88, "hahó")).await;
        assert!(matches!(unknown_profile, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_require_author() {
        let (_dir, state) = seeded_state();

        let stranger = update_post(
            State(state.clone()),
            auth_headers(&state, 2),
            Path(1),
            Json(UpdatePostRequest { content: "átírva".to_string() }),
        )
        .await;
        assert!(matches!(stranger, Err(ApiError::Forbidden(_))));

        let Json(updated) = update_post(
            State(state.clone()),
            auth_headers(&state, 1),
            Path(1),
            Json(UpdatePostRequest { content: "átírva".to_string() }),
        )
        .await
        .unwrap();
        assert_eq!(updated.content, "átírva");

        let stranger = delete_post(State(state.clone()), auth_headers(&state, 2), Path(1)).await;
        assert!(matches!(stranger, Err(ApiError::Forbidden(_))));

        delete_post(State(state.clone()), auth_headers(&state, 1), Path(1)).await.unwrap();
        assert!(PostRepository::new(state.db.pool.clone()).get_by_id(1).unwrap().is_none());

        let gone = delete_post(State(state.clone()), auth_headers(&state, 1), Path(1)).await;
        assert!(matches!(gone, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_to_empty_text_needs_media() {
        let (_dir, state) = seeded_state();

        // seeded post 1 has no attachment
        let emptied = update_post(
            State(state.clone()),
            auth_headers(&state, 1),
            Path(1),
            Json(UpdatePostRequest { content: "   ".to_string() }),
        )
        .await;
        assert!(matches!(emptied, Err(ApiError::BadRequest(_))));
        assert_eq!(
            PostRepository::new(state.db.pool.clone()).get_by_id(1).unwrap().unwrap().content,
            "Első bejegyzés a profilomon."
        );

        let (post, _) = PostRepository::new(state.db.pool.clone())
            .insert_with_media(3, 3, "felirat", Some(("abc-kep.png", ContentType::Image)))
            .unwrap();
        let Json(caption_removed) = update_post(
            State(state.clone()),
            auth_headers(&state, 3),
            Path(post.id),
            Json(UpdatePostRequest { content: String::new() }),
        )
        .await
        .unwrap();
        assert_eq!(caption_removed.content, "");
        assert_eq!(caption_removed.media.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_post_insert_removes_stored_media() {
        let (dir, state) = seeded_state();
        state
            .db
            .connection()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER refuse_media BEFORE INSERT ON media_contents
                 BEGIN SELECT RAISE(ABORT, 'media refused'); END;",
            )
            .unwrap();

        let result = create_post(
            State(state.clone()),
            auth_headers(&state, 3),
            Json(CreatePostRequest {
                source_id: 3,
                content: "nyaralás".to_string(),
                media: Some(FileUpload {
                    file_name: "nyaralas.jpg".to_string(),
                    content_type: "image/jpeg".to_string(),
                    data: "aGVsbG8=".to_string(),
                }),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::InternalError(_))));

        assert!(PostRepository::new(state.db.pool.clone()).get_all_post(3).unwrap().is_empty());
        let posts_dir = dir.path().join("posts");
        let leftovers = std::fs::read_dir(&posts_dir).map(|entries| entries.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_react_counts() {
        let (_dir, state) = seeded_state();

        let like = || Json(ReactionRequest { kind: ReactionKind::Like });
        let Json(counts) = react(State(state.clone()), auth_headers(&state, 2), Path(1), like()).await.unwrap();
        assert_eq!(counts, ReactionCounts { likes: 1, dislikes: 0 });

        react(State(state.clone()), auth_headers(&state, 3), Path(1), like()).await.unwrap();
        let Json(changed) = react(
            State(state.clone()),
            auth_headers(&state, 2),
            Path(1),
            Json(ReactionRequest { kind: ReactionKind::Dislike }),
        )
        .await
        .unwrap();
        assert_eq!(changed, ReactionCounts { likes: 1, dislikes: 1 });

        let missing = react(State(state.clone()), auth_headers(&state, 2), Path(77), like()).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));
    }
}
