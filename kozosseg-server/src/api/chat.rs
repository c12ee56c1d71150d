use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use kozosseg_types::{ChatContent, ChatRoom, ChatRoomSummary, ContentPage, PushEvent, SendMessageRequest};

use super::{get_user_from_headers, ApiError, ApiResult, PageQuery};
use crate::db::repositories::{ChatRepository, PersonalRepository};
use crate::state::AppState;

const DEFAULT_PER_PAGE: usize = 20;

#[derive(Debug, Default, Deserialize)]
pub struct RoomSearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub room_id: i64,
    pub marked: usize,
}

/// Load a room the caller takes part in; a missing room is a bad request
fn load_room(state: &AppState, room_id: i64, user_id: i64) -> Result<ChatRoom, ApiError> {
    let repo = ChatRepository::new(state.db.pool.clone());
    let room = repo
        .get_chat_room_by_id(room_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .ok_or_else(|| ApiError::BadRequest(format!("Chat room {} does not exist", room_id)))?;

    if !room.involves(user_id) {
        return Err(ApiError::Forbidden("Not a participant of this chat".to_string()));
    }
    Ok(room)
}

/// GET /chat/rooms?search= - The caller's chats with their partners
pub async fn list_rooms(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RoomSearchQuery>,
) -> ApiResult<Json<Vec<ChatRoomSummary>>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let repo = ChatRepository::new(state.db.pool.clone());
    let rooms = repo
        .get_room_summaries(user_id, query.search.as_deref())
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(Json(rooms))
}

/// GET /chat/rooms/:id - A room with its whole conversation
pub async fn get_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<i64>,
) -> ApiResult<Json<ChatRoom>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    Ok(Json(load_room(&state, room_id, user_id)?))
}

/// GET /chat/rooms/:id/messages?page=&per_page= - Messages, newest first
pub async fn get_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ContentPage<ChatContent>>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let (page, per_page) = query.resolve(DEFAULT_PER_PAGE)?;
    load_room(&state, room_id, user_id)?;

    let repo = ChatRepository::new(state.db.pool.clone());
    let contents = repo
        .get_contents(room_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(ContentPage::new(&contents, page, per_page)))
}

/// PUT /chat/rooms/:id/read - Mark the partner's messages as read
pub async fn mark_room_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(room_id): Path<i64>,
) -> ApiResult<Json<MarkReadResponse>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    load_room(&state, room_id, user_id)?;

    let repo = ChatRepository::new(state.db.pool.clone());
    let marked = repo
        .mark_read(room_id, user_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    Ok(Json(MarkReadResponse { room_id, marked }))
}

/// POST /chat/messages - Send a message, opening the room on first contact
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<ChatContent>> {
    let author_id = get_user_from_headers(&state, &headers)?;
    let message = request.message.trim();

    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".to_string()));
    }
    if request.receiver_id == author_id {
        return Err(ApiError::BadRequest("Cannot chat with yourself".to_string()));
    }

    let personals = PersonalRepository::new(state.db.pool.clone());
    if !personals
        .exists(request.receiver_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
    {
        return Err(ApiError::NotFound("Receiver not found".to_string()));
    }

    let repo = ChatRepository::new(state.db.pool.clone());
    let (room, created) = repo
        .get_or_create_room(author_id, request.receiver_id)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    if created {
        tracing::info!("Chat room {} opened by user {}", room.id, author_id);
    }

    let content = repo
        .add_content(room.id, author_id, message)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    let delivered = state
        .hub
        .send_to_user(request.receiver_id, &PushEvent::ChatMessage(content.clone()));
    tracing::debug!(
        "Message {} delivered live to {} connection(s)",
        content.message_id,
        delivered
    );

    Ok(Json(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{auth_headers, seeded_state};
    use crate::db::Database;
    use kozosseg_types::MessageStatus;
    use std::collections::HashSet;

    fn send(text: &str, receiver_id: i64) -> Json<SendMessageRequest> {
        Json(SendMessageRequest {
            receiver_id,
            message: text.to_string(),
        })
    }

    #[tokio::test]
    async fn test_get_room() {
        let (_dir, state) = seeded_state();

        let Json(room) = get_room(State(state.clone()), auth_headers(&state, 1), Path(1)).await.unwrap();
        assert_eq!(room.contents.len(), 2);
        assert_eq!(room.contents[0].message, "Szia Jakab!");

        let missing = get_room(State(state.clone()), auth_headers(&state, 1), Path(42)).await;
        assert!(matches!(missing, Err(ApiError::BadRequest(_))));

        let outsider = get_room(State(state.clone()), auth_headers(&state, 3), Path(1)).await;
        assert!(matches!(outsider, Err(ApiError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_search_rooms() {
        let (_dir, state) = seeded_state();
        let headers = auth_headers(&state, 1);
        send_message(State(state.clone()), headers.clone(), send("Hello Kiwi!", 3))
            .await
            .unwrap();

        let Json(all) = list_rooms(State(state.clone()), headers.clone(), Query(RoomSearchQuery::default()))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let Json(found) = list_rooms(
            State(state.clone()),
            headers.clone(),
            Query(RoomSearchQuery { search: Some("hello".to_string()) }),
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].partner.id, 3);

        let Json(by_name) = list_rooms(
            State(state),
            headers,
            Query(RoomSearchQuery { search: Some("elek".to_string()) }),
        )
        .await
        .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].partner.id, 2);
    }

    #[tokio::test]
    async fn test_send_message_reuses_room_and_pushes() {
        let (_dir, state) = seeded_state();
        let (_, mut rx) = state.hub.connect(2);

        let Json(content) = send_message(State(state.clone()), auth_headers(&state, 1), send("  Jövök!  ", 2))
            .await
            .unwrap();
        assert_eq!(content.chat_room_id, 1);
        assert_eq!(content.message, "Jövök!");
        assert_eq!(content.status, MessageStatus::Sent);

        match rx.try_recv() {
            Ok(PushEvent::ChatMessage(pushed)) => assert_eq!(pushed.message_id, content.message_id),
            other => panic!("expected a chat push, got {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_messages_share_one_room() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("chat.db")).unwrap();
        db.initialize().unwrap();
        db.seed_test_data().unwrap();
        let state = AppState::for_tests(db, dir.path());

        let mut handles = Vec::new();
        for i in 0..8 {
            let (author, receiver) = if i % 2 == 0 { (3, 4) } else { (4, 3) };
            let state = state.clone();
            let headers = auth_headers(&state, author);
            handles.push(tokio::spawn(async move {
                send_message(State(state), headers, send(&format!("szia {}", i), receiver))
                    .await
                    .map(|Json(content)| content.chat_room_id)
            }));
        }

        let mut room_ids = HashSet::new();
        for handle in handles {
            room_ids.insert(handle.await.unwrap().unwrap());
        }
        assert_eq!(room_ids.len(), 1);

        let repo = ChatRepository::new(state.db.pool.clone());
        let rooms = repo.get_all_chat_rooms(3).unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].contents.len(), 8);
    }

    #[tokio::test]
    async fn test_send_message_validation() {
        let (_dir, state) = seeded_state();
        let headers = auth_headers(&state, 1);

        let empty = send_message(State(state.clone()), headers.clone(), send("   ", 2)).await;
        assert!(matches!(empty, Err(ApiError::BadRequest(_))));
        let to_self = send_message(State(state.clone()), headers.clone(), send("hahó", 1)).await;
        assert!(matches!(to_self, Err(ApiError::BadRequest(_))));
        let unknown = send_message(State(state), headers, send("hahó", 77)).await;
        assert!(matches!(unknown, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_messages_page_newest_first() {
        let (_dir, state) = seeded_state();
        let headers = auth_headers(&state, 1);
        send_message(State(state.clone()), headers.clone(), send("harmadik", 2))
            .await
            .unwrap();

        let Json(page) = get_messages(
            State(state.clone()),
            headers.clone(),
            Path(1),
            Query(PageQuery { page: Some(1), per_page: Some(2) }),
        )
        .await
        .unwrap();
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data[0].message, "harmadik");

        let missing = get_messages(State(state), headers, Path(9), Query(PageQuery::default())).await;
        assert!(matches!(missing, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_mark_room_read() {
        let (_dir, state) = seeded_state();
        // message 2 from Jakab is still unread by Elek
        let Json(result) = mark_room_read(State(state.clone()), auth_headers(&state, 2), Path(1))
            .await
            .unwrap();
        assert_eq!(result.marked, 1);

        let room = ChatRepository::new(state.db.pool.clone()).get_chat_room_by_id(1).unwrap().unwrap();
        assert!(room.contents.iter().all(|c| c.status == MessageStatus::Read));
    }
}
