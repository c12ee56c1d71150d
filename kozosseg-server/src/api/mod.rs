pub mod chat;
pub mod comments;
pub mod error;
pub mod friends;
pub mod notifications;
pub mod personals;
pub mod posts;
pub mod realtime;
pub mod users;

use axum::{
    http::HeaderMap,
    middleware,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::rate_limit::{self, RateLimiter};
use crate::state::AppState;

pub use error::{ApiError, ApiResult};

/// Header carrying the session token
pub const SESSION_HEADER: &str = "X-Session-Token";

/// Extract authenticated user ID from session token header
pub(crate) fn get_user_from_headers(state: &AppState, headers: &HeaderMap) -> Result<i64, ApiError> {
    let token = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing session token".to_string()))?;

    state
        .get_authenticated_user_id_from_token(token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid session token".to_string()))
}

/// `?page=&per_page=` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl PageQuery {
    /// Page and page size with the endpoint's default size filled in
    pub(crate) fn resolve(&self, default_per_page: usize) -> Result<(usize, usize), ApiError> {
        let page = self.page.unwrap_or(1);
        let per_page = self.per_page.unwrap_or(default_per_page);
        if page == 0 {
            return Err(ApiError::BadRequest("page starts at 1".to_string()));
        }
        if per_page == 0 {
            return Err(ApiError::BadRequest("per_page must be positive".to_string()));
        }
        Ok((page, per_page))
    }
}

/// The full HTTP surface of the server
pub fn router(state: AppState, rate_limiter: RateLimiter) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Account routes
        .route("/users/register", post(users::register))
        .route("/users/activate/:guid", get(users::activate))
        .route("/users/me", get(users::me))
        .route("/users/me/avatar", put(users::upload_avatar))
        .route("/users/password/forgot", post(users::forgot_password))
        .route("/users/password/reset", post(users::reset_password))
        .route("/users/:id", get(users::get_user))
        .route("/auth/login", post(users::login))
        .route("/auth/logout", post(users::logout))
        // Profile routes
        .route("/personals", get(personals::list_personals))
        .route("/personals/me", put(personals::update_me))
        .route("/personals/:id", get(personals::get_personal))
        // Friend routes
        .route(
            "/friends/requests",
            post(friends::send_request).put(friends::answer_request),
        )
        .route("/friends/:id", get(friends::get_friends).delete(friends::delete_friend))
        .route("/friends/:id/relation", get(friends::get_relation))
        // Notification routes
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/:id/read", put(notifications::mark_read))
        // Chat routes
        .route("/chat/rooms", get(chat::list_rooms))
        .route("/chat/rooms/:id", get(chat::get_room))
        .route("/chat/rooms/:id/messages", get(chat::get_messages))
        .route("/chat/rooms/:id/read", put(chat::mark_room_read))
        .route("/chat/messages", post(chat::send_message))
        // Post routes
        .route("/posts", post(posts::create_post))
        .route("/posts/profile/:profile_id", get(posts::get_profile_posts))
        .route(
            "/posts/:id",
            get(posts::get_post).put(posts::update_post).delete(posts::delete_post),
        )
        .route("/posts/:id/reaction", post(posts::react))
        // Comment routes
        .route("/comments", post(comments::create_comment))
        .route(
            "/comments/:id",
            get(comments::get_comment)
                .put(comments::update_comment)
                .delete(comments::delete_comment),
        )
        // Push stream
        .route("/realtime", get(realtime::stream))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state, rate_limit::rate_limit_middleware))
        .layer(axum::Extension(rate_limiter))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health_check() -> &'static str {
    "OK"
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults() {
        let query = PageQuery::default();
        assert_eq!(query.resolve(20).unwrap(), (1, 20));

        let query = PageQuery { page: Some(3), per_page: Some(9) };
        assert_eq!(query.resolve(20).unwrap(), (3, 9));
    }

    #[test]
    fn test_page_query_rejects_zero() {
        let query = PageQuery { page: Some(0), per_page: None };
        assert!(matches!(query.resolve(10), Err(ApiError::BadRequest(_))));
        let query = PageQuery { page: None, per_page: Some(0) };
        assert!(matches!(query.resolve(10), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let (_dir, state) = test_support::seeded_state();
        let result = get_user_from_headers(&state, &HeaderMap::new());
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));

        let headers = test_support::auth_headers(&state, 3);
        assert_eq!(get_user_from_headers(&state, &headers).unwrap(), 3);
    }
}
