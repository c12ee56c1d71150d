use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::api::error::ApiError;
use crate::api::SESSION_HEADER;
use crate::state::AppState;

/// Bucket for requests whose peer address is unknown
const UNKNOWN_CLIENT_BUCKET: &str = "ip:unknown";

/// Simple in-memory rate limiter
/// Tracks requests per client in fixed windows
#[derive(Clone)]
pub struct RateLimiter {
    // Map of bucket -> (request_count, window_start)
    state: Arc<Mutex<HashMap<String, (u32, Instant)>>>,
    max_requests: u32,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_duration: Duration::from_secs(window_seconds),
        }
    }

    /// Count a request against `key`; errors with a retry hint once the window is full
    pub fn check_rate_limit(&self, key: &str) -> Result<(), String> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();

        if state.len() > 10000 {
            state.retain(|_, (_, start)| now.duration_since(*start) < self.window_duration * 2);
        }

        match state.get_mut(key) {
            Some((count, window_start)) => {
                if now.duration_since(*window_start) < self.window_duration {
                    if *count >= self.max_requests {
                        let remaining = self.window_duration - now.duration_since(*window_start);
                        return Err(format!(
                            "Rate limit exceeded. Try again in {} seconds.",
                            remaining.as_secs()
                        ));
                    }
                    *count += 1;
                } else {
                    *window_start = now;
                    *count = 1;
                }
            }
            None => {
                state.insert(key.to_string(), (1, now));
            }
        }

        Ok(())
    }
}

/// Bucket for a request: the user behind a valid session token, otherwise
/// the peer address. Unknown tokens fall back to the address so that made-up
/// tokens never get a fresh window.
pub fn client_key(state: &AppState, request: &Request) -> String {
    let user_id = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|token| state.get_authenticated_user_id_from_token(token));
    if let Some(user_id) = user_id {
        return format!("user:{}", user_id);
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => UNKNOWN_CLIENT_BUCKET.to_string(),
    }
}

/// Middleware to apply rate limiting to all requests
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    axum::Extension(limiter): axum::Extension<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&state, &request);

    if let Err(msg) = limiter.check_rate_limit(&key) {
        tracing::warn!("Rate limit hit for {}", key);
        return ApiError::TooManyRequests(msg).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::seeded_state;
    use axum::body::Body;

    fn request_from(addr: &str, token: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/notifications");
        if let Some(token) = token {
            builder = builder.header(SESSION_HEADER, token);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_client_key_uses_validated_session() {
        let (_dir, state) = seeded_state();
        let token = state.session_manager.create_session(2).unwrap();

        assert_eq!(client_key(&state, &request_from("10.0.0.1:5000", Some(&token))), "user:2");
        // same user from another address shares the bucket
        assert_eq!(client_key(&state, &request_from("10.0.0.9:6000", Some(&token))), "user:2");
    }

    #[test]
    fn test_client_key_falls_back_to_address() {
        let (_dir, state) = seeded_state();

        assert_eq!(client_key(&state, &request_from("10.0.0.1:5000", None)), "ip:10.0.0.1");
        assert_eq!(
            client_key(&state, &request_from("10.0.0.1:5001", Some("kitalalt-token"))),
            "ip:10.0.0.1"
        );
        assert_eq!(client_key(&state, &request_from("10.0.0.2:5000", None)), "ip:10.0.0.2");

        let no_peer = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(client_key(&state, &no_peer), UNKNOWN_CLIENT_BUCKET);
    }

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(3, 60);
        for _ in 0..3 {
            assert!(limiter.check_rate_limit("token-a").is_ok());
        }
        let err = limiter.check_rate_limit("token-a").unwrap_err();
        assert!(err.contains("Rate limit exceeded"));
    }

    #[test]
    fn test_buckets_are_independent() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.check_rate_limit("token-a").is_ok());
        assert!(limiter.check_rate_limit("token-b").is_ok());
        assert!(limiter.check_rate_limit("token-a").is_err());
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(1, 0);
        assert!(limiter.check_rate_limit("token-a").is_ok());
        // a zero-length window is always expired
        assert!(limiter.check_rate_limit("token-a").is_ok());
    }
}
