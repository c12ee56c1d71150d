use std::time::Duration;

use axum::{
    extract::State,
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;

use kozosseg_types::PushEvent;

use super::{get_user_from_headers, ApiResult};
use crate::realtime::{ConnectionId, Hub};
use crate::state::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Unregisters the hub connection once the client goes away
struct ConnectionGuard {
    hub: Hub,
    user_id: i64,
    connection_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.hub.disconnect(self.user_id, self.connection_id);
    }
}

fn to_sse_event(event: PushEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.event_name()).json_data(&event)
}

/// GET /realtime - Server-sent events for the caller
pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let user_id = get_user_from_headers(&state, &headers)?;
    let (connection_id, rx) = state.hub.connect(user_id);
    tracing::info!("User {} opened a push stream", user_id);

    let guard = ConnectionGuard {
        hub: state.hub.clone(),
        user_id,
        connection_id,
    };

    let events = ReceiverStream::new(rx).map(move |event| {
        let _keep = &guard;
        to_sse_event(event)
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}
