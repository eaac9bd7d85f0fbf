//! SSE channel-open and follow-up submission handlers.

use std::convert::Infallible;

use {
    axum::{
        Json,
        body::Bytes,
        extract::{Query, State},
        http::StatusCode,
        response::sse::{Event, Sse},
    },
    futures::{Stream, StreamExt},
    serde::Deserialize,
    serde_json::{Value, json},
    telegate_common::{BridgeError, ErrorKind},
    telegate_mcp::{ChannelEvent, RawPayload},
    tokio::sync::mpsc,
    tokio_stream::wrappers::ReceiverStream,
    tracing::debug,
};

use crate::{error::ApiError, server::AppState};

/// Frames buffered per session stream.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// `GET <sse_path>`: open a push channel. The first event is `endpoint`,
/// naming the URL follow-up submissions go to.
pub async fn open_channel(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (tx, rx) = mpsc::channel::<ChannelEvent>(CHANNEL_CAPACITY);
    let session_id = state
        .registry
        .open(tx, query.session_id.as_deref())
        .await?;
    debug!(session_id = %session_id, "SSE stream attached");

    let stream = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(render_event(event)));
    Ok(Sse::new(stream))
}

/// `POST <message_path>?sessionId=<id>`: accept one envelope. The response
/// only acknowledges; the JSON-RPC result is pushed on the session's stream.
pub async fn submit_message(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let session_id = query
        .session_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            BridgeError::new(ErrorKind::SessionNotFound, "missing sessionId query parameter")
        })?;

    let ack = state
        .registry
        .route(&session_id, RawPayload::Bytes(body.to_vec()))
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "accepted",
            "sessionId": ack.session_id,
            "id": ack.request_id,
        })),
    ))
}

fn render_event(event: ChannelEvent) -> Event {
    match event {
        ChannelEvent::Endpoint(url) => Event::default().event("endpoint").data(url),
        ChannelEvent::Message(frame) => Event::default().event("message").data(frame),
        ChannelEvent::Keepalive => Event::default().comment("keepalive"),
    }
}
