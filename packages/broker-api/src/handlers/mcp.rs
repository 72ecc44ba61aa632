// ABOUTME: GET /sse?api_key=... and POST /mcp/{session_id} — the MCP HTTP+SSE transport
// ABOUTME: /sse opens the event stream and announces the companion POST endpoint; the client
// ABOUTME: posts JSON-RPC requests to that endpoint and gets the JsonRpcResponse back directly

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    response::sse::Event,
    response::{IntoResponse, Response},
    Json,
};
use broker_core::BrokerError;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{
    response::ApiResponse,
    sse::{create_sse_event, create_sse_response, GuardedSseStream},
    state::AppState,
};

#[derive(Deserialize)]
pub struct SseQuery {
    pub api_key: String,
}

#[derive(serde::Serialize)]
struct EndpointAnnouncement {
    uri: String,
}

pub async fn sse_connect(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<SseQuery>,
) -> Result<Response, BrokerError> {
    let session = state
        .mcp_sessions
        .connect(&query.api_key, &state.identity, state.coordinator.clone())
        .await?;

    let guard = state
        .sse_tracker
        .try_acquire(addr.ip())
        .map_err(|_| BrokerError::conflict("too many concurrent SSE connections from this IP"))?;

    let session_id = session.id.clone();
    let endpoint_event = create_sse_event(
        "endpoint",
        &EndpointAnnouncement {
            uri: format!("/mcp/{session_id}"),
        },
    )
    .map_err(BrokerError::internal)?;

    info!(session_id = %session_id, "mcp sse session opened");

    let registry = state.mcp_sessions.clone();
    let body_stream = stream::once(async move { Ok::<Event, Infallible>(endpoint_event) })
        .chain(stream::pending::<Result<Event, Infallible>>());

    let guarded = GuardedSseStream::new(body_stream, guard, move || {
        tokio::spawn(async move {
            registry.disconnect(&session_id).await;
        });
    });

    Ok(create_sse_response(guarded).into_response())
}

pub async fn mcp_call(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<ApiResponse<Value>, BrokerError> {
    let session = state
        .mcp_sessions
        .get(&session_id)
        .await
        .ok_or_else(|| BrokerError::not_found("mcp session"))?;

    let response = session.handle(body).await;
    Ok(ApiResponse::new(
        serde_json::to_value(response).map_err(BrokerError::internal)?,
    ))
}
