// ABOUTME: GET /sandbox/file/{sandbox_id}/{*path} — capability URL, no auth, serves published files

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use broker_core::BrokerError;

use crate::state::AppState;

pub async fn fetch_file(
    State(state): State<AppState>,
    Path((sandbox_id, path)): Path<(String, String)>,
) -> Result<Response, BrokerError> {
    let (bytes, content_type) = state.files.fetch(&sandbox_id, &path).await?;
    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Bytes::from(bytes),
    )
        .into_response())
}
