// ABOUTME: GET/POST /api/users/me/sandboxes, DELETE /api/users/me/sandboxes/{id}
// ABOUTME: all three route through broker_tools::dispatch, the same chokepoint the MCP transport uses

use axum::extract::{Path, State};
use broker_core::BrokerError;
use broker_tools::types::{
    CreateSandboxRequest, CreateSandboxResponse, DeleteSandboxRequest, DeleteSandboxResponse,
    ListSandboxesResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{auth::CurrentUser, response::ApiResponse, state::AppState};

#[derive(Deserialize, Default)]
pub struct CreateSandboxBody {
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct SandboxCreatedResponse {
    pub id: String,
    pub name: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn create_sandbox(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: Option<axum::Json<CreateSandboxBody>>,
) -> Result<ApiResponse<SandboxCreatedResponse>, BrokerError> {
    let name = body.and_then(|b| b.0.name);

    let created: CreateSandboxResponse = dispatch_as(
        "create_sandbox",
        json!(CreateSandboxRequest { name: name.clone() }),
        &user.id,
        &state,
    )
    .await?;

    let listed: ListSandboxesResponse =
        dispatch_as("list_sandboxes", Value::Null, &user.id, &state).await?;
    let summary = listed
        .sandboxes
        .into_iter()
        .find(|s| s.id == created.id)
        .ok_or_else(|| BrokerError::not_found("sandbox"))?;

    Ok(ApiResponse::new(SandboxCreatedResponse {
        id: summary.id,
        name: Some(summary.name),
        created_at: summary.created_at,
    }))
}

pub async fn list_sandboxes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse<ListSandboxesResponse>, BrokerError> {
    let listed: ListSandboxesResponse =
        dispatch_as("list_sandboxes", Value::Null, &user.id, &state).await?;
    Ok(ApiResponse::new(listed))
}

pub async fn delete_sandbox(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<DeleteSandboxResponse>, BrokerError> {
    let deleted: DeleteSandboxResponse = dispatch_as(
        "delete_sandbox",
        json!(DeleteSandboxRequest { id }),
        &user.id,
        &state,
    )
    .await?;
    Ok(ApiResponse::new(deleted))
}

async fn dispatch_as<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Value,
    user_id: &str,
    state: &AppState,
) -> Result<T, BrokerError> {
    let value = broker_tools::dispatch(tool_name, arguments, user_id, &state.coordinator).await?;
    serde_json::from_value(value).map_err(|e| BrokerError::internal(e))
}
