// ABOUTME: GET /api/users/me, GET /api/users/me/api-key, POST /api/users/me/api-key/regenerate

use axum::extract::State;
use broker_core::{BrokerError, PublicUser};
use serde::Serialize;

use crate::{auth::CurrentUser, response::ApiResponse, state::AppState};

pub async fn me(CurrentUser(user): CurrentUser) -> ApiResponse<PublicUser> {
    ApiResponse::new(user.public())
}

#[derive(Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
}

pub async fn api_key(CurrentUser(user): CurrentUser) -> ApiResponse<ApiKeyResponse> {
    ApiResponse::new(ApiKeyResponse {
        api_key: user.api_key,
    })
}

pub async fn regenerate_api_key(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse<ApiKeyResponse>, BrokerError> {
    let api_key = state.identity.regenerate_api_key(&user).await?;
    Ok(ApiResponse::new(ApiKeyResponse { api_key }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    async fn register(state: &AppState) -> broker_core::User {
        state
            .identity
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn me_reports_the_public_view() {
        let (state, _tmp) = test_state().await;
        let user = register(&state).await;
        let response = me(CurrentUser(user.clone())).await;
        assert_eq!(response.data.username, "alice");
        assert_eq!(response.data.id, user.id);
    }

    #[tokio::test]
    async fn api_key_reports_the_current_key() {
        let (state, _tmp) = test_state().await;
        let user = register(&state).await;
        let response = api_key(CurrentUser(user.clone())).await;
        assert_eq!(response.data.api_key, user.api_key);
    }

    #[tokio::test]
    async fn regenerate_api_key_changes_the_key() {
        let (state, _tmp) = test_state().await;
        let user = register(&state).await;
        let old_key = user.api_key.clone();
        let response = regenerate_api_key(State(state), CurrentUser(user))
            .await
            .unwrap();
        assert_ne!(response.data.api_key, old_key);
    }
}
