// ABOUTME: Registration and token-issuance handlers: POST /api/register, POST /api/token

use axum::{extract::State, Form, Json};
use broker_core::BrokerError;
use serde::{Deserialize, Serialize};

use crate::{response::ApiResponse, state::AppState};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, BrokerError> {
    let user = state
        .identity
        .register(&req.username, &req.email, &req.password)
        .await?;
    Ok(ApiResponse::new(RegisterResponse {
        id: user.id,
        username: user.username,
        email: user.email,
    }))
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

pub async fn issue_token(
    State(state): State<AppState>,
    Form(req): Form<TokenRequest>,
) -> Result<ApiResponse<TokenResponse>, BrokerError> {
    let user = state
        .identity
        .verify_password(&req.username, &req.password)
        .await?;
    let access_token = broker_identity::token::issue(&user.id, &state.config.session_signing_key);
    Ok(ApiResponse::new(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}
