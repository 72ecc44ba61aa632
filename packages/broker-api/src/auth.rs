// ABOUTME: Bearer-token auth extractor; resolves the session token to a real user identity
// ABOUTME: generalizes packages/projects/src/api/auth.rs's CurrentUser stub to real resolution

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use broker_core::{BrokerError, User};

use crate::state::AppState;

/// The caller of the current request, resolved from the `Authorization:
/// Bearer <token>` header via the Identity Store.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = BrokerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(BrokerError::NotAuthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(BrokerError::NotAuthorized)?;

        let user = state
            .identity
            .resolve_token(token, &state.config.session_signing_key)
            .await?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn whoami(CurrentUser(user): CurrentUser) -> String {
        user.id
    }

    #[tokio::test]
    async fn valid_bearer_token_resolves_to_the_signing_user() {
        let (state, _tmp) = test_state().await;
        let user = state
            .identity
            .register("alice", "alice@example.com", "password123")
            .await
            .unwrap();
        let token = broker_identity::token::issue(&user.id, &state.config.session_signing_key);

        let app = Router::new()
            .route("/whoami", get(whoami))
            .with_state(state);

        let request = Request::builder()
            .uri("/whoami")
            .header("Authorization", format!("Bearer {token}"))
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_authorization_header_is_rejected() {
        let (state, _tmp) = test_state().await;
        let app = Router::new()
            .route("/whoami", get(whoami))
            .with_state(state);

        let request = Request::builder()
            .uri("/whoami")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
