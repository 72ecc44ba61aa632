// ABOUTME: Wires every HTTP route plus CORS/rate-limit/panic-handling/tracing layers
// ABOUTME: grounded on packages/cli/src/lib.rs's create_router + CorsLayer wiring

use axum::{
    http::Method,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::Any, cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, files, mcp, sandboxes, users},
    middleware::{create_panic_handler, rate_limit::rate_limit_middleware, RateLimitConfig, RateLimitLayer},
    state::AppState,
};

pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origin);
    let rate_limiter = RateLimitLayer::new(RateLimitConfig::default());

    Router::new()
        .route("/api/register", post(auth::register))
        .route("/api/token", post(auth::issue_token))
        .route("/api/users/me", get(users::me))
        .route("/api/users/me/api-key", get(users::api_key))
        .route(
            "/api/users/me/api-key/regenerate",
            post(users::regenerate_api_key),
        )
        .route(
            "/api/users/me/sandboxes",
            get(sandboxes::list_sandboxes).post(sandboxes::create_sandbox),
        )
        .route(
            "/api/users/me/sandboxes/{id}",
            delete(sandboxes::delete_sandbox),
        )
        .route("/sandbox/file/{sandbox_id}/{*path}", get(files::fetch_file))
        .route("/sse", get(mcp::sse_connect))
        .route("/mcp/{session_id}", post(mcp::mcp_call))
        .layer(axum::middleware::from_fn(
            move |conn: axum::extract::ConnectInfo<std::net::SocketAddr>,
                  req: axum::extract::Request,
                  next: axum::middleware::Next| {
                let limiter = rate_limiter.clone();
                rate_limit_middleware(limiter, conn, req, next)
            },
        ))
        .layer(create_panic_handler())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(cors_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
    ]);

    if cors_origin == "*" {
        layer.allow_origin(Any).allow_headers(Any)
    } else if let Ok(origin) = cors_origin.parse::<axum::http::HeaderValue>() {
        layer.allow_origin(origin).allow_headers(Any)
    } else {
        layer.allow_origin(Any).allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::extract::ConnectInfo;
    use axum::http::StatusCode;
    use std::net::SocketAddr;
    use tower::ServiceExt;

    fn with_connect_info(mut request: axum::http::Request<axum::body::Body>) -> axum::http::Request<axum::body::Body> {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[tokio::test]
    async fn unauthenticated_me_is_rejected() {
        let (state, _tmp) = test_state().await;
        let app = create_router(state);
        let request = with_connect_info(
            axum::http::Request::builder()
                .uri("/api/users/me")
                .body(axum::body::Body::empty())
                .unwrap(),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn register_endpoint_is_reachable() {
        let (state, _tmp) = test_state().await;
        let app = create_router(state);
        let request = with_connect_info(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/register")
                .header("content-type", "application/json")
                .body(axum::body::Body::from(
                    serde_json::json!({
                        "username": "alice",
                        "email": "alice@example.com",
                        "password": "password123"
                    })
                    .to_string(),
                ))
                .unwrap(),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
