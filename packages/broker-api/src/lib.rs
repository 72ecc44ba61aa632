// ABOUTME: broker-api — the HTTP surface: axum router, auth, response envelope, SSE/MCP transport

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod sse;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::CurrentUser;
pub use response::ApiResponse;
pub use router::create_router;
pub use state::AppState;
