// ABOUTME: Shared application state handed to every handler via axum's State extractor

use std::sync::Arc;

use broker_coordinator::Coordinator;
use broker_core::BrokerConfig;
use broker_files::FilePublisher;
use broker_identity::IdentityStore;
use broker_mcp::McpSessionRegistry;

use crate::sse::SseConnectionTracker;

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<IdentityStore>,
    pub coordinator: Arc<Coordinator>,
    pub files: Arc<FilePublisher>,
    pub mcp_sessions: Arc<McpSessionRegistry>,
    pub config: BrokerConfig,
    pub sse_tracker: SseConnectionTracker,
}
