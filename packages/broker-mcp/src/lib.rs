// ABOUTME: broker-mcp — the Per-session MCP Multiplexer: one session per connected client,
// ABOUTME: bound to one user identity, JSON-RPC framed, dispatching through the Tool Surface

pub mod protocol;
pub mod registry;
pub mod session;

pub use protocol::{JsonRpcRequest, JsonRpcResponse};
pub use registry::McpSessionRegistry;
pub use session::McpSession;
