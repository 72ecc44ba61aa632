// ABOUTME: broker-tools — the Tool Surface: typed contracts shared by REST and MCP

pub mod catalog;
pub mod dispatch;
pub mod types;

pub use catalog::{catalog, Tool, ToolInputSchema, ToolInputSchemaProperty};
pub use dispatch::dispatch;
