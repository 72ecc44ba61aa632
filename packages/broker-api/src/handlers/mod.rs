pub mod auth;
pub mod files;
pub mod mcp;
pub mod sandboxes;
pub mod users;
