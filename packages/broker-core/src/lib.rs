// ABOUTME: broker-core — shared domain types, error taxonomy and configuration
// ABOUTME: every other broker-* crate depends on this one

pub mod config;
pub mod error;
pub mod types;

pub use config::BrokerConfig;
pub use error::{BrokerError, Result};
pub use types::{
    InstallRecord, InstallStatus, PublicUser, PublishedFile, Sandbox, SandboxView, User,
};
