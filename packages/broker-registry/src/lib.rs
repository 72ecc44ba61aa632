// ABOUTME: broker-registry — the Sandbox Registry: durable sandbox-id/user/container-id mapping

pub mod error;
pub mod registry;

pub use error::{RegistryError, Result};
pub use registry::SandboxRegistry;
