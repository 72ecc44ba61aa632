// ABOUTME: ContainerDriver — the capability surface every Coordinator operation sits on top of
// ABOUTME: mirrors packages/sandbox's Provider trait shape, narrowed to what the broker needs

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{DirEntry, ExecOutput, Labels};

/// Thin capability surface over the host container runtime. No caller outside
/// this crate may name the runtime directly — every container-specific
/// concept (images, exec, tar archives) is private to implementations of
/// this trait.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    /// Clones the configured base image into a freshly started container
    /// running a no-op foreground command, as a non-root user. Returns the
    /// runtime's container id.
    async fn create_and_start(&self, labels: Labels) -> Result<String>;

    /// Runs `argv` inside the container, capped at `timeout`. On timeout the
    /// exec process is SIGKILLed inside the container and
    /// `DriverError::ExecTimeout` is returned; the container itself stays
    /// alive.
    async fn exec(
        &self,
        container_id: &str,
        argv: Vec<String>,
        stdin: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<ExecOutput>;

    /// Writes `bytes` to `container_path` inside the container.
    async fn copy_into(&self, container_id: &str, container_path: &str, bytes: Vec<u8>)
        -> Result<()>;

    /// Reads `container_path` back out as bytes. Fails with
    /// `DriverError::NoSuchContainer`-shaped not-found semantics if the path
    /// doesn't exist.
    async fn copy_out(&self, container_id: &str, container_path: &str) -> Result<Vec<u8>>;

    /// Lists the immediate contents of a directory inside the container.
    async fn list_dir(&self, container_id: &str, container_path: &str) -> Result<Vec<DirEntry>>;

    /// Whether the runtime still knows about this container.
    async fn exists(&self, container_id: &str) -> Result<bool>;

    /// Removes the container. `force` stops it first if still running.
    async fn remove(&self, container_id: &str, force: bool) -> Result<()>;
}
