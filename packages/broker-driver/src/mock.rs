// ABOUTME: In-memory ContainerDriver for tests, mirroring MockProvider in packages/sandbox/src/manager.rs
// ABOUTME: never talks to a real runtime; lets coordinator/registry/reaper tests run without Docker

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::error::{DriverError, Result};
use crate::types::{DirEntry, ExecOutput, Labels};
use crate::ContainerDriver;

#[derive(Default)]
struct MockContainer {
    files: HashMap<String, Vec<u8>>,
    removed: bool,
}

/// A fake Container Driver backed by an in-memory map instead of a real
/// runtime. `exec_hook` lets tests script what a given argv returns without
/// spawning a process.
pub struct MockDriver {
    containers: RwLock<HashMap<String, MockContainer>>,
    counter: AtomicU64,
    pub exec_hook: Arc<dyn Fn(&str, &[String]) -> ExecOutput + Send + Sync>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(0),
            exec_hook: Arc::new(|_container_id, _argv| ExecOutput {
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
            }),
        }
    }

    pub fn with_exec_hook(
        hook: impl Fn(&str, &[String]) -> ExecOutput + Send + Sync + 'static,
    ) -> Self {
        Self {
            exec_hook: Arc::new(hook),
            ..Self::new()
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerDriver for MockDriver {
    async fn create_and_start(&self, _labels: Labels) -> Result<String> {
        let id = format!(
            "mock-container-{}",
            self.counter.fetch_add(1, Ordering::SeqCst)
        );
        self.containers
            .write()
            .await
            .insert(id.clone(), MockContainer::default());
        Ok(id)
    }

    async fn exec(
        &self,
        container_id: &str,
        argv: Vec<String>,
        _stdin: Option<Vec<u8>>,
        _timeout: Duration,
    ) -> Result<ExecOutput> {
        self.require_live(container_id).await?;
        Ok((self.exec_hook)(container_id, &argv))
    }

    async fn copy_into(
        &self,
        container_id: &str,
        container_path: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let mut containers = self.containers.write().await;
        let container = containers
            .get_mut(container_id)
            .filter(|c| !c.removed)
            .ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))?;
        container.files.insert(container_path.to_string(), bytes);
        Ok(())
    }

    async fn copy_out(&self, container_id: &str, container_path: &str) -> Result<Vec<u8>> {
        let containers = self.containers.read().await;
        let container = containers
            .get(container_id)
            .filter(|c| !c.removed)
            .ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))?;
        container
            .files
            .get(container_path)
            .cloned()
            .ok_or_else(|| DriverError::NoSuchContainer(container_path.to_string()))
    }

    async fn list_dir(&self, container_id: &str, container_path: &str) -> Result<Vec<DirEntry>> {
        let containers = self.containers.read().await;
        let container = containers
            .get(container_id)
            .filter(|c| !c.removed)
            .ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))?;
        let prefix = format!("{}/", container_path.trim_end_matches('/'));
        Ok(container
            .files
            .iter()
            .filter(|(path, _)| path.starts_with(&prefix))
            .map(|(path, bytes)| DirEntry {
                name: path.trim_start_matches(&prefix).to_string(),
                size: bytes.len() as u64,
                mtime: 0,
            })
            .collect())
    }

    async fn exists(&self, container_id: &str) -> Result<bool> {
        let containers = self.containers.read().await;
        Ok(containers.get(container_id).is_some_and(|c| !c.removed))
    }

    async fn remove(&self, container_id: &str, _force: bool) -> Result<()> {
        let mut containers = self.containers.write().await;
        if let Some(container) = containers.get_mut(container_id) {
            container.removed = true;
        }
        Ok(())
    }
}

impl MockDriver {
    async fn require_live(&self, container_id: &str) -> Result<()> {
        let containers = self.containers.read().await;
        if containers.get(container_id).is_some_and(|c| !c.removed) {
            Ok(())
        } else {
            Err(DriverError::NoSuchContainer(container_id.to_string()))
        }
    }
}
