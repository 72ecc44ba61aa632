// ABOUTME: Execution Coordinator — the heart: per-sandbox locking, result-file diffing,
// ABOUTME: install-record lifecycle. Every public method authorizes, then serializes on the sandbox.

use broker_core::types::{InstallRecord, InstallStatus};
use broker_core::{BrokerError, Result, Sandbox, SandboxView};
use broker_driver::{ContainerDriver, DirEntry};
use broker_files::FilePublisher;
use broker_registry::SandboxRegistry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::install::InstallTable;
use crate::locks::SandboxLocks;

const RESULTS_DIR: &str = "/app/results";
const SCRIPT_PATH: &str = "/app/sandbox_script.py";
const PYTHON_INTERPRETER: &str = "python3";
const MKDIR_TIMEOUT: Duration = Duration::from_secs(10);
const TAIL_BYTES: usize = 4096;

#[derive(Debug, Clone)]
pub struct ExecuteCodeOutcome {
    pub stdout: String,
    pub stderr: String,
    pub file_links: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ExecuteTerminalOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub status: InstallStatus,
    pub record_id: String,
}

#[derive(Debug, Clone)]
pub struct InstallStatusOutcome {
    pub status: InstallStatus,
    pub stdout_tail: String,
    pub stderr_tail: String,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub path_in_container: String,
}

pub struct Coordinator {
    registry: Arc<SandboxRegistry>,
    driver: Arc<dyn ContainerDriver>,
    files: Arc<FilePublisher>,
    locks: SandboxLocks,
    installs: Arc<InstallTable>,
    exec_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        registry: Arc<SandboxRegistry>,
        driver: Arc<dyn ContainerDriver>,
        files: Arc<FilePublisher>,
        exec_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            driver,
            files,
            locks: SandboxLocks::new(),
            installs: Arc::new(InstallTable::new()),
            exec_timeout,
        }
    }

    fn authorize(sandbox: &Sandbox, user_id: &str) -> Result<()> {
        if sandbox.user_id != user_id {
            return Err(BrokerError::NotAuthorized);
        }
        Ok(())
    }

    pub async fn create_sandbox(&self, user_id: &str, name: Option<String>) -> Result<Sandbox> {
        let sandbox = self.registry.create(user_id, name).await?;

        let mkdir = vec!["mkdir".to_string(), "-p".to_string(), RESULTS_DIR.to_string()];
        if let Err(err) = self
            .driver
            .exec(&sandbox.container_id, mkdir, None, MKDIR_TIMEOUT)
            .await
        {
            warn!(
                sandbox_id = %sandbox.id,
                error = %err,
                "failed to prepare results directory, rolling back sandbox"
            );
            let _ = self.registry.delete(&sandbox.id).await;
            let _ = self.driver.remove(&sandbox.container_id, true).await;
            return Err(err.into());
        }

        info!(sandbox_id = %sandbox.id, "sandbox provisioned");
        Ok(sandbox)
    }

    pub async fn list_sandboxes(&self, user_id: &str) -> Result<Vec<SandboxView>> {
        let sandboxes = self.registry.list_by_user(user_id).await?;
        Ok(sandboxes.iter().map(SandboxView::from).collect())
    }

    pub async fn delete_sandbox(&self, user_id: &str, sandbox_id: &str) -> Result<()> {
        let _guard = self.locks.acquire(sandbox_id).await;
        let sandbox = self.registry.get(sandbox_id).await?;
        Self::authorize(&sandbox, user_id)?;

        if let Err(err) = self.driver.remove(&sandbox.container_id, true).await {
            if matches!(err, broker_driver::DriverError::NoSuchContainer(_)) {
                debug!(sandbox_id = %sandbox_id, "container already gone, continuing teardown");
            } else {
                return Err(err.into());
            }
        }

        self.registry.delete(sandbox_id).await?;
        self.files.forget(sandbox_id).await?;
        self.installs.drop_sandbox(sandbox_id).await;

        info!(sandbox_id = %sandbox_id, "sandbox deleted");
        Ok(())
    }

    pub async fn execute_code(
        &self,
        user_id: &str,
        sandbox_id: &str,
        code: &str,
    ) -> Result<ExecuteCodeOutcome> {
        let _guard = self.locks.acquire(sandbox_id).await;
        let sandbox = self.registry.get(sandbox_id).await?;
        Self::authorize(&sandbox, user_id)?;

        let baseline = self.driver.list_dir(&sandbox.container_id, RESULTS_DIR).await?;

        self.driver
            .copy_into(&sandbox.container_id, SCRIPT_PATH, code.as_bytes().to_vec())
            .await?;

        let argv = vec![PYTHON_INTERPRETER.to_string(), SCRIPT_PATH.to_string()];
        let output = self
            .driver
            .exec(&sandbox.container_id, argv, None, self.exec_timeout)
            .await?;

        let after = self.driver.list_dir(&sandbox.container_id, RESULTS_DIR).await?;
        let produced = diff_entries(&baseline, &after);

        let mut file_links = Vec::with_capacity(produced.len());
        for entry in produced {
            let container_path = format!("{RESULTS_DIR}/{}", entry.name);
            let bytes = self
                .driver
                .copy_out(&sandbox.container_id, &container_path)
                .await?;
            match self.files.publish(sandbox_id, &entry.name, bytes).await {
                Ok(published) => file_links.push(published.url()),
                Err(e) => warn!(
                    sandbox_id = %sandbox_id,
                    artifact = %entry.name,
                    error = %e,
                    "skipping artifact that failed to publish"
                ),
            }
        }

        self.registry.touch(sandbox_id).await?;

        Ok(ExecuteCodeOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            file_links,
        })
    }

    pub async fn execute_terminal(
        &self,
        user_id: &str,
        sandbox_id: &str,
        command: &str,
    ) -> Result<ExecuteTerminalOutcome> {
        let _guard = self.locks.acquire(sandbox_id).await;
        let sandbox = self.registry.get(sandbox_id).await?;
        Self::authorize(&sandbox, user_id)?;

        let argv = vec!["/bin/sh".to_string(), "-c".to_string(), command.to_string()];
        let output = self
            .driver
            .exec(&sandbox.container_id, argv, None, self.exec_timeout)
            .await?;

        self.registry.touch(sandbox_id).await?;

        Ok(ExecuteTerminalOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.exit_code,
        })
    }

    pub async fn install_package(
        &self,
        user_id: &str,
        sandbox_id: &str,
        package: &str,
    ) -> Result<InstallOutcome> {
        let container_id = {
            let _guard = self.locks.acquire(sandbox_id).await;
            let sandbox = self.registry.get(sandbox_id).await?;
            Self::authorize(&sandbox, user_id)?;
            sandbox.container_id
        };

        let (record, already_in_flight) = self.installs.start_or_join(sandbox_id, package).await;
        if already_in_flight {
            return Ok(InstallOutcome {
                status: record.status,
                record_id: record.record_id,
            });
        }

        spawn_install_job(
            self.driver.clone(),
            self.installs.clone(),
            container_id,
            sandbox_id.to_string(),
            package.to_string(),
            self.exec_timeout,
        );

        Ok(InstallOutcome {
            status: InstallStatus::Installing,
            record_id: record.record_id,
        })
    }

    pub async fn check_package_status(
        &self,
        user_id: &str,
        sandbox_id: &str,
        package: &str,
    ) -> Result<InstallStatusOutcome> {
        let sandbox = self.registry.get(sandbox_id).await?;
        Self::authorize(&sandbox, user_id)?;

        let record: InstallRecord = self
            .installs
            .get(sandbox_id, package)
            .await
            .ok_or_else(|| BrokerError::not_found(format!("install record for {package}")))?;

        Ok(InstallStatusOutcome {
            status: record.status,
            stdout_tail: record.stdout_tail,
            stderr_tail: record.stderr_tail,
        })
    }

    pub async fn upload_file(
        &self,
        user_id: &str,
        sandbox_id: &str,
        host_path: &str,
        dest_path: Option<&str>,
    ) -> Result<UploadOutcome> {
        let _guard = self.locks.acquire(sandbox_id).await;
        let sandbox = self.registry.get(sandbox_id).await?;
        Self::authorize(&sandbox, user_id)?;

        let bytes = tokio::fs::read(host_path)
            .await
            .map_err(|e| BrokerError::io(e.to_string()))?;

        let filename = Path::new(host_path)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BrokerError::invalid_argument("host_path has no file name"))?;

        let dest_dir = dest_path.unwrap_or(RESULTS_DIR).trim_end_matches('/');
        let container_path = format!("{dest_dir}/{filename}");

        self.driver
            .copy_into(&sandbox.container_id, &container_path, bytes)
            .await?;
        self.registry.touch(sandbox_id).await?;

        Ok(UploadOutcome {
            path_in_container: container_path,
        })
    }
}

fn diff_entries(baseline: &[DirEntry], after: &[DirEntry]) -> Vec<DirEntry> {
    let baseline_index: HashMap<&str, (i64, u64)> = baseline
        .iter()
        .map(|e| (e.name.as_str(), (e.mtime, e.size)))
        .collect();

    after
        .iter()
        .filter(|entry| {
            baseline_index
                .get(entry.name.as_str())
                .map(|(mtime, size)| *mtime != entry.mtime || *size != entry.size)
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

fn spawn_install_job(
    driver: Arc<dyn ContainerDriver>,
    installs: Arc<InstallTable>,
    container_id: String,
    sandbox_id: String,
    package: String,
    timeout: Duration,
) {
    tokio::spawn(async move {
        let argv = vec!["pip".to_string(), "install".to_string(), package.clone()];
        match driver.exec(&container_id, argv, None, timeout).await {
            Ok(output) if output.exit_code == 0 => {
                info!(sandbox_id = %sandbox_id, package = %package, "package install succeeded");
                installs
                    .finish(
                        &sandbox_id,
                        &package,
                        InstallStatus::Success,
                        tail(&output.stdout),
                        tail(&output.stderr),
                    )
                    .await;
            }
            Ok(output) => {
                warn!(sandbox_id = %sandbox_id, package = %package, exit_code = output.exit_code, "package install failed");
                installs
                    .finish(
                        &sandbox_id,
                        &package,
                        InstallStatus::Failed,
                        tail(&output.stdout),
                        tail(&output.stderr),
                    )
                    .await;
            }
            Err(err) => {
                warn!(sandbox_id = %sandbox_id, package = %package, error = %err, "package install exec failed");
                installs
                    .finish(
                        &sandbox_id,
                        &package,
                        InstallStatus::Failed,
                        String::new(),
                        err.to_string(),
                    )
                    .await;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_driver::mock::MockDriver;
    use sqlx::SqlitePool;
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (Coordinator, Arc<MockDriver>, TempDir) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        let driver = Arc::new(MockDriver::new());
        let registry = Arc::new(SandboxRegistry::new(pool, driver.clone()));
        registry.init_schema().await.unwrap();
        let results_root = tempdir().unwrap();
        let files = Arc::new(FilePublisher::new(
            results_root.path(),
            Duration::from_secs(3600),
        ));
        let coordinator = Coordinator::new(
            registry,
            driver.clone() as Arc<dyn ContainerDriver>,
            files,
            Duration::from_secs(5),
        );
        (coordinator, driver, results_root)
    }

    #[tokio::test]
    async fn create_sandbox_returns_an_owned_sandbox() {
        let (coordinator, _driver, _tmp) = setup().await;
        let sandbox = coordinator
            .create_sandbox("usr_1", Some("my-box".to_string()))
            .await
            .unwrap();
        assert_eq!(sandbox.user_id, "usr_1");
        assert_eq!(sandbox.name, "my-box");
    }

    #[tokio::test]
    async fn list_sandboxes_only_returns_the_caller_s_own() {
        let (coordinator, _driver, _tmp) = setup().await;
        coordinator.create_sandbox("usr_1", None).await.unwrap();
        coordinator.create_sandbox("usr_2", None).await.unwrap();
        let mine = coordinator.list_sandboxes("usr_1").await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn delete_sandbox_rejects_non_owner() {
        let (coordinator, _driver, _tmp) = setup().await;
        let sandbox = coordinator.create_sandbox("usr_1", None).await.unwrap();
        let err = coordinator
            .delete_sandbox("usr_2", &sandbox.id)
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::NotAuthorized));
    }

    #[tokio::test]
    async fn delete_sandbox_removes_registry_row() {
        let (coordinator, _driver, _tmp) = setup().await;
        let sandbox = coordinator.create_sandbox("usr_1", None).await.unwrap();
        coordinator.delete_sandbox("usr_1", &sandbox.id).await.unwrap();
        let err = coordinator
            .execute_terminal("usr_1", &sandbox.id, "echo hi")
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::NotFound(_)));
    }

    #[tokio::test]
    async fn execute_code_publishes_newly_produced_files() {
        let (coordinator, driver, _tmp) = setup().await;
        let sandbox = coordinator.create_sandbox("usr_1", None).await.unwrap();

        driver
            .copy_into(&sandbox.container_id, "/app/results/plot.png", b"png".to_vec())
            .await
            .unwrap();

        let outcome = coordinator
            .execute_code("usr_1", &sandbox.id, "print('hi')")
            .await
            .unwrap();

        assert_eq!(outcome.file_links.len(), 1);
        assert_eq!(outcome.file_links[0], "/sandbox/file/".to_string() + &sandbox.id + "/plot.png");
    }

    #[tokio::test]
    async fn execute_code_omits_an_artifact_whose_name_escapes_the_results_dir() {
        let (coordinator, driver, _tmp) = setup().await;
        let sandbox = coordinator.create_sandbox("usr_1", None).await.unwrap();

        driver
            .copy_into(&sandbox.container_id, "/app/results/plot.png", b"png".to_vec())
            .await
            .unwrap();
        driver
            .copy_into(
                &sandbox.container_id,
                "/app/results/../../etc/passwd",
                b"evil".to_vec(),
            )
            .await
            .unwrap();

        let outcome = coordinator
            .execute_code("usr_1", &sandbox.id, "print('hi')")
            .await
            .unwrap();

        // the well-behaved artifact still publishes and stdout/stderr still come back;
        // the path-escaping one is dropped rather than aborting the whole call
        assert_eq!(outcome.file_links.len(), 1);
        assert_eq!(
            outcome.file_links[0],
            "/sandbox/file/".to_string() + &sandbox.id + "/plot.png"
        );
    }

    #[tokio::test]
    async fn execute_code_does_not_republish_unchanged_files() {
        let (coordinator, driver, _tmp) = setup().await;
        let sandbox = coordinator.create_sandbox("usr_1", None).await.unwrap();

        driver
            .copy_into(&sandbox.container_id, "/app/results/notes.txt", b"a".to_vec())
            .await
            .unwrap();
        coordinator
            .execute_code("usr_1", &sandbox.id, "pass")
            .await
            .unwrap();

        // second run produces nothing new; baseline already includes notes.txt
        let outcome = coordinator
            .execute_code("usr_1", &sandbox.id, "pass")
            .await
            .unwrap();
        assert!(outcome.file_links.is_empty());
    }

    #[tokio::test]
    async fn install_package_second_call_joins_in_flight_job() {
        let (coordinator, _driver, _tmp) = setup().await;
        let sandbox = coordinator.create_sandbox("usr_1", None).await.unwrap();

        let first = coordinator
            .install_package("usr_1", &sandbox.id, "numpy")
            .await
            .unwrap();
        let second = coordinator
            .install_package("usr_1", &sandbox.id, "numpy")
            .await
            .unwrap();

        assert_eq!(first.record_id, second.record_id);
        assert_eq!(second.status, InstallStatus::Installing);
    }

    #[tokio::test]
    async fn check_package_status_reports_success_after_background_job_completes() {
        let (coordinator, _driver, _tmp) = setup().await;
        let sandbox = coordinator.create_sandbox("usr_1", None).await.unwrap();

        coordinator
            .install_package("usr_1", &sandbox.id, "numpy")
            .await
            .unwrap();

        // allow the spawned background install task to run to completion
        tokio::time::sleep(Duration::from_millis(50)).await;

        let status = coordinator
            .check_package_status("usr_1", &sandbox.id, "numpy")
            .await
            .unwrap();
        assert_eq!(status.status, InstallStatus::Success);
    }

    #[tokio::test]
    async fn check_package_status_missing_record_is_not_found() {
        let (coordinator, _driver, _tmp) = setup().await;
        let sandbox = coordinator.create_sandbox("usr_1", None).await.unwrap();
        let err = coordinator
            .check_package_status("usr_1", &sandbox.id, "never-installed")
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::NotFound(_)));
    }

    #[tokio::test]
    async fn upload_file_copies_host_bytes_into_the_container() {
        let (coordinator, driver, _tmp) = setup().await;
        let sandbox = coordinator.create_sandbox("usr_1", None).await.unwrap();

        let tmp = tempdir().unwrap();
        let host_file = tmp.path().join("data.csv");
        tokio::fs::write(&host_file, b"a,b,c").await.unwrap();

        let outcome = coordinator
            .upload_file("usr_1", &sandbox.id, host_file.to_str().unwrap(), None)
            .await
            .unwrap();
        assert_eq!(outcome.path_in_container, "/app/results/data.csv");

        let bytes = driver
            .copy_out(&sandbox.container_id, "/app/results/data.csv")
            .await
            .unwrap();
        assert_eq!(bytes, b"a,b,c");
    }
}
