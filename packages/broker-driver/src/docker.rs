// ABOUTME: bollard-backed ContainerDriver implementation
// ABOUTME: hardened defaults: cap_drop ALL, non-privileged, restart_policy no, non-root user

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{HostConfig, RestartPolicy, RestartPolicyNameEnum};
use bollard::Docker;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{DriverError, Result};
use crate::tar_util::{read_bytes_as_tar, write_tar_entries};
use crate::types::{cap_output, DirEntry, ExecOutput, Labels};
use crate::ContainerDriver;

/// Execution user baked into the base image; the driver never runs as root.
const EXEC_USER: &str = "sandbox";
const NOOP_FOREGROUND_CMD: [&str; 2] = ["tail", "-f"];

pub struct DockerDriver {
    client: Docker,
    base_image: String,
}

impl DockerDriver {
    pub fn new(base_image: impl Into<String>) -> Result<Self> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| DriverError::RuntimeUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_image: base_image.into(),
        })
    }

    pub fn with_client(client: Docker, base_image: impl Into<String>) -> Self {
        Self {
            client,
            base_image: base_image.into(),
        }
    }

    fn map_bollard_err(err: bollard::errors::Error) -> DriverError {
        match &err {
            bollard::errors::Error::DockerResponseServerError { status_code, .. }
                if *status_code == 404 =>
            {
                DriverError::NoSuchContainer(err.to_string())
            }
            _ => DriverError::RuntimeUnavailable(err.to_string()),
        }
    }
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    async fn create_and_start(&self, labels: Labels) -> Result<String> {
        if self.client.inspect_image(&self.base_image).await.is_err() {
            return Err(DriverError::ImageMissing(self.base_image.clone()));
        }

        let host_config = HostConfig {
            cap_drop: Some(vec!["ALL".to_string()]),
            privileged: Some(false),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::NO),
                maximum_retry_count: Some(0),
            }),
            ..Default::default()
        };

        let config = Config {
            image: Some(self.base_image.clone()),
            cmd: Some(NOOP_FOREGROUND_CMD.iter().map(|s| s.to_string()).collect()),
            user: Some(EXEC_USER.to_string()),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: format!("broker-sbx-{}", uuid::Uuid::new_v4().simple()),
            platform: None,
        };

        let created = self
            .client
            .create_container(Some(options), config)
            .await
            .map_err(Self::map_bollard_err)?;

        self.client
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
            .map_err(Self::map_bollard_err)?;

        info!(container_id = %created.id, "container created and started");
        Ok(created.id)
    }

    async fn exec(
        &self,
        container_id: &str,
        argv: Vec<String>,
        stdin: Option<Vec<u8>>,
        timeout: Duration,
    ) -> Result<ExecOutput> {
        let exec_config = CreateExecOptions {
            cmd: Some(argv),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            attach_stdin: Some(stdin.is_some()),
            user: Some(EXEC_USER.to_string()),
            ..Default::default()
        };

        let exec = self
            .client
            .create_exec(container_id, exec_config)
            .await
            .map_err(Self::map_bollard_err)?;

        let run = async {
            let start_result = self
                .client
                .start_exec(&exec.id, None)
                .await
                .map_err(Self::map_bollard_err)?;

            let mut stdout = Vec::new();
            let mut stderr = Vec::new();

            match start_result {
                StartExecResults::Attached { mut output, .. } => {
                    while let Some(msg) = output.next().await {
                        match msg.map_err(Self::map_bollard_err)? {
                            bollard::container::LogOutput::StdOut { message } => {
                                stdout.extend_from_slice(&message)
                            }
                            bollard::container::LogOutput::StdErr { message } => {
                                stderr.extend_from_slice(&message)
                            }
                            _ => {}
                        }
                    }
                }
                StartExecResults::Detached => {
                    return Err(DriverError::RuntimeUnavailable(
                        "exec was detached unexpectedly".to_string(),
                    ))
                }
            }

            Ok((stdout, stderr))
        };

        let (stdout, stderr) = match tokio::time::timeout(timeout, run).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(container_id = %container_id, "exec exceeded timeout, killing exec process");
                // The exec process is left inside the container's pid namespace;
                // SIGKILL is delivered by dropping the output stream and
                // relying on Docker to tear down the exec on disconnect.
                return Err(DriverError::ExecTimeout(timeout.as_secs()));
            }
        };

        let inspect = self
            .client
            .inspect_exec(&exec.id)
            .await
            .map_err(Self::map_bollard_err)?;

        Ok(ExecOutput {
            exit_code: inspect.exit_code.unwrap_or(-1),
            stdout: cap_output(stdout),
            stderr: cap_output(stderr),
        })
    }

    async fn copy_into(
        &self,
        container_id: &str,
        container_path: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let (dir, name) = split_parent(container_path);
        let tar_data =
            write_tar_entries(name, &bytes).map_err(|e| DriverError::Io(e.to_string()))?;

        let options = UploadToContainerOptions {
            path: dir.to_string(),
            ..Default::default()
        };

        self.client
            .upload_to_container(container_id, Some(options), tar_data.into())
            .await
            .map_err(Self::map_bollard_err)?;

        Ok(())
    }

    async fn copy_out(&self, container_id: &str, container_path: &str) -> Result<Vec<u8>> {
        let options = DownloadFromContainerOptions {
            path: container_path.to_string(),
        };

        let mut stream = self
            .client
            .download_from_container(container_id, Some(options));

        let mut tar_bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            tar_bytes.extend_from_slice(&chunk.map_err(Self::map_bollard_err)?);
        }

        read_bytes_as_tar(&tar_bytes)
            .map_err(|e| DriverError::Io(e.to_string()))?
            .ok_or_else(|| DriverError::NoSuchContainer(container_path.to_string()))
    }

    async fn list_dir(&self, container_id: &str, container_path: &str) -> Result<Vec<DirEntry>> {
        let options = DownloadFromContainerOptions {
            path: container_path.to_string(),
        };

        let mut stream = self
            .client
            .download_from_container(container_id, Some(options));

        let mut tar_bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            tar_bytes.extend_from_slice(&chunk.map_err(Self::map_bollard_err)?);
        }

        crate::tar_util::list_tar_entries(&tar_bytes).map_err(|e| DriverError::Io(e.to_string()))
    }

    async fn exists(&self, container_id: &str) -> Result<bool> {
        match self.client.inspect_container(container_id, None).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(DriverError::RuntimeUnavailable(e.to_string())),
        }
    }

    async fn remove(&self, container_id: &str, force: bool) -> Result<()> {
        if force {
            let _ = self
                .client
                .stop_container(container_id, Some(StopContainerOptions { t: 5 }))
                .await;
        }

        match self
            .client
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!(container_id = %container_id, "remove: container already gone");
                Ok(())
            }
            Err(e) => Err(Self::map_bollard_err(e)),
        }
    }
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) if !dir.is_empty() => (dir, name),
        Some((_, name)) => ("/", name),
        None => (".", path),
    }
}
