// ABOUTME: Reaper — periodic idle-sandbox teardown, published-file pruning, I1 reconciliation
// ABOUTME: start/stop via a running flag, mirroring packages/sandbox's HealthChecker/ResourceMonitor loops

use broker_coordinator::Coordinator;
use broker_driver::ContainerDriver;
use broker_files::FilePublisher;
use broker_registry::SandboxRegistry;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time;
use tracing::{debug, error, info, warn};

pub struct Reaper {
    registry: Arc<SandboxRegistry>,
    driver: Arc<dyn ContainerDriver>,
    files: Arc<FilePublisher>,
    coordinator: Arc<Coordinator>,
    inactivity_threshold: Duration,
    tick_interval: Duration,
    running: Arc<RwLock<bool>>,
}

impl Reaper {
    pub fn new(
        registry: Arc<SandboxRegistry>,
        driver: Arc<dyn ContainerDriver>,
        files: Arc<FilePublisher>,
        coordinator: Arc<Coordinator>,
        inactivity_threshold: Duration,
        tick_interval: Duration,
    ) -> Self {
        Self {
            registry,
            driver,
            files,
            coordinator,
            inactivity_threshold,
            tick_interval,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Verifies I1 once before the periodic loop starts, so a broker
    /// restarted after an out-of-band container loss doesn't wait a full
    /// tick before the inconsistency is caught.
    pub async fn reconcile_on_startup(&self) -> broker_core::Result<()> {
        info!("reaper: reconciling registry against container runtime at startup");
        self.verify_i1().await
    }

    /// Spawns the periodic tick loop. Idempotent — calling twice while
    /// already running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                return;
            }
            *running = true;
        }

        let this = self.clone();
        tokio::spawn(async move {
            info!("reaper started");
            loop {
                if !*this.running.read().await {
                    info!("reaper stopped");
                    break;
                }
                if let Err(err) = this.tick().await {
                    error!(error = %err, "reaper tick failed");
                }
                time::sleep(this.tick_interval).await;
            }
        });
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    /// Runs one full tick: reap idle sandboxes, prune expired files, verify I1.
    pub async fn tick(&self) -> broker_core::Result<()> {
        let sandboxes = self.registry.list_all().await?;
        let now = Utc::now();

        for sandbox in sandboxes {
            let idle_for = now.signed_duration_since(sandbox.last_used_at);
            let threshold = chrono::Duration::from_std(self.inactivity_threshold)
                .unwrap_or(chrono::Duration::zero());
            if idle_for <= threshold {
                continue;
            }

            match self.coordinator.delete_sandbox(&sandbox.user_id, &sandbox.id).await {
                Ok(()) => info!(sandbox_id = %sandbox.id, "reaped idle sandbox"),
                Err(err) => warn!(
                    sandbox_id = %sandbox.id,
                    error = %err,
                    "failed to reap idle sandbox, will retry next tick"
                ),
            }
        }

        let pruned = self.files.prune().await?;
        debug!(pruned, "reaper pruned expired published files");

        self.verify_i1().await?;

        Ok(())
    }

    /// For each registry row, confirms the Container Driver still knows
    /// about its container; drops the row and its files if not.
    async fn verify_i1(&self) -> broker_core::Result<()> {
        let sandboxes = self.registry.list_all().await?;
        for sandbox in sandboxes {
            match self.driver.exists(&sandbox.container_id).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        sandbox_id = %sandbox.id,
                        container_id = %sandbox.container_id,
                        "I1 violated: container missing out-of-band, dropping registry row"
                    );
                    self.registry.delete(&sandbox.id).await?;
                    self.files.forget(&sandbox.id).await?;
                }
                Err(err) => {
                    warn!(sandbox_id = %sandbox.id, error = %err, "failed to verify container existence");
                }
            }
        }
        Ok(())
    }
}
