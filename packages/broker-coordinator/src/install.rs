// ABOUTME: In-memory Install Record table, keyed by (sandbox_id, package)
// ABOUTME: guarded by its own RwLock, independent of the per-sandbox exec lock (see locks.rs)

use broker_core::types::{InstallRecord, InstallStatus};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

type Key = (String, String);

/// Tracks one install attempt per (sandbox, package) pair. Brief read/write
/// locks only — the long-running `exec` call that actually performs the
/// install never holds this lock.
#[derive(Default)]
pub struct InstallTable {
    records: RwLock<HashMap<Key, InstallRecord>>,
}

impl InstallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing in-flight record for (sandbox, package) if one
    /// is still `installing`, otherwise mints and stores a fresh one.
    /// Returns `(record, already_in_flight)`.
    pub async fn start_or_join(&self, sandbox_id: &str, package: &str) -> (InstallRecord, bool) {
        let key = (sandbox_id.to_string(), package.to_string());
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(&key) {
            if existing.status == InstallStatus::Installing {
                return (existing.clone(), true);
            }
        }
        let record = InstallRecord {
            record_id: format!("ins_{}", Uuid::new_v4().simple()),
            sandbox_id: sandbox_id.to_string(),
            package: package.to_string(),
            status: InstallStatus::Installing,
            started_at: Utc::now(),
            finished_at: None,
            stdout_tail: String::new(),
            stderr_tail: String::new(),
        };
        records.insert(key, record.clone());
        (record, false)
    }

    pub async fn finish(
        &self,
        sandbox_id: &str,
        package: &str,
        status: InstallStatus,
        stdout_tail: String,
        stderr_tail: String,
    ) {
        let key = (sandbox_id.to_string(), package.to_string());
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&key) {
            record.status = status;
            record.finished_at = Some(Utc::now());
            record.stdout_tail = stdout_tail;
            record.stderr_tail = stderr_tail;
        }
    }

    pub async fn get(&self, sandbox_id: &str, package: &str) -> Option<InstallRecord> {
        let key = (sandbox_id.to_string(), package.to_string());
        self.records.read().await.get(&key).cloned()
    }

    /// Drops every record belonging to `sandbox_id`. Called when a sandbox
    /// is deleted or reaped.
    pub async fn drop_sandbox(&self, sandbox_id: &str) {
        let mut records = self.records.write().await;
        records.retain(|(sbx, _), _| sbx != sandbox_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_request_joins_in_flight_install() {
        let table = InstallTable::new();
        let (first, joined_first) = table.start_or_join("sbx_1", "numpy").await;
        assert!(!joined_first);
        let (second, joined_second) = table.start_or_join("sbx_1", "numpy").await;
        assert!(joined_second);
        assert_eq!(first.record_id, second.record_id);
    }

    #[tokio::test]
    async fn finished_install_allows_a_fresh_attempt() {
        let table = InstallTable::new();
        let (first, _) = table.start_or_join("sbx_1", "numpy").await;
        table
            .finish("sbx_1", "numpy", InstallStatus::Success, "ok".into(), "".into())
            .await;
        let (second, joined) = table.start_or_join("sbx_1", "numpy").await;
        assert!(!joined);
        assert_ne!(first.record_id, second.record_id);
    }

    #[tokio::test]
    async fn drop_sandbox_removes_only_its_own_records() {
        let table = InstallTable::new();
        table.start_or_join("sbx_1", "numpy").await;
        table.start_or_join("sbx_2", "pandas").await;
        table.drop_sandbox("sbx_1").await;
        assert!(table.get("sbx_1", "numpy").await.is_none());
        assert!(table.get("sbx_2", "pandas").await.is_some());
    }
}
