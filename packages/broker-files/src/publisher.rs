// ABOUTME: File Publisher — owns {results_root}/{sandbox_id}/... on the host
// ABOUTME: atomic temp-file+rename writes, TTL-based pruning, content-type inference

use broker_core::PublishedFile;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{FilesError, Result};
use crate::path_safety::resolve_safe_path;

pub struct FilePublisher {
    results_root: PathBuf,
    file_ttl: Duration,
}

impl FilePublisher {
    pub fn new(results_root: impl Into<PathBuf>, file_ttl: Duration) -> Self {
        Self {
            results_root: results_root.into(),
            file_ttl,
        }
    }

    fn sandbox_root(&self, sandbox_id: &str) -> PathBuf {
        self.results_root.join(sandbox_id)
    }

    /// Writes `bytes` atomically (temp file + rename) and returns a
    /// `PublishedFile` whose URL is good for the file's lifetime.
    pub async fn publish(
        &self,
        sandbox_id: &str,
        relative_path: &str,
        bytes: Vec<u8>,
    ) -> Result<PublishedFile> {
        let sandbox_root = self.sandbox_root(sandbox_id);
        tokio::fs::create_dir_all(&sandbox_root).await?;

        let dest = resolve_safe_path(&sandbox_root, relative_path)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = dest.with_extension(format!(
            "{}.tmp-{}",
            dest.extension().and_then(|e| e.to_str()).unwrap_or(""),
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &dest).await?;

        debug!(sandbox_id = %sandbox_id, relative_path = %relative_path, "published file");

        Ok(PublishedFile {
            sandbox_id: sandbox_id.to_string(),
            relative_path: relative_path.to_string(),
            on_host_absolute_path: dest.to_string_lossy().into_owned(),
            created_at: Utc::now(),
        })
    }

    /// Reads a previously published file back out, with its inferred
    /// content type.
    pub async fn fetch(&self, sandbox_id: &str, relative_path: &str) -> Result<(Vec<u8>, &'static str)> {
        let sandbox_root = self.sandbox_root(sandbox_id);
        let path = resolve_safe_path(&sandbox_root, relative_path)?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| FilesError::NotFound(relative_path.to_string()))?;

        Ok((bytes, infer_content_type(&path)))
    }

    /// Deletes the whole sandbox subtree.
    pub async fn forget(&self, sandbox_id: &str) -> Result<()> {
        let sandbox_root = self.sandbox_root(sandbox_id);
        match tokio::fs::remove_dir_all(&sandbox_root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes every published file across all sandboxes older than
    /// `file_ttl`. Returns the number of files removed.
    pub async fn prune(&self) -> Result<usize> {
        if !self.results_root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut sandbox_dirs = tokio::fs::read_dir(&self.results_root).await?;
        while let Some(sandbox_entry) = sandbox_dirs.next_entry().await? {
            if !sandbox_entry.file_type().await?.is_dir() {
                continue;
            }
            removed += self.prune_sandbox_dir(&sandbox_entry.path()).await?;
        }
        if removed > 0 {
            info!(removed, "pruned expired published files");
        }
        Ok(removed)
    }

    async fn prune_sandbox_dir(&self, dir: &Path) -> Result<usize> {
        let mut removed = 0;
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                let metadata = match entry.metadata().await {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to stat file during prune");
                        continue;
                    }
                };
                let age = metadata
                    .modified()
                    .ok()
                    .and_then(|m| m.elapsed().ok())
                    .unwrap_or_default();
                if age > self.file_ttl {
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        warn!(path = %path.display(), error = %e, "failed to remove expired file");
                        continue;
                    }
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

fn infer_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("txt") | Some("log") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn publish_then_fetch_roundtrips() {
        let root = tempdir().unwrap();
        let publisher = FilePublisher::new(root.path(), Duration::from_secs(3600));
        let file = publisher
            .publish("sbx_1", "plot.png", b"fake-png".to_vec())
            .await
            .unwrap();
        assert_eq!(file.url(), "/sandbox/file/sbx_1/plot.png");

        let (bytes, content_type) = publisher.fetch("sbx_1", "plot.png").await.unwrap();
        assert_eq!(bytes, b"fake-png");
        assert_eq!(content_type, "image/png");
    }

    #[tokio::test]
    async fn fetch_missing_file_is_not_found() {
        let root = tempdir().unwrap();
        let publisher = FilePublisher::new(root.path(), Duration::from_secs(3600));
        let err = publisher.fetch("sbx_1", "missing.png").await.unwrap_err();
        assert!(matches!(err, FilesError::NotFound(_)));
    }

    #[tokio::test]
    async fn publish_rejects_path_traversal() {
        let root = tempdir().unwrap();
        let publisher = FilePublisher::new(root.path(), Duration::from_secs(3600));
        let err = publisher
            .publish("sbx_1", "../../etc/passwd", b"x".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, FilesError::BadPath(_)));
    }

    #[tokio::test]
    async fn forget_deletes_whole_subtree() {
        let root = tempdir().unwrap();
        let publisher = FilePublisher::new(root.path(), Duration::from_secs(3600));
        publisher
            .publish("sbx_1", "plot.png", b"data".to_vec())
            .await
            .unwrap();
        publisher.forget("sbx_1").await.unwrap();
        assert!(publisher.fetch("sbx_1", "plot.png").await.is_err());
    }

    #[tokio::test]
    async fn forget_missing_sandbox_is_not_an_error() {
        let root = tempdir().unwrap();
        let publisher = FilePublisher::new(root.path(), Duration::from_secs(3600));
        assert!(publisher.forget("sbx_never_existed").await.is_ok());
    }

    #[tokio::test]
    async fn prune_removes_files_older_than_ttl() {
        let root = tempdir().unwrap();
        let publisher = FilePublisher::new(root.path(), Duration::from_millis(50));
        publisher
            .publish("sbx_1", "plot.png", b"data".to_vec())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let removed = publisher.prune().await.unwrap();
        assert_eq!(removed, 1);
        assert!(publisher.fetch("sbx_1", "plot.png").await.is_err());
    }

    #[tokio::test]
    async fn prune_leaves_fresh_files_alone() {
        let root = tempdir().unwrap();
        let publisher = FilePublisher::new(root.path(), Duration::from_secs(3600));
        publisher
            .publish("sbx_1", "plot.png", b"data".to_vec())
            .await
            .unwrap();
        let removed = publisher.prune().await.unwrap();
        assert_eq!(removed, 0);
    }
}
