//! Raw upload persistence.
//!
//! Every upload is written under `<uuid>_<sanitized basename>` so concurrent uploads of the same
//! name never collide and client-supplied paths cannot escape the upload directory.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Destination for raw upload bytes.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Write `data` under a unique name derived from `original_name`, returning its path.
    async fn save(&self, original_name: &str, data: &[u8]) -> io::Result<PathBuf>;
}

/// Stores uploads as files inside a single directory.
#[derive(Debug, Clone)]
pub struct DiskUploadStore {
    root: PathBuf,
}

impl DiskUploadStore {
    /// Use `root` as the upload directory; it is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory receiving uploads.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl UploadStore for DiskUploadStore {
    async fn save(&self, original_name: &str, data: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;
        let name = format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            sanitize_filename(original_name)
        );
        let path = self.root.join(name);
        tokio::fs::write(&path, data).await?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "Stored upload");
        Ok(path)
    }
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let basename = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = basename
        .replace("..", "")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
