//! Job manifests
//!
//! A [`JobManifest`] is the ordered list of files one export produced, the
//! final archive included. It is persisted as a pretty-printed JSON sidecar
//! next to the archive so it can be read without the live process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{ArchivalError, Result};

/// One produced file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub start: DateTime<Local>,
    pub end: Option<DateTime<Local>>,
    /// Milliseconds between `start` and `end`.
    pub elapsed_ms: u64,
    pub path: PathBuf,
    pub size: u64,
    pub compressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArtifactDescriptor {
    /// Start tracking a file that is about to be written.
    pub fn begin(path: impl Into<PathBuf>) -> Self {
        Self {
            start: Local::now(),
            end: None,
            elapsed_ms: 0,
            path: path.into(),
            size: 0,
            compressed: false,
            error: None,
        }
    }

    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Stamp the end time and size.
    pub fn finish(&mut self, size: u64) {
        let end = Local::now();
        self.elapsed_ms = (end - self.start).num_milliseconds().max(0) as u64;
        self.end = Some(end);
        self.size = size;
    }

    /// Stamp the end time and record why the file is unusable.
    pub fn fail(&mut self, error: impl ToString) {
        self.finish(self.size);
        self.error = Some(error.to_string());
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }
}

/// Ordered record of every artifact of one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobManifest {
    pub entries: Vec<ArtifactDescriptor>,
}

impl JobManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ArtifactDescriptor) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First recorded error, if any entry failed.
    pub fn first_error(&self) -> Option<&str> {
        self.entries.iter().find_map(|e| e.error.as_deref())
    }

    /// Human-readable rendering written to the sidecar.
    pub fn render(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ArchivalError::Manifest(format!("Failed to render manifest: {}", e)).into())
    }

    /// Sidecar location for an archive: `<archive>.txt`.
    pub fn sidecar_path(archive: &Path) -> PathBuf {
        let mut name = archive.as_os_str().to_owned();
        name.push(".txt");
        PathBuf::from(name)
    }

    /// Write the manifest to `path`.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let body = self.render()?;
        tokio::fs::write(path, body).await.map_err(|e| {
            ArchivalError::Manifest(format!("Failed to write {}: {}", path.display(), e)).into()
        })
    }

    /// Read a previously persisted manifest.
    pub async fn load(path: &Path) -> Result<Self> {
        let body = tokio::fs::read_to_string(path).await.map_err(|e| {
            ArchivalError::Manifest(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&body).map_err(|e| {
            ArchivalError::Manifest(format!("Invalid manifest {}: {}", path.display(), e)).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sidecar_path() {
        let sidecar = JobManifest::sidecar_path(Path::new("/tmp/shop-sql-1.zip"));
        assert_eq!(sidecar, PathBuf::from("/tmp/shop-sql-1.zip.txt"));
    }

    #[test]
    fn test_descriptor_finish_and_fail() {
        let mut ok = ArtifactDescriptor::begin("/tmp/a.sql");
        ok.finish(42);
        assert_eq!(ok.size, 42);
        assert!(ok.end.unwrap() >= ok.start);
        assert!(ok.error.is_none());

        let mut bad = ArtifactDescriptor::begin("/tmp/b.sql");
        bad.fail("exit status 2");
        assert_eq!(bad.error.as_deref(), Some("exit status 2"));
        assert!(bad.end.is_some());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let mut manifest = JobManifest::new();
        let mut entry = ArtifactDescriptor::begin(tmp.path().join("a.sql"));
        entry.finish(10);
        manifest.push(entry);
        let mut archive = ArtifactDescriptor::begin(tmp.path().join("a.zip")).compressed();
        archive.finish(5);
        manifest.push(archive);

        let path = tmp.path().join("a.zip.txt");
        manifest.save(&path).await.unwrap();
        let loaded = JobManifest::load(&path).await.unwrap();
        assert_eq!(loaded, manifest);
        assert!(loaded.entries[1].compressed);
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.txt");
        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(JobManifest::load(&path).await.is_err());
    }
}
