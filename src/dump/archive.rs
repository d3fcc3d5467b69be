//! Archival finalization
//!
//! Wraps the artifact files of a finished job into one zip archive, removes
//! the originals, appends the archive to the manifest and persists the
//! manifest sidecar. When compression fails nothing is removed and no
//! sidecar is written.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::error::{ArchivalError, FilesystemError, Result};
use crate::utils::fs::file_size;

use super::manifest::{ArtifactDescriptor, JobManifest};
use super::registry::JobHandle;

/// Outcome of a successful finalization.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub archive: PathBuf,
    pub sidecar: PathBuf,
    pub size: u64,
}

/// Compresses a job's artifacts into a single archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchivalFinalizer;

impl ArchivalFinalizer {
    pub fn new() -> Self {
        Self
    }

    /// Archive `files` into `archive`, in order.
    ///
    /// The manifest entries of `job` are expected to already describe every
    /// input file; the archive entry is appended last.
    pub async fn finalize(&self, files: &[PathBuf], archive: &Path, job: &JobHandle) -> Result<ArchiveOutcome> {
        let mut entry = ArtifactDescriptor::begin(archive).compressed();

        let inputs = files.to_vec();
        let target = archive.to_path_buf();
        let written = tokio::task::spawn_blocking(move || write_zip(&inputs, &target))
            .await
            .map_err(|e| ArchivalError::Compression(format!("archive task failed: {}", e)))?;
        if let Err(e) = written {
            // drop the partial archive, keep the inputs
            let _ = tokio::fs::remove_file(archive).await;
            return Err(e);
        }
        info!("Created archive {} from {} file(s)", archive.display(), files.len());

        for file in files {
            if let Err(e) = tokio::fs::remove_file(file).await {
                warn!("{}", FilesystemError::remove(file, e));
            }
        }

        match file_size(archive).await {
            Ok(size) => entry.finish(size),
            Err(e) => entry.fail(e),
        }
        let size = entry.size;
        job.record(entry);

        let sidecar = JobManifest::sidecar_path(archive);
        job.manifest().save(&sidecar).await?;
        debug!("Wrote manifest {}", sidecar.display());

        Ok(ArchiveOutcome {
            archive: archive.to_path_buf(),
            sidecar,
            size,
        })
    }
}

/// Blocking zip writer; entries are stored under their file names.
fn write_zip(files: &[PathBuf], archive: &Path) -> Result<()> {
    let out = File::create(archive).map_err(compression)?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| compression(format!("not a file: {}", path.display())))?;
        let input = File::open(path).map_err(|e| compression(format!("{}: {}", path.display(), e)))?;

        zip.start_file(name, options).map_err(compression)?;
        std::io::copy(&mut BufReader::new(input), &mut zip).map_err(compression)?;
    }

    zip.finish().map_err(compression)?;
    Ok(())
}

fn compression(err: impl std::fmt::Display) -> ArchivalError {
    ArchivalError::Compression(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::fingerprint::Fingerprint;
    use crate::dump::request::{ConnectionParams, DumpRequest};
    use std::io::Read;

    fn job() -> JobHandle {
        let conn = ConnectionParams::from_address("localhost", "root", "", "utf8", "shop");
        JobHandle::new(Fingerprint::of(&DumpRequest::new(conn, vec!["users".into()])))
    }

    #[tokio::test]
    async fn test_archives_and_removes_originals() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("shop-struct.sql");
        let b = tmp.path().join("shop-data.sql");
        tokio::fs::write(&a, "CREATE TABLE users (id int);\n").await.unwrap();
        tokio::fs::write(&b, "INSERT INTO users VALUES (1);\n").await.unwrap();

        let job = job();
        job.record(ArtifactDescriptor::begin(&a));
        job.record(ArtifactDescriptor::begin(&b));

        let archive = tmp.path().join("shop-sql.zip");
        let outcome = ArchivalFinalizer::new()
            .finalize(&[a.clone(), b.clone()], &archive, &job)
            .await
            .unwrap();

        assert!(!a.exists());
        assert!(!b.exists());
        assert!(outcome.size > 0);
        assert!(outcome.sidecar.exists());

        let manifest = job.manifest();
        assert_eq!(manifest.len(), 3);
        assert!(manifest.entries[2].compressed);
        assert_eq!(manifest.entries[2].path, archive);

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(zip.len(), 2);
        let mut body = String::new();
        zip.by_name("shop-data.sql").unwrap().read_to_string(&mut body).unwrap();
        assert_eq!(body, "INSERT INTO users VALUES (1);\n");

        let persisted = JobManifest::load(&outcome.sidecar).await.unwrap();
        assert_eq!(persisted.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_keeps_originals_and_skips_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("shop-struct.sql");
        tokio::fs::write(&a, "CREATE TABLE users (id int);\n").await.unwrap();
        let missing = tmp.path().join("shop-data.sql");

        let job = job();
        let archive = tmp.path().join("shop-sql.zip");
        let err = ArchivalFinalizer::new()
            .finalize(&[a.clone(), missing], &archive, &job)
            .await
            .unwrap_err();

        assert!(matches!(err, crate::error::DumpError::Archival(_)));
        assert!(a.exists());
        assert!(!archive.exists());
        assert!(!JobManifest::sidecar_path(&archive).exists());
        assert!(job.manifest().is_empty());
    }
}
