//! Artifact writer resolution
//!
//! A dump pass writes either into the caller's live stream or into a file.
//! [`resolve`] turns a [`DumpTarget`] into a concrete [`ArtifactSink`] plus an
//! optional [`FinalizeHook`] that post-processes the file once the pass is
//! done.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::bytes::Regex;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{FilesystemError, Result};
use crate::utils::fs::ensure_parent_dir;

use super::request::ArtifactKind;

static AUTO_INCREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" AUTO_INCREMENT=[0-9]+").expect("auto-increment pattern is valid")
});

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle to the caller's response stream.
///
/// Clones share the same underlying writer. Passes lock it one at a time,
/// and the engine never shuts it down: the caller owns its lifecycle.
#[derive(Clone)]
pub struct InlineStream(Arc<Mutex<BoxedWriter>>);

impl InlineStream {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self(Arc::new(Mutex::new(Box::new(writer))))
    }
}

impl std::fmt::Debug for InlineStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InlineStream")
    }
}

/// Logical output target of one pass.
#[derive(Debug, Clone)]
pub enum DumpTarget {
    /// The caller's response stream.
    Inline(InlineStream),
    /// A file to be created, parent directories included.
    File(PathBuf),
}

impl DumpTarget {
    pub fn path(&self) -> Option<&Path> {
        match self {
            DumpTarget::Inline(_) => None,
            DumpTarget::File(path) => Some(path),
        }
    }
}

/// Concrete writable handle for one pass.
pub enum ArtifactSink {
    Inline(OwnedMutexGuard<BoxedWriter>),
    File { path: PathBuf, writer: BufWriter<File> },
}

impl ArtifactSink {
    /// The writer the subprocess output is copied into.
    pub fn writer(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin) {
        match self {
            ArtifactSink::Inline(guard) => &mut ***guard,
            ArtifactSink::File { writer, .. } => writer,
        }
    }

    /// Flush, and shut the sink down if it is file-backed.
    pub async fn close(self) -> std::io::Result<()> {
        match self {
            ArtifactSink::Inline(mut guard) => guard.flush().await,
            ArtifactSink::File { mut writer, .. } => {
                writer.flush().await?;
                writer.shutdown().await
            }
        }
    }

    /// Close on an error path; failures are only logged.
    pub async fn release(self) {
        let label = match &self {
            ArtifactSink::Inline(_) => "inline stream".to_string(),
            ArtifactSink::File { path, .. } => path.display().to_string(),
        };
        if let Err(e) = self.close().await {
            debug!("Releasing {} failed: {}", label, e);
        }
    }
}

/// Post-processing applied after a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeHook {
    /// Strip `AUTO_INCREMENT=<n>` counters from a structure file.
    ResetAutoIncrement(PathBuf),
}

impl FinalizeHook {
    pub async fn apply(self) -> Result<()> {
        match self {
            FinalizeHook::ResetAutoIncrement(path) => reset_auto_increment(&path).await,
        }
    }
}

/// Resolve a target into a sink and its finalize hook.
///
/// Only a file-backed structure artifact with `reset_auto_increment`
/// set gets a hook.
pub async fn resolve(
    target: &DumpTarget,
    kind: ArtifactKind,
    reset_auto_increment: bool,
) -> Result<(ArtifactSink, Option<FinalizeHook>)> {
    match target {
        DumpTarget::Inline(stream) => {
            let guard = stream.0.clone().lock_owned().await;
            Ok((ArtifactSink::Inline(guard), None))
        }
        DumpTarget::File(path) => {
            ensure_parent_dir(path).await?;
            let file = File::create(path)
                .await
                .map_err(|e| FilesystemError::create_file(path, e))?;
            debug!("Created {} artifact file: {}", kind, path.display());

            let hook = (kind == ArtifactKind::Structure && reset_auto_increment)
                .then(|| FinalizeHook::ResetAutoIncrement(path.clone()));
            let sink = ArtifactSink::File {
                path: path.clone(),
                writer: BufWriter::with_capacity(1024 * 1024, file),
            };
            Ok((sink, hook))
        }
    }
}

/// Remove every ` AUTO_INCREMENT=<n>` table option from a dump.
pub fn strip_auto_increment(content: &[u8]) -> Vec<u8> {
    AUTO_INCREMENT_RE.replace_all(content, &b""[..]).into_owned()
}

/// Rewrite a structure dump in place without auto-increment counters, so
/// repeated dumps of the same schema are byte-identical.
pub async fn reset_auto_increment(path: &Path) -> Result<()> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| FilesystemError::rewrite(path, e))?;
    let cleaned = strip_auto_increment(&content);
    if cleaned != content {
        tokio::fs::write(path, &cleaned)
            .await
            .map_err(|e| FilesystemError::rewrite(path, e))?;
        debug!("Reset AUTO_INCREMENT values in {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    const DDL: &str = "CREATE TABLE `users` (\n  `id` int NOT NULL AUTO_INCREMENT,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB AUTO_INCREMENT=4821 DEFAULT CHARSET=utf8mb4;\n";

    #[test]
    fn test_strip_auto_increment() {
        let out = String::from_utf8(strip_auto_increment(DDL.as_bytes())).unwrap();
        assert!(!out.contains("AUTO_INCREMENT="));
        assert!(out.contains(") ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"));
        // the column attribute has no '=' and must survive
        assert!(out.contains("NOT NULL AUTO_INCREMENT,"));
    }

    #[test]
    fn test_strip_is_idempotent() {
        let once = strip_auto_increment(DDL.as_bytes());
        let twice = strip_auto_increment(&once);
        assert_eq!(once, twice);

        let adjacent = b"ENGINE=InnoDB AUTO_INCREMENT=1 AUTO_INCREMENT=2 DEFAULT CHARSET=utf8mb4;";
        let once = strip_auto_increment(adjacent);
        assert_eq!(once, b"ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;");
        assert_eq!(strip_auto_increment(&once), once);
    }

    #[tokio::test]
    async fn test_file_target_creates_parent_and_hook() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/shop-struct.sql");
        let target = DumpTarget::File(path.clone());

        let (mut sink, hook) = resolve(&target, ArtifactKind::Structure, true).await.unwrap();
        sink.writer().write_all(DDL.as_bytes()).await.unwrap();
        sink.close().await.unwrap();

        assert_eq!(hook, Some(FinalizeHook::ResetAutoIncrement(path.clone())));
        hook.unwrap().apply().await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(!content.contains("AUTO_INCREMENT=4821"));
    }

    #[tokio::test]
    async fn test_no_hook_for_data_or_disabled_reset() {
        let tmp = tempfile::tempdir().unwrap();
        let data = DumpTarget::File(tmp.path().join("data.sql"));
        let (sink, hook) = resolve(&data, ArtifactKind::Data, true).await.unwrap();
        sink.release().await;
        assert!(hook.is_none());

        let structure = DumpTarget::File(tmp.path().join("struct.sql"));
        let (sink, hook) = resolve(&structure, ArtifactKind::Structure, false).await.unwrap();
        sink.release().await;
        assert!(hook.is_none());
    }

    #[tokio::test]
    async fn test_inline_target_has_no_hook_and_stays_open() {
        let (client, mut server) = tokio::io::duplex(4096);
        let stream = InlineStream::new(client);
        let target = DumpTarget::Inline(stream.clone());

        let (mut sink, hook) = resolve(&target, ArtifactKind::Structure, true).await.unwrap();
        assert!(hook.is_none());
        sink.writer().write_all(b"-- pass one\n").await.unwrap();
        sink.close().await.unwrap();

        // a second pass can lock the same stream again
        let (mut sink, _) = resolve(&target, ArtifactKind::Data, true).await.unwrap();
        sink.writer().write_all(b"-- pass two\n").await.unwrap();
        sink.close().await.unwrap();

        drop(target);
        drop(stream);
        let mut received = String::new();
        server.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "-- pass one\n-- pass two\n");
    }

    #[tokio::test]
    async fn test_file_creation_failure() {
        let tmp = tempfile::tempdir().unwrap();
        // a regular file where a directory is expected
        let blocker = tmp.path().join("blocker");
        tokio::fs::write(&blocker, b"x").await.unwrap();
        let target = DumpTarget::File(blocker.join("out.sql"));

        let result = resolve(&target, ArtifactKind::Data, false).await;
        assert!(matches!(
            result,
            Err(crate::error::DumpError::Filesystem(_))
        ));
    }
}
