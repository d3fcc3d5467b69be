//! Dump utility process runner
//!
//! Runs the external dump binary with a prepared argument list, streams its
//! stdout into an [`ArtifactSink`] without buffering the whole dump, and
//! captures a bounded tail of stderr for error messages.
//!
//! The sink is always closed before `run` returns, whichever stage failed.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{DumpError, ProcessError, Result};

use super::progress::ProgressTracker;
use super::recorder::StderrRecorder;
use super::sink::ArtifactSink;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Runs one dump pass.
///
/// Returns the number of bytes relayed into the sink.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        cancel: &CancellationToken,
        args: &[String],
        sink: ArtifactSink,
        stderr: &StderrRecorder,
    ) -> Result<u64>;
}

/// [`ProcessRunner`] backed by a real subprocess.
pub struct CommandRunner {
    program: PathBuf,
    progress: Option<Arc<ProgressTracker>>,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            progress: None,
        }
    }

    /// Report relayed bytes to a tracker
    pub fn with_progress(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.progress = Some(tracker);
        self
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(
        &self,
        cancel: &CancellationToken,
        args: &[String],
        mut sink: ArtifactSink,
        stderr: &StderrRecorder,
    ) -> Result<u64> {
        if cancel.is_cancelled() {
            sink.release().await;
            return Err(cancelled());
        }

        let mut child = match Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                sink.release().await;
                return Err(ProcessError::Spawn(format!("{}: {}", self.program.display(), e)).into());
            }
        };
        debug!("Spawned {} (pid {:?})", self.program.display(), child.id());

        let (Some(stdout), Some(child_stderr)) = (child.stdout.take(), child.stderr.take()) else {
            terminate(&mut child).await;
            sink.release().await;
            return Err(ProcessError::Spawn("stdio pipes unavailable".to_string()).into());
        };
        let stderr_task = tokio::spawn(stderr.clone().capture(child_stderr));

        let copied = tokio::select! {
            res = copy_stream(stdout, sink.writer(), self.progress.as_deref()) => {
                res.map_err(|e| DumpError::from(ProcessError::StreamCopy(e.to_string())))
            }
            _ = cancel.cancelled() => Err(cancelled()),
        };
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                terminate(&mut child).await;
                stderr_task.abort();
                sink.release().await;
                return Err(e);
            }
        };

        let status = tokio::select! {
            res = child.wait() => res,
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                stderr_task.abort();
                sink.release().await;
                return Err(cancelled());
            }
        };
        // stderr reaches EOF once the child is gone
        let _ = stderr_task.await;

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                sink.release().await;
                return Err(ProcessError::Wait(e.to_string()).into());
            }
        };
        if !status.success() {
            sink.release().await;
            return Err(ProcessError::Execution {
                status: status.to_string(),
                stderr: stderr.tail(),
            }
            .into());
        }

        sink.close()
            .await
            .map_err(|e| ProcessError::StreamCopy(format!("failed to close sink: {}", e)))?;
        debug!("Dump pass relayed {} bytes", bytes);
        Ok(bytes)
    }
}

fn cancelled() -> DumpError {
    DumpError::Cancelled("dump interrupted because the client went away".to_string())
}

/// Kill the child and reap it.
async fn terminate(child: &mut Child) {
    match child.kill().await {
        Ok(()) => info!("Terminated dump process"),
        Err(e) => warn!("Failed to terminate dump process: {}", e),
    }
}

/// Relay `reader` into `writer` chunk by chunk.
async fn copy_stream<R>(
    mut reader: R,
    writer: &mut (dyn AsyncWrite + Send + Unpin),
    progress: Option<&ProgressTracker>,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
        if let Some(tracker) = progress {
            tracker.advance(n as u64);
        }
    }
    writer.flush().await?;
    Ok(total)
}
