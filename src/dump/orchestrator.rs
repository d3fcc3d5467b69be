//! Export orchestrator
//!
//! Sequences the structure and data passes of one export against a shared
//! argument list, records file-backed artifacts in the job manifest, and
//! hands the files to the archival finalizer.
//!
//! ```text
//! Idle → Validating → Running(structure) → Running(data) → Finalizing → Done
//!             └──────────────┴──────────────────┴──────────────┴──→ Failed
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::utils::fs::file_size;

use super::archive::{ArchivalFinalizer, ArchiveOutcome};
use super::command::DumpArgs;
use super::fingerprint::Fingerprint;
use super::manifest::ArtifactDescriptor;
use super::recorder::StderrRecorder;
use super::registry::JobHandle;
use super::request::{ArtifactKind, DumpRequest};
use super::runner::ProcessRunner;
use super::sink::{DumpTarget, InlineStream, resolve};

/// Default number of stderr lines kept per pass.
pub const DEFAULT_STDERR_TAIL: usize = 1000;

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Validating,
    Running(ArtifactKind),
    Finalizing,
    Done,
    Failed,
}

/// Where each pass writes, and the archive for file outputs.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub structure: Option<DumpTarget>,
    pub data: Option<DumpTarget>,
    pub archive: Option<PathBuf>,
}

impl ExportPlan {
    /// Every requested pass streams into the caller's response.
    pub fn inline(request: &DumpRequest, stream: InlineStream) -> Self {
        Self {
            structure: request
                .wants(ArtifactKind::Structure)
                .then(|| DumpTarget::Inline(stream.clone())),
            data: request
                .wants(ArtifactKind::Data)
                .then(|| DumpTarget::Inline(stream)),
            archive: None,
        }
    }

    /// Every requested pass writes a file under `dir`; the files end up in
    /// `<db>-sql-<stamp>-<fp8>.zip`.
    pub fn files(request: &DumpRequest, dir: &Path, stamp: u64, fingerprint: &Fingerprint) -> Self {
        let db = &request.connection.database;
        let name = |label: &str, ext: &str| {
            dir.join(format!("{}-{}-{}-{}.{}", db, label, stamp, fingerprint.short(), ext))
        };
        Self {
            structure: request
                .wants(ArtifactKind::Structure)
                .then(|| DumpTarget::File(name(ArtifactKind::Structure.file_label(), "sql"))),
            data: request
                .wants(ArtifactKind::Data)
                .then(|| DumpTarget::File(name(ArtifactKind::Data.file_label(), "sql"))),
            archive: Some(name("sql", "zip")),
        }
    }

    pub fn target(&self, kind: ArtifactKind) -> Option<&DumpTarget> {
        match kind {
            ArtifactKind::Structure => self.structure.as_ref(),
            ArtifactKind::Data => self.data.as_ref(),
        }
    }
}

/// Result of a successful export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Every state entered, in order.
    pub transitions: Vec<ExportState>,
    pub bytes_written: u64,
    /// Files produced by the passes (removed again once archived).
    pub artifacts: Vec<PathBuf>,
    pub archive: Option<ArchiveOutcome>,
}

impl ExportReport {
    pub fn state(&self) -> ExportState {
        self.transitions.last().copied().unwrap_or(ExportState::Idle)
    }
}

struct StateTrace {
    transitions: Vec<ExportState>,
}

impl StateTrace {
    fn new() -> Self {
        Self {
            transitions: vec![ExportState::Idle],
        }
    }

    fn enter(&mut self, state: ExportState) {
        debug!("Export state: {:?}", state);
        self.transitions.push(state);
    }
}

/// Drives the dump utility for one export at a time.
pub struct ExportOrchestrator {
    runner: Arc<dyn ProcessRunner>,
    finalizer: ArchivalFinalizer,
    stderr_tail_lines: usize,
}

impl ExportOrchestrator {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            finalizer: ArchivalFinalizer::new(),
            stderr_tail_lines: DEFAULT_STDERR_TAIL,
        }
    }

    pub fn with_stderr_tail(mut self, lines: usize) -> Self {
        self.stderr_tail_lines = lines;
        self
    }

    /// Run every requested pass, then archive file outputs.
    ///
    /// Passes run strictly one after the other. The first failure aborts
    /// the remaining passes and skips archival.
    pub async fn export(
        &self,
        cancel: &CancellationToken,
        request: &DumpRequest,
        plan: &ExportPlan,
        job: &JobHandle,
    ) -> Result<ExportReport> {
        let mut trace = StateTrace::new();
        match self.run_states(&mut trace, cancel, request, plan, job).await {
            Ok((bytes_written, artifacts, archive)) => {
                trace.enter(ExportState::Done);
                Ok(ExportReport {
                    transitions: trace.transitions,
                    bytes_written,
                    artifacts,
                    archive,
                })
            }
            Err(e) => {
                trace.enter(ExportState::Failed);
                Err(e)
            }
        }
    }

    async fn run_states(
        &self,
        trace: &mut StateTrace,
        cancel: &CancellationToken,
        request: &DumpRequest,
        plan: &ExportPlan,
        job: &JobHandle,
    ) -> Result<(u64, Vec<PathBuf>, Option<ArchiveOutcome>)> {
        trace.enter(ExportState::Validating);
        request.validate()?;

        let tables = request.unique_tables();
        let mut args = DumpArgs::new(&request.connection, &tables);
        info!(
            "Starting backup of {} table(s) from {}: {}",
            tables.len(),
            request.connection.database,
            tables.join(", ")
        );

        let mut bytes_written = 0u64;
        let mut artifacts = Vec::new();
        for kind in request.passes() {
            let Some(target) = plan.target(kind) else {
                debug!("No target for {} pass, skipping", kind);
                continue;
            };
            trace.enter(ExportState::Running(kind));
            args.set_kind(kind);

            bytes_written += self
                .run_pass(cancel, &args, kind, target, request.reset_auto_increment, job)
                .await?;
            if let Some(path) = target.path() {
                artifacts.push(path.to_path_buf());
            }
        }

        let archive = match &plan.archive {
            Some(archive) if !artifacts.is_empty() => {
                trace.enter(ExportState::Finalizing);
                Some(self.finalizer.finalize(&artifacts, archive, job).await?)
            }
            _ => None,
        };

        Ok((bytes_written, artifacts, archive))
    }

    async fn run_pass(
        &self,
        cancel: &CancellationToken,
        args: &DumpArgs,
        kind: ArtifactKind,
        target: &DumpTarget,
        reset_auto_increment: bool,
        job: &JobHandle,
    ) -> Result<u64> {
        let descriptor = target.path().map(ArtifactDescriptor::begin);

        let result = async {
            let (sink, hook) = resolve(target, kind, reset_auto_increment).await?;
            let stderr = StderrRecorder::new(self.stderr_tail_lines);
            debug!("Running {} pass: {}", kind, args.redacted());

            let bytes = self.runner.run(cancel, args.as_slice(), sink, &stderr).await?;
            if let Some(hook) = hook {
                hook.apply().await?;
            }
            Ok(bytes)
        }
        .await;

        if let Some(mut descriptor) = descriptor {
            match &result {
                Ok(_) => match file_size(&descriptor.path).await {
                    Ok(size) => descriptor.finish(size),
                    Err(e) => descriptor.fail(e),
                },
                Err(e) => descriptor.fail(e),
            }
            job.record(descriptor);
        }

        if let Ok(bytes) = &result {
            info!("Finished {} pass ({} bytes)", kind, bytes);
        }
        result
    }
}
