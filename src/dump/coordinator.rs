//! Dump service
//!
//! Entry point for export submissions. Inline exports run on the caller's
//! task and stream into its response; background exports are detached onto
//! their own task and acknowledged immediately with the archive location.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{JobError, Result, ValidationError};
use crate::utils::{fs::cache_dir, time::now_secs};

use super::fingerprint::Fingerprint;
use super::manifest::ArtifactDescriptor;
use super::orchestrator::{ExportOrchestrator, ExportPlan, ExportReport};
use super::registry::{JobRegistry, JobStatus, ManifestHandle, OperationKind};
use super::request::{DumpRequest, OutputMode};
use super::sink::InlineStream;

/// Path fragment advertised for background downloads.
pub const DEFAULT_DOWNLOAD_URL: &str = "/download/file?path=dbmanager/cache/export";

/// Paths the service writes to and advertises.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Root under which `dbmanager/cache/<operation>` is created.
    pub temp_root: PathBuf,
    pub download_url: String,
}

impl ServiceSettings {
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
        }
    }
}

/// The caller side of an inline export.
pub struct InlineClient {
    pub stream: InlineStream,
    /// Cancelled when the enclosing request is torn down.
    pub scope: CancellationToken,
    /// Resolves once the client has gone away.
    pub disconnected: BoxFuture<'static, ()>,
}

impl InlineClient {
    pub fn new<F>(stream: InlineStream, disconnected: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            stream,
            scope: CancellationToken::new(),
            disconnected: disconnected.boxed(),
        }
    }

    pub fn with_scope(mut self, scope: CancellationToken) -> Self {
        self.scope = scope;
        self
    }
}

/// Acknowledgement of a background export.
#[derive(Debug)]
pub struct BackgroundAck {
    pub job_id: Uuid,
    pub fingerprint: Fingerprint,
    pub download_url: String,
    pub archive: PathBuf,
    /// Resolves to the final job status.
    pub completion: JoinHandle<JobStatus>,
}

/// Outcome of [`DumpService::submit`].
#[derive(Debug)]
pub enum Submitted {
    Inline(ExportReport),
    Background(BackgroundAck),
}

/// Removes a job's registry entry when dropped.
struct ReleaseGuard {
    registry: Arc<dyn JobRegistry>,
    op: OperationKind,
    fingerprint: Fingerprint,
    job_id: Uuid,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.registry.release(self.op, &self.fingerprint, self.job_id);
    }
}

/// Admits, runs and tracks exports.
pub struct DumpService {
    orchestrator: Arc<ExportOrchestrator>,
    registry: Arc<dyn JobRegistry>,
    settings: ServiceSettings,
}

impl DumpService {
    pub fn new(
        orchestrator: ExportOrchestrator,
        registry: Arc<dyn JobRegistry>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Dispatch on the request's output mode.
    ///
    /// Inline modes need a client to stream into.
    pub async fn submit(&self, request: DumpRequest, client: Option<InlineClient>) -> Result<Submitted> {
        match request.mode {
            OutputMode::InlineStream | OutputMode::InlineDownload => {
                let client = client.ok_or(ValidationError::MissingResponseStream)?;
                Ok(Submitted::Inline(self.export_inline(request, client).await?))
            }
            OutputMode::BackgroundFile => Ok(Submitted::Background(self.export_background(request)?)),
        }
    }

    /// Stream an export into the client, returning once it is done.
    ///
    /// The registry entry is held for the duration of the call and removed
    /// on every exit path. A disconnect cancels the running pass.
    pub async fn export_inline(&self, request: DumpRequest, client: InlineClient) -> Result<ExportReport> {
        request.validate()?;
        let fingerprint = Fingerprint::of(&request);
        let (job, running) = self.registry.try_acquire(OperationKind::Export, &fingerprint);
        if running {
            return Err(JobError::AlreadyRunning(fingerprint.to_string()).into());
        }
        let _release = ReleaseGuard {
            registry: self.registry.clone(),
            op: OperationKind::Export,
            fingerprint: fingerprint.clone(),
            job_id: job.id(),
        };

        let cancel = client.scope.child_token();
        let finished = CancellationToken::new();
        let watcher = tokio::spawn(watch_liveness(
            client.disconnected,
            cancel.clone(),
            finished.clone(),
        ));
        // stops the watcher even if this future is dropped mid-export
        let stop_watching = finished.drop_guard();

        let plan = ExportPlan::inline(&request, client.stream);
        let result = self.orchestrator.export(&cancel, &request, &plan, &job).await;

        drop(stop_watching);
        let _ = watcher.await;

        match &result {
            Ok(report) => {
                job.set_status(JobStatus::Completed { archive: None });
                tracing::info!(
                    "Export of {} finished ({} bytes)",
                    request.connection.database,
                    report.bytes_written
                );
            }
            Err(e) if e.is_cancelled() => {
                job.set_status(JobStatus::Failed(e.to_string()));
                tracing::info!("Export of {} cancelled: {}", request.connection.database, e);
            }
            Err(e) => {
                job.set_status(JobStatus::Failed(e.to_string()));
                tracing::error!("Export of {} failed: {}", request.connection.database, e);
            }
        }
        result
    }

    /// Detach an export onto its own task.
    ///
    /// Must be called from within a tokio runtime. On success the registry
    /// entry is removed; on failure it stays with a `Failed` status so the
    /// outcome can still be polled.
    pub fn export_background(&self, request: DumpRequest) -> Result<BackgroundAck> {
        request.validate()?;
        let fingerprint = Fingerprint::of(&request);
        let (job, running) = self.registry.try_acquire(OperationKind::Export, &fingerprint);
        if running {
            return Err(JobError::AlreadyRunning(fingerprint.to_string()).into());
        }

        let dir = cache_dir(&self.settings.temp_root, OperationKind::Export.as_str());
        let plan = ExportPlan::files(&request, &dir, now_secs(), &fingerprint);
        let archive = plan.archive.clone().unwrap_or_else(|| dir.clone());

        let completion = tokio::spawn(run_detached(
            self.orchestrator.clone(),
            self.registry.clone(),
            job.clone(),
            request,
            plan,
        ));
        tracing::info!("Queued background export {} -> {}", job.id(), archive.display());

        Ok(BackgroundAck {
            job_id: job.id(),
            fingerprint,
            download_url: self.settings.download_url.clone(),
            archive,
            completion,
        })
    }

    pub fn job(&self, fingerprint: &Fingerprint) -> Option<ManifestHandle> {
        self.registry.get(OperationKind::Export, fingerprint)
    }

    pub fn jobs(&self) -> Vec<ManifestHandle> {
        self.registry.list(OperationKind::Export)
    }
}

/// Cancel `cancel` once the client disconnects, until `finished` fires.
async fn watch_liveness(
    disconnected: BoxFuture<'static, ()>,
    cancel: CancellationToken,
    finished: CancellationToken,
) {
    tokio::select! {
        _ = disconnected => {
            tracing::info!("Client disconnected, interrupting export");
            cancel.cancel();
        }
        _ = finished.cancelled() => {}
    }
}

async fn run_detached(
    orchestrator: Arc<ExportOrchestrator>,
    registry: Arc<dyn JobRegistry>,
    job: ManifestHandle,
    request: DumpRequest,
    plan: ExportPlan,
) -> JobStatus {
    // nobody can disconnect from a background job
    let cancel = CancellationToken::new();
    let outcome = AssertUnwindSafe(orchestrator.export(&cancel, &request, &plan, &job))
        .catch_unwind()
        .await;

    let status = match outcome {
        Ok(Ok(report)) => {
            let archive = report.archive.map(|a| a.archive);
            tracing::info!("Background export {} finished", job.id());
            JobStatus::Completed { archive }
        }
        Ok(Err(e)) => {
            tracing::error!("Background export {} failed: {}", job.id(), e);
            JobStatus::Failed(e.to_string())
        }
        Err(panic) => {
            let err = JobError::Panicked(panic_message(panic.as_ref()));
            tracing::error!("Background export {} aborted: {}", job.id(), err);
            let mut entry = ArtifactDescriptor::begin(plan.archive.clone().unwrap_or_default());
            entry.fail(&err);
            job.record(entry);
            JobStatus::Failed(err.to_string())
        }
    };

    job.set_status(status.clone());
    if matches!(status, JobStatus::Completed { .. }) {
        registry.release(OperationKind::Export, job.fingerprint(), job.id());
    }
    status
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
