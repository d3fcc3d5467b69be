//! Database dump engine
//!
//! Runs the external dump utility once per requested artifact kind and
//! routes its output either into the caller's live stream or into files
//! that are archived afterwards.
//!
//! # Architecture
//!
//! ```text
//! DumpService (coordinator)
//!     ├── JobRegistry          at most one job per request fingerprint
//!     └── ExportOrchestrator   validate → structure → data → finalize
//!             ├── sink::resolve       inline stream or file (+ finalize hook)
//!             ├── ProcessRunner       subprocess, stderr tail, cancellation
//!             └── ArchivalFinalizer   zip, remove originals, manifest sidecar
//! ```
//!
//! A background export, end to end:
//!
//! ```no_run
//! use std::sync::Arc;
//! use dbdump::dump::*;
//!
//! # async fn demo() -> dbdump::error::Result<()> {
//! let service = DumpService::new(
//!     ExportOrchestrator::new(Arc::new(CommandRunner::new("mysqldump"))),
//!     Arc::new(InMemoryJobRegistry::new()),
//!     ServiceSettings::new("/var/lib/dbdump"),
//! );
//! let conn = ConnectionParams::from_address("127.0.0.1:3306", "root", "", "utf8mb4", "shop");
//! let request = DumpRequest::new(conn, vec!["users".into(), "orders".into()])
//!     .with_reset_auto_increment(true);
//!
//! let ack = service.export_background(request)?;
//! println!("{}", ack.archive.display());
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod command;
pub mod coordinator;
pub mod fingerprint;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod recorder;
pub mod registry;
pub mod request;
pub mod runner;
pub mod sink;

pub use archive::{ArchivalFinalizer, ArchiveOutcome};
pub use command::DumpArgs;
pub use coordinator::{BackgroundAck, DumpService, InlineClient, ServiceSettings, Submitted};
pub use fingerprint::Fingerprint;
pub use manifest::{ArtifactDescriptor, JobManifest};
pub use orchestrator::{ExportOrchestrator, ExportPlan, ExportReport, ExportState};
pub use progress::ProgressTracker;
pub use recorder::StderrRecorder;
pub use registry::{InMemoryJobRegistry, JobHandle, JobRegistry, JobStatus, ManifestHandle, OperationKind};
pub use request::{ArtifactKind, ConnectionParams, DumpRequest, OutputMode};
pub use runner::{CommandRunner, ProcessRunner};
pub use sink::{ArtifactSink, DumpTarget, InlineStream};
