//! dbdump - MySQL dump exports
//!
//! Runs `mysqldump` for the selected tables and delivers the result in one
//! of three ways: streamed to stdout, written to a download file, or
//! archived by a background job together with a manifest.
//!
//! # Usage
//!
//! ```bash
//! # Archive structure and data of two tables
//! dbdump export -D shop -t users,orders
//!
//! # Stream the structure to stdout
//! dbdump export -D shop -t users --kind structure --mode inline-stream > schema.sql
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

use dbdump::cli::{CliInterface, Commands, ExportArgs};
use dbdump::dump::{
    CommandRunner, DumpRequest, DumpService, ExportOrchestrator, ExportReport, InMemoryJobRegistry,
    InlineClient, InlineStream, JobManifest, JobStatus, OutputMode, ProgressTracker,
    ServiceSettings, Submitted,
};
use dbdump::error::{DumpError, FilesystemError, Result};
use dbdump::formatter::ManifestTable;
use dbdump::utils::fs::format_size;
use dbdump::utils::time::now_secs;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        let code = if e.is_cancelled() { 130 } else { 1 };
        std::process::exit(code);
    }
}

/// Parse arguments, load configuration, initialize logging, dispatch.
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand().await? {
        return Ok(());
    }

    match &cli.args().command {
        Commands::Export(export) => run_export(&cli, export).await,
        _ => Ok(()),
    }
}

async fn run_export(cli: &CliInterface, export: &ExportArgs) -> Result<()> {
    let config = cli.config();
    config.validate()?;
    let request = cli.build_request(export)?;

    let tracker = Arc::new(ProgressTracker::new(!export.no_progress && !cli.args().quiet));
    let runner = CommandRunner::new(&config.dump.program).with_progress(tracker.clone());
    let service = DumpService::new(
        ExportOrchestrator::new(Arc::new(runner)).with_stderr_tail(config.dump.stderr_tail_lines),
        Arc::new(InMemoryJobRegistry::new()),
        ServiceSettings {
            temp_root: config.temp_root(),
            download_url: config.dump.download_url.clone(),
        },
    );

    let result = match request.mode {
        OutputMode::InlineStream => export_to_stdout(&service, request).await,
        OutputMode::InlineDownload => export_to_download(&service, request, export.output.clone()).await,
        OutputMode::BackgroundFile => export_in_background(&service, request).await,
    };
    tracker.finish();
    result
}

/// Ctrl+C plays the part of a disconnecting client.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to listen for Ctrl+C: {}", err);
        std::future::pending::<()>().await;
    }
}

async fn export_inline(service: &DumpService, request: DumpRequest, stream: InlineStream) -> Result<ExportReport> {
    let client = InlineClient::new(stream, interrupted());
    match service.submit(request, Some(client)).await? {
        Submitted::Inline(report) => Ok(report),
        Submitted::Background(_) => Err(DumpError::Generic("inline export ran in background".to_string())),
    }
}

async fn export_to_stdout(service: &DumpService, request: DumpRequest) -> Result<()> {
    let report = export_inline(service, request, InlineStream::new(tokio::io::stdout())).await?;
    tracing::info!("Streamed {}", format_size(report.bytes_written));
    Ok(())
}

async fn export_to_download(service: &DumpService, request: DumpRequest, output: Option<PathBuf>) -> Result<()> {
    let stamp = now_secs();
    let path = output.unwrap_or_else(|| PathBuf::from(request.download_filename(stamp)));
    let file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| FilesystemError::create_file(&path, e))?;
    eprintln!("Content-Disposition: {}", request.content_disposition(stamp));

    match export_inline(service, request, InlineStream::new(tokio::io::BufWriter::new(file))).await {
        Ok(report) => {
            println!("{} ({})", path.display(), format_size(report.bytes_written));
            Ok(())
        }
        Err(e) => {
            // a partial download is useless
            let _ = tokio::fs::remove_file(&path).await;
            Err(e)
        }
    }
}

async fn export_in_background(service: &DumpService, request: DumpRequest) -> Result<()> {
    let mut ack = match service.submit(request, None).await? {
        Submitted::Background(ack) => ack,
        Submitted::Inline(_) => return Err(DumpError::Generic("background export ran inline".to_string())),
    };

    println!("Job:         {}", ack.job_id);
    println!("Fingerprint: {}", ack.fingerprint);
    println!("Archive:     {}", ack.archive.display());
    println!("Download:    {}", ack.download_url);

    let status = tokio::select! {
        joined = &mut ack.completion => joined
            .map_err(|e| DumpError::Generic(format!("export task failed: {}", e)))?,
        _ = interrupted() => {
            return Err(DumpError::Cancelled("interrupted while waiting for the export".to_string()));
        }
    };

    match status {
        JobStatus::Completed { archive: Some(archive) } => {
            let manifest = JobManifest::load(&JobManifest::sidecar_path(&archive)).await?;
            println!("{}", ManifestTable::new().render(&manifest));
            Ok(())
        }
        JobStatus::Completed { archive: None } => Ok(()),
        JobStatus::Failed(reason) => {
            if let Some(job) = service.job(&ack.fingerprint) {
                eprintln!("{}", ManifestTable::new().render(&job.manifest()));
            }
            Err(DumpError::Generic(reason))
        }
        JobStatus::Running => Ok(()),
    }
}

/// Initialize logging on stderr; stdout may carry the dump itself.
fn initialize_logging(cli: &CliInterface) {
    let level: Level = cli.config().logging.level.to_tracing_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
