//! dbdump library
//!
//! Orchestrates MySQL exports through the external `mysqldump` utility:
//! subprocess streaming with cancellation, per-request job deduplication,
//! and archival of background outputs with a persisted manifest.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `dump`: The export engine
//! - `error`: Error types and handling
//! - `formatter`: Manifest tables
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dbdump::config::Config;
//! use dbdump::dump::{CommandRunner, DumpService, ExportOrchestrator, InMemoryJobRegistry, ServiceSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let service = DumpService::new(
//!         ExportOrchestrator::new(Arc::new(CommandRunner::new(&config.dump.program))),
//!         Arc::new(InMemoryJobRegistry::new()),
//!         ServiceSettings::new(config.temp_root()),
//!     );
//!
//!     let request = dbdump::dump::DumpRequest::new(
//!         config.connection.params("shop"),
//!         vec!["users".to_string()],
//!     );
//!     let ack = service.export_background(request)?;
//!     println!("{:?}", ack.completion.await?);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod dump;
pub mod error;
pub mod formatter;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use dump::{DumpRequest, DumpService};
pub use error::{DumpError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
