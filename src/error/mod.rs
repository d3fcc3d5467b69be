//! Error handling module for dump operations.
//!
//! Every failure surfaced by the export engine is a [`DumpError`]. The
//! variants mirror the stages of an export:
//! - request validation (rejected before anything is spawned)
//! - subprocess spawn/execution and output relaying
//! - filesystem setup and post-processing
//! - job deduplication
//! - archival finalization
//!
//! # Example
//!
//! ```rust
//! use dbdump::error::{DumpError, Result, ValidationError};
//!
//! fn check(tables: &[&str]) -> Result<()> {
//!     if tables.is_empty() {
//!         return Err(ValidationError::NoTables.into());
//!     }
//!     Ok(())
//! }
//!
//! assert!(matches!(check(&[]), Err(DumpError::Validation(_))));
//! ```

pub mod kinds;

// Re-export commonly used types
pub use kinds::{
    ArchivalError, ConfigError, DumpError, FilesystemError, JobError, ProcessError, Result,
    ValidationError,
};
