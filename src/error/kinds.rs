use std::{fmt, io};

/// Crate-wide `Result` type using [`DumpError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, DumpError>;

/// Top-level error type for dump operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum DumpError {
    /// Request rejected before any subprocess was started.
    Validation(ValidationError),

    /// Dump subprocess errors.
    Process(ProcessError),

    /// Directory, file or stat failures.
    Filesystem(FilesystemError),

    /// Job registry conditions.
    Job(JobError),

    /// Archive creation or manifest persistence failed.
    Archival(ArchivalError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// The caller went away and the export was stopped.
    Cancelled(String),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Request validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No table was selected.
    NoTables,

    /// Neither structure nor data was requested.
    NoArtifactKinds,

    /// Character set is not in the recognised list.
    InvalidCharset(String),

    /// Target database name is empty.
    MissingDatabase,

    /// Table name is empty or malformed.
    InvalidTableName(String),

    /// Inline output requested without a response stream.
    MissingResponseStream,
}

/// Dump subprocess errors.
#[derive(Debug)]
pub enum ProcessError {
    /// The executable could not be started.
    Spawn(String),

    /// The subprocess exited unsuccessfully.
    Execution { status: String, stderr: String },

    /// Waiting for the subprocess failed.
    Wait(String),

    /// Relaying subprocess output to the sink failed.
    StreamCopy(String),
}

/// Filesystem errors, always tied to a path.
#[derive(Debug)]
pub enum FilesystemError {
    /// Directory could not be created.
    CreateDir { path: String, reason: String },

    /// File could not be created or opened.
    CreateFile { path: String, reason: String },

    /// Metadata could not be read.
    Stat { path: String, reason: String },

    /// File could not be rewritten in place.
    Rewrite { path: String, reason: String },

    /// File could not be removed.
    Remove { path: String, reason: String },
}

/// Job registry conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// A job with the same fingerprint is in flight.
    AlreadyRunning(String),

    /// A detached job panicked.
    Panicked(String),
}

/// Archival errors.
#[derive(Debug)]
pub enum ArchivalError {
    /// The compressed container could not be produced.
    Compression(String),

    /// The manifest sidecar could not be written or read.
    Manifest(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// Anything else.
    Generic(String),
}

impl DumpError {
    /// Whether this error is a caller-initiated cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DumpError::Cancelled(_))
    }

    /// Whether this error is a duplicate-submission rejection.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DumpError::Job(JobError::AlreadyRunning(_)))
    }

    /// Whether this error was raised before any side effect happened.
    pub fn is_validation(&self) -> bool {
        matches!(self, DumpError::Validation(_))
    }
}

impl FilesystemError {
    pub fn create_dir(path: &std::path::Path, err: impl fmt::Display) -> Self {
        FilesystemError::CreateDir {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn create_file(path: &std::path::Path, err: impl fmt::Display) -> Self {
        FilesystemError::CreateFile {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn stat(path: &std::path::Path, err: impl fmt::Display) -> Self {
        FilesystemError::Stat {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn rewrite(path: &std::path::Path, err: impl fmt::Display) -> Self {
        FilesystemError::Rewrite {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    pub fn remove(path: &std::path::Path, err: impl fmt::Display) -> Self {
        FilesystemError::Remove {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DumpError::Validation(e) => write!(f, "Validation error: {e}"),
            DumpError::Process(e) => write!(f, "Dump failed: {e}"),
            DumpError::Filesystem(e) => write!(f, "Filesystem error: {e}"),
            DumpError::Job(e) => write!(f, "{e}"),
            DumpError::Archival(e) => write!(f, "Archival error: {e}"),
            DumpError::Config(e) => write!(f, "Configuration error: {e}"),
            DumpError::Io(e) => write!(f, "I/O error: {e}"),
            DumpError::Cancelled(msg) => write!(f, "Cancelled: {msg}"),
            DumpError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoTables => write!(f, "No table selected for export"),
            ValidationError::NoArtifactKinds => {
                write!(f, "Select at least one of structure or data")
            }
            ValidationError::InvalidCharset(cs) => write!(f, "Invalid character set: {cs}"),
            ValidationError::MissingDatabase => write!(f, "No database selected"),
            ValidationError::InvalidTableName(name) => write!(f, "Invalid table name: '{name}'"),
            ValidationError::MissingResponseStream => {
                write!(f, "Inline output requires a response stream")
            }
        }
    }
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Spawn(msg) => write!(f, "could not start dump utility: {msg}"),
            ProcessError::Execution { status, stderr } => {
                if stderr.is_empty() {
                    write!(f, "dump utility {status}")
                } else {
                    write!(f, "dump utility {status}: {stderr}")
                }
            }
            ProcessError::Wait(msg) => write!(f, "waiting for dump utility failed: {msg}"),
            ProcessError::StreamCopy(msg) => write!(f, "failed to relay dump output: {msg}"),
        }
    }
}

impl fmt::Display for FilesystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilesystemError::CreateDir { path, reason } => {
                write!(f, "Failed to create directory {path}: {reason}")
            }
            FilesystemError::CreateFile { path, reason } => {
                write!(f, "Failed to create file {path}: {reason}")
            }
            FilesystemError::Stat { path, reason } => write!(f, "Failed to stat {path}: {reason}"),
            FilesystemError::Rewrite { path, reason } => {
                write!(f, "Failed to rewrite {path}: {reason}")
            }
            FilesystemError::Remove { path, reason } => {
                write!(f, "Failed to remove {path}: {reason}")
            }
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::AlreadyRunning(fp) => {
                write!(f, "Job {fp} is already running in the background, please wait")
            }
            JobError::Panicked(msg) => write!(f, "Job aborted unexpectedly: {msg}"),
        }
    }
}

impl fmt::Display for ArchivalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchivalError::Compression(msg) => write!(f, "Failed to create archive: {msg}"),
            ArchivalError::Manifest(msg) => write!(f, "Manifest error: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DumpError::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for ValidationError {}
impl std::error::Error for ProcessError {}
impl std::error::Error for FilesystemError {}
impl std::error::Error for JobError {}
impl std::error::Error for ArchivalError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to DumpError ========================= */

impl From<io::Error> for DumpError {
    fn from(err: io::Error) -> Self {
        DumpError::Io(err)
    }
}

impl From<ValidationError> for DumpError {
    fn from(err: ValidationError) -> Self {
        DumpError::Validation(err)
    }
}

impl From<ProcessError> for DumpError {
    fn from(err: ProcessError) -> Self {
        DumpError::Process(err)
    }
}

impl From<FilesystemError> for DumpError {
    fn from(err: FilesystemError) -> Self {
        DumpError::Filesystem(err)
    }
}

impl From<JobError> for DumpError {
    fn from(err: JobError) -> Self {
        DumpError::Job(err)
    }
}

impl From<ArchivalError> for DumpError {
    fn from(err: ArchivalError) -> Self {
        DumpError::Archival(err)
    }
}

impl From<ConfigError> for DumpError {
    fn from(err: ConfigError) -> Self {
        DumpError::Config(err)
    }
}

impl From<String> for DumpError {
    fn from(msg: String) -> Self {
        DumpError::Generic(msg)
    }
}

impl From<&str> for DumpError {
    fn from(msg: &str) -> Self {
        DumpError::Generic(msg.to_owned())
    }
}
