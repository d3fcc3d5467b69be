//! Export request model
//!
//! A [`DumpRequest`] is built once per call from the request layer's
//! parameters and owned by the orchestrator for the duration of one export.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DumpError, Result, ValidationError};

/// Port used when the configured address carries none.
pub const DEFAULT_PORT: &str = "3306";

/// Character sets accepted by the dump utility.
pub const CHARSETS: &[&str] = &[
    "armscii8", "ascii", "big5", "binary", "cp1250", "cp1251", "cp1256", "cp1257", "cp850",
    "cp852", "cp866", "cp932", "dec8", "eucjpms", "euckr", "gb18030", "gb2312", "gbk", "geostd8",
    "greek", "hebrew", "hp8", "keybcs2", "koi8r", "koi8u", "latin1", "latin2", "latin5", "latin7",
    "macce", "macroman", "sjis", "swe7", "tis620", "ucs2", "ujis", "utf16", "utf16le", "utf32",
    "utf8", "utf8mb3", "utf8mb4",
];

/// Check a character set against [`CHARSETS`].
pub fn is_valid_charset(charset: &str) -> bool {
    CHARSETS.contains(&charset)
}

/// Which part of the schema a dump pass produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// `CREATE TABLE` statements only.
    Structure,
    /// Row data only.
    Data,
}

impl ArtifactKind {
    /// Label used in artifact file names.
    pub fn file_label(&self) -> &'static str {
        match self {
            ArtifactKind::Structure => "struct",
            ArtifactKind::Data => "data",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Structure => write!(f, "structure"),
            ArtifactKind::Data => write!(f, "data"),
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "structure" | "struct" => Ok(ArtifactKind::Structure),
            "data" => Ok(ArtifactKind::Data),
            other => Err(DumpError::Generic(format!("Unknown artifact kind: {other}"))),
        }
    }
}

/// Where the dump output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Streamed into the caller's response and displayed inline.
    InlineStream,
    /// Streamed into the caller's response as an attachment.
    InlineDownload,
    /// Written to files by a detached job and archived.
    BackgroundFile,
}

impl OutputMode {
    /// Whether the export runs in the foreground against a caller stream.
    pub fn is_inline(&self) -> bool {
        matches!(self, OutputMode::InlineStream | OutputMode::InlineDownload)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::InlineStream => write!(f, "inline-stream"),
            OutputMode::InlineDownload => write!(f, "inline-download"),
            OutputMode::BackgroundFile => write!(f, "background-file"),
        }
    }
}

impl FromStr for OutputMode {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "inline-stream" | "open" => Ok(OutputMode::InlineStream),
            "inline-download" | "down" => Ok(OutputMode::InlineDownload),
            "background-file" | "file" => Ok(OutputMode::BackgroundFile),
            other => Err(DumpError::Generic(format!("Unknown output mode: {other}"))),
        }
    }
}

/// Connection parameters handed to the dump utility.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub charset: String,
    pub database: String,
}

impl ConnectionParams {
    /// Build connection parameters from a `host[:port]` address.
    ///
    /// The address is split at its last colon; a missing port falls back to
    /// [`DEFAULT_PORT`].
    pub fn from_address(address: &str, user: &str, password: &str, charset: &str, database: &str) -> Self {
        let (host, port) = split_address(address);
        Self {
            host,
            port,
            user: user.to_string(),
            password: password.to_string(),
            charset: charset.to_string(),
            database: database.to_string(),
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("charset", &self.charset)
            .field("database", &self.database)
            .finish()
    }
}

/// Split `host:port` at the last colon.
fn split_address(address: &str) -> (String, String) {
    match address.rfind(':') {
        Some(p) if p > 0 => {
            let port = &address[p + 1..];
            let port = if port.is_empty() { DEFAULT_PORT } else { port };
            (address[..p].to_string(), port.to_string())
        }
        _ => (address.to_string(), DEFAULT_PORT.to_string()),
    }
}

/// One export request.
#[derive(Debug, Clone)]
pub struct DumpRequest {
    pub connection: ConnectionParams,
    pub tables: Vec<String>,
    pub kinds: Vec<ArtifactKind>,
    pub mode: OutputMode,
    pub reset_auto_increment: bool,
}

impl DumpRequest {
    /// Create a request for structure and data written to background files.
    pub fn new(connection: ConnectionParams, tables: Vec<String>) -> Self {
        Self {
            connection,
            tables,
            kinds: vec![ArtifactKind::Structure, ArtifactKind::Data],
            mode: OutputMode::BackgroundFile,
            reset_auto_increment: false,
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<ArtifactKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_reset_auto_increment(mut self, reset: bool) -> Self {
        self.reset_auto_increment = reset;
        self
    }

    /// Reject requests that must never reach the subprocess.
    pub fn validate(&self) -> Result<()> {
        if self.connection.database.trim().is_empty() {
            return Err(ValidationError::MissingDatabase.into());
        }
        if self.tables.is_empty() {
            return Err(ValidationError::NoTables.into());
        }
        if let Some(bad) = self
            .tables
            .iter()
            .find(|t| t.trim().is_empty() || t.starts_with('-') || t.contains('\0'))
        {
            return Err(ValidationError::InvalidTableName(bad.clone()).into());
        }
        if self.kinds.is_empty() {
            return Err(ValidationError::NoArtifactKinds.into());
        }
        if !is_valid_charset(&self.connection.charset) {
            return Err(ValidationError::InvalidCharset(self.connection.charset.clone()).into());
        }
        Ok(())
    }

    /// Table names in request order with later duplicates dropped.
    pub fn unique_tables(&self) -> Vec<String> {
        let mut seen = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            if !seen.contains(table) {
                seen.push(table.clone());
            }
        }
        seen
    }

    /// Requested kinds in execution order: structure first, then data.
    pub fn passes(&self) -> Vec<ArtifactKind> {
        let mut kinds = self.kinds.clone();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub fn wants(&self, kind: ArtifactKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Attachment file name for inline downloads: `<db>-sql-<unix>.sql`.
    pub fn download_filename(&self, stamp: u64) -> String {
        format!("{}-sql-{}.sql", self.connection.database, stamp)
    }

    /// `Content-Disposition` header value for inline downloads.
    pub fn content_disposition(&self, stamp: u64) -> String {
        format!("attachment; filename={:?}", self.download_filename(stamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(charset: &str) -> ConnectionParams {
        ConnectionParams::from_address("db.local:3307", "root", "secret", charset, "shop")
    }

    #[test]
    fn test_split_address() {
        let c = ConnectionParams::from_address("db.local:3307", "u", "p", "utf8", "d");
        assert_eq!(c.host, "db.local");
        assert_eq!(c.port, "3307");

        let c = ConnectionParams::from_address("db.local", "u", "p", "utf8", "d");
        assert_eq!(c.host, "db.local");
        assert_eq!(c.port, "3306");

        let c = ConnectionParams::from_address("db.local:", "u", "p", "utf8", "d");
        assert_eq!(c.port, "3306");
    }

    #[test]
    fn test_debug_hides_password() {
        let out = format!("{:?}", conn("utf8mb4"));
        assert!(!out.contains("secret"));
        assert!(out.contains("***"));
    }

    #[test]
    fn test_validate_rejects_empty_tables() {
        let req = DumpRequest::new(conn("utf8mb4"), vec![]);
        assert!(matches!(
            req.validate(),
            Err(DumpError::Validation(ValidationError::NoTables))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_charset() {
        let req = DumpRequest::new(conn("klingon"), vec!["users".into()]);
        assert!(matches!(
            req.validate(),
            Err(DumpError::Validation(ValidationError::InvalidCharset(_)))
        ));
    }

    #[test]
    fn test_validate_rejects_no_kinds() {
        let req = DumpRequest::new(conn("utf8"), vec!["users".into()]).with_kinds(vec![]);
        assert!(matches!(
            req.validate(),
            Err(DumpError::Validation(ValidationError::NoArtifactKinds))
        ));
    }

    #[test]
    fn test_validate_rejects_option_like_table() {
        let req = DumpRequest::new(conn("utf8"), vec!["--all-databases".into()]);
        assert!(matches!(
            req.validate(),
            Err(DumpError::Validation(ValidationError::InvalidTableName(_)))
        ));
    }

    #[test]
    fn test_passes_are_ordered() {
        let req = DumpRequest::new(conn("utf8"), vec!["a".into()]).with_kinds(vec![
            ArtifactKind::Data,
            ArtifactKind::Structure,
            ArtifactKind::Data,
        ]);
        assert_eq!(req.passes(), vec![ArtifactKind::Structure, ArtifactKind::Data]);
    }

    #[test]
    fn test_unique_tables_keeps_order() {
        let req = DumpRequest::new(
            conn("utf8"),
            vec!["users".into(), "orders".into(), "users".into()],
        );
        assert_eq!(req.unique_tables(), vec!["users", "orders"]);
    }

    #[test]
    fn test_parse_modes_and_kinds() {
        assert_eq!("inline-stream".parse::<OutputMode>().unwrap(), OutputMode::InlineStream);
        assert_eq!("down".parse::<OutputMode>().unwrap(), OutputMode::InlineDownload);
        assert_eq!("background-file".parse::<OutputMode>().unwrap(), OutputMode::BackgroundFile);
        assert!("ftp".parse::<OutputMode>().is_err());
        assert_eq!("struct".parse::<ArtifactKind>().unwrap(), ArtifactKind::Structure);
        assert!("rows".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn test_content_disposition() {
        let req = DumpRequest::new(conn("utf8"), vec!["a".into()]);
        assert_eq!(
            req.content_disposition(1700000000),
            "attachment; filename=\"shop-sql-1700000000.sql\""
        );
    }
}
