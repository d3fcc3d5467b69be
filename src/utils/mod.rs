//! Utility functions and helpers for dbdump
//!
//! - Time helpers used to stamp artifact names
//! - File system helpers for the temp-directory convention
//! - String helpers for table selections

use std::path::{Path, PathBuf};

/// Time utilities
pub mod time {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    /// Get current timestamp in seconds
    ///
    /// # Returns
    /// * `u64` - Timestamp in seconds
    pub fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs()
    }

    /// Format duration for display
    ///
    /// # Arguments
    /// * `duration` - Duration to format
    ///
    /// # Returns
    /// * `String` - Human-readable duration
    pub fn format_duration(duration: Duration) -> String {
        let millis = duration.as_millis();
        if millis < 1000 {
            format!("{}ms", millis)
        } else if millis < 60_000 {
            format!("{:.2}s", millis as f64 / 1000.0)
        } else {
            let secs = duration.as_secs();
            format!("{}m {}s", secs / 60, secs % 60)
        }
    }
}

/// File system utilities
pub mod fs {
    use super::*;

    use crate::error::{FilesystemError, Result};

    /// Sub-directory of the temp root that holds every cached dump.
    pub const CACHE_SUBDIR: &str = "dbmanager/cache";

    /// Cache directory for one operation kind: `<root>/dbmanager/cache/<op>`.
    ///
    /// The directory is not created here; see [`ensure_dir`].
    pub fn cache_dir(root: &Path, op: &str) -> PathBuf {
        root.join(CACHE_SUBDIR).join(op)
    }

    /// Create a directory (and its parents) if it does not exist yet.
    pub async fn ensure_dir(dir: &Path) -> Result<()> {
        if tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) {
            return Ok(());
        }
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| FilesystemError::create_dir(dir, e).into())
    }

    /// Create the parent directory of `path` if needed.
    pub async fn ensure_parent_dir(path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent).await,
            _ => Ok(()),
        }
    }

    /// Size of a file in bytes.
    pub async fn file_size(path: &Path) -> Result<u64> {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.len())
            .map_err(|e| FilesystemError::stat(path, e).into())
    }

    /// Format a byte count for display
    pub fn format_size(bytes: u64) -> String {
        const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
        let mut size = bytes as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} {}", bytes, UNITS[0])
        } else {
            format!("{:.1} {}", size, UNITS[unit])
        }
    }

    /// Expand home directory in path
    ///
    /// # Arguments
    /// * `path` - Path potentially starting with ~
    ///
    /// # Returns
    /// * `PathBuf` - Expanded path
    pub fn expand_home(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        PathBuf::from(path)
    }
}

/// String utilities
pub mod string {
    /// Split a table selection into individual names.
    ///
    /// Form posts may deliver several names joined by commas in a single
    /// value; each value is split, trimmed, and empty pieces are dropped.
    /// Duplicates keep their first position.
    pub fn split_table_list<S: AsRef<str>>(values: &[S]) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        for value in values {
            for name in value.as_ref().split(',') {
                let name = name.trim();
                if !name.is_empty() && !tables.iter().any(|t| t == name) {
                    tables.push(name.to_string());
                }
            }
        }
        tables
    }
}
