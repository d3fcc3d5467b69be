//! Table output for job manifests
//!
//! Renders a [`JobManifest`] as a terminal table using tabled's builder,
//! one row per artifact in completion order.

use tabled::{
    builder::Builder,
    settings::{Alignment, Modify, Style, object::{Columns, Rows}, width::Width},
};

use crate::dump::manifest::{ArtifactDescriptor, JobManifest};
use crate::utils::fs::format_size;
use crate::utils::time::format_duration;

/// Maximum width for the path and error columns (characters)
const DEFAULT_MAX_COLUMN_WIDTH: usize = 60;

const HEADERS: [&str; 6] = ["#", "file", "size", "elapsed", "finished", "status"];

/// Manifest table formatter
pub struct ManifestTable {
    max_column_width: usize,
}

impl ManifestTable {
    pub fn new() -> Self {
        Self {
            max_column_width: DEFAULT_MAX_COLUMN_WIDTH,
        }
    }

    pub fn with_max_column_width(mut self, width: usize) -> Self {
        self.max_column_width = width;
        self
    }

    pub fn render(&self, manifest: &JobManifest) -> String {
        if manifest.is_empty() {
            return "(empty manifest)".to_string();
        }

        let mut builder = Builder::default();
        builder.push_record(HEADERS.map(String::from));
        for (i, entry) in manifest.entries.iter().enumerate() {
            builder.push_record(self.row(i + 1, entry));
        }

        let mut table = builder.build();
        table.with(Style::modern());
        table.with(Modify::new(Rows::first()).with(Alignment::center()));
        for column in [1, 5] {
            table.with(Modify::new(Columns::new(column..=column)).with(Width::wrap(self.max_column_width)));
        }
        table.to_string()
    }

    fn row(&self, index: usize, entry: &ArtifactDescriptor) -> Vec<String> {
        let file = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.path.display().to_string());
        let finished = entry
            .end
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = match (&entry.error, entry.compressed) {
            (Some(err), _) => format!("failed: {}", err),
            (None, true) => "archive".to_string(),
            (None, false) => "ok".to_string(),
        };

        vec![
            index.to_string(),
            file,
            format_size(entry.size),
            format_duration(entry.elapsed()),
            finished,
            status,
        ]
    }
}

impl Default for ManifestTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_manifest() {
        assert_eq!(ManifestTable::new().render(&JobManifest::new()), "(empty manifest)");
    }

    #[test]
    fn test_rows_per_entry() {
        let mut manifest = JobManifest::new();
        let mut structure = ArtifactDescriptor::begin("/tmp/shop-struct-1.sql");
        structure.finish(2048);
        manifest.push(structure);
        let mut data = ArtifactDescriptor::begin("/tmp/shop-data-1.sql");
        data.fail("exit status: 2");
        manifest.push(data);
        let mut archive = ArtifactDescriptor::begin("/tmp/shop-sql-1.zip").compressed();
        archive.finish(512);
        manifest.push(archive);

        let rendered = ManifestTable::new().render(&manifest);
        assert!(rendered.contains("shop-struct-1.sql"));
        assert!(rendered.contains("failed: exit status: 2"));
        assert!(rendered.contains("archive"));
        assert!(!rendered.contains("/tmp/"));
    }
}
