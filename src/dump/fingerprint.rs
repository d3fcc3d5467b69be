//! Request fingerprints
//!
//! The fingerprint is the job registry key. It is computed over a canonical
//! form of the request so that the order in which tables or kinds were
//! selected does not matter.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::request::{ArtifactKind, DumpRequest, OutputMode};

/// Hex-encoded SHA-256 digest of a request's defining parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

#[derive(Serialize)]
struct CanonicalRequest<'a> {
    database: &'a str,
    tables: Vec<&'a str>,
    mode: OutputMode,
    kinds: Vec<ArtifactKind>,
}

impl Fingerprint {
    /// Compute the fingerprint of a request.
    pub fn of(request: &DumpRequest) -> Self {
        let mut tables: Vec<&str> = request.tables.iter().map(String::as_str).collect();
        tables.sort_unstable();
        tables.dedup();

        let canonical = CanonicalRequest {
            database: &request.connection.database,
            tables,
            mode: request.mode,
            kinds: request.passes(),
        };

        // Serializing plain strings and unit enums cannot fail.
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        Fingerprint(hex::encode(Sha256::digest(&bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, used to keep artifact names unique.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::request::ConnectionParams;

    fn request(tables: &[&str], kinds: Vec<ArtifactKind>) -> DumpRequest {
        let conn = ConnectionParams::from_address("localhost", "root", "", "utf8mb4", "shop");
        DumpRequest::new(conn, tables.iter().map(|t| t.to_string()).collect()).with_kinds(kinds)
    }

    #[test]
    fn test_order_insensitive() {
        let a = request(&["users", "orders"], vec![ArtifactKind::Structure, ArtifactKind::Data]);
        let b = request(&["orders", "users"], vec![ArtifactKind::Data, ArtifactKind::Structure]);
        assert_eq!(Fingerprint::of(&a), Fingerprint::of(&b));
    }

    #[test]
    fn test_distinguishes_parameters() {
        let base = request(&["users"], vec![ArtifactKind::Structure]);
        let other_table = request(&["orders"], vec![ArtifactKind::Structure]);
        let other_kind = request(&["users"], vec![ArtifactKind::Data]);
        let other_mode = base.clone().with_mode(OutputMode::InlineStream);

        let fp = Fingerprint::of(&base);
        assert_ne!(fp, Fingerprint::of(&other_table));
        assert_ne!(fp, Fingerprint::of(&other_kind));
        assert_ne!(fp, Fingerprint::of(&other_mode));
    }

    #[test]
    fn test_hex_shape() {
        let fp = Fingerprint::of(&request(&["users"], vec![ArtifactKind::Data]));
        assert_eq!(fp.as_str().len(), 64);
        assert_eq!(fp.short().len(), 8);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
