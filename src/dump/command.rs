//! Dump utility argument template
//!
//! Both passes of an export share one argument list. Only the type flag
//! differs: `-d` dumps structure without rows, `-t` dumps rows without
//! `CREATE TABLE` statements.

use super::request::{ArtifactKind, ConnectionParams};

const STRUCTURE_FLAG: &str = "-d";
const DATA_FLAG: &str = "-t";

/// Ordered argument list for the dump utility.
#[derive(Debug, Clone)]
pub struct DumpArgs {
    args: Vec<String>,
    type_flag_index: usize,
}

impl DumpArgs {
    /// Build the fixed template followed by the table list.
    ///
    /// The type flag starts out asserting structure.
    pub fn new(conn: &ConnectionParams, tables: &[String]) -> Self {
        let mut args = vec![
            format!("--default-character-set={}", conn.charset),
            "--single-transaction".to_string(),
            "--set-gtid-purged=OFF".to_string(),
            "--no-autocommit".to_string(),
            "--opt".to_string(),
        ];
        let type_flag_index = args.len();
        args.push(STRUCTURE_FLAG.to_string());
        args.push(format!("-h{}", conn.host));
        args.push(format!("-P{}", conn.port));
        args.push(format!("-u{}", conn.user));
        args.push(format!("-p{}", conn.password));
        args.push(conn.database.clone());
        args.extend(tables.iter().cloned());

        Self {
            args,
            type_flag_index,
        }
    }

    /// Switch the type flag for the next pass.
    pub fn set_kind(&mut self, kind: ArtifactKind) {
        self.args[self.type_flag_index] = match kind {
            ArtifactKind::Structure => STRUCTURE_FLAG,
            ArtifactKind::Data => DATA_FLAG,
        }
        .to_string();
    }

    pub fn kind(&self) -> ArtifactKind {
        if self.args[self.type_flag_index] == DATA_FLAG {
            ArtifactKind::Data
        } else {
            ArtifactKind::Structure
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.args
    }

    /// Arguments with the password replaced, for logging.
    pub fn redacted(&self) -> String {
        self.args
            .iter()
            .map(|a| if a.starts_with("-p") { "-p***" } else { a.as_str() })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> ConnectionParams {
        ConnectionParams::from_address("10.0.0.5:3307", "backup", "s3cret", "utf8mb4", "shop")
    }

    #[test]
    fn test_template_order() {
        let tables = vec!["users".to_string(), "orders".to_string()];
        let args = DumpArgs::new(&conn(), &tables);
        assert_eq!(
            args.as_slice(),
            &[
                "--default-character-set=utf8mb4",
                "--single-transaction",
                "--set-gtid-purged=OFF",
                "--no-autocommit",
                "--opt",
                "-d",
                "-h10.0.0.5",
                "-P3307",
                "-ubackup",
                "-ps3cret",
                "shop",
                "users",
                "orders",
            ]
        );
    }

    #[test]
    fn test_set_kind_only_touches_type_flag() {
        let tables = vec!["users".to_string()];
        let mut args = DumpArgs::new(&conn(), &tables);
        let before = args.as_slice().to_vec();

        args.set_kind(ArtifactKind::Data);
        assert_eq!(args.kind(), ArtifactKind::Data);
        let after = args.as_slice();
        assert_eq!(after[5], "-t");
        let changed = before.iter().zip(after).filter(|(a, b)| a != b).count();
        assert_eq!(changed, 1);

        args.set_kind(ArtifactKind::Structure);
        assert_eq!(args.as_slice(), before.as_slice());
    }

    #[test]
    fn test_redacted_hides_password() {
        let args = DumpArgs::new(&conn(), &["users".to_string()]);
        let line = args.redacted();
        assert!(!line.contains("s3cret"));
        assert!(line.contains("-p***"));
    }
}
