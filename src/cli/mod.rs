//! Command-line interface for dbdump
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and argument overrides
//! - Turning `export` arguments into a [`DumpRequest`]
//! - The informational subcommands (`version`, `completion`, `config`, `manifest`)

pub mod completion;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, LogLevel};
use crate::dump::manifest::JobManifest;
use crate::dump::request::{ArtifactKind, DumpRequest, OutputMode};
use crate::error::{Result, ValidationError};
use crate::formatter::ManifestTable;
use crate::utils::string::split_table_list;

/// dbdump - MySQL dump export orchestration
#[derive(Parser, Debug)]
#[command(
    name = "dbdump",
    version,
    about = "Export MySQL tables with mysqldump",
    long_about = "Runs mysqldump once per requested artifact kind and streams the output to stdout,
to a download file, or to archived background files with a manifest."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for dbdump
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export tables
    Export(ExportArgs),

    /// Print a persisted job manifest
    Manifest {
        /// Sidecar file written next to the archive (`<archive>.txt`)
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show version information
    Version,
}

/// Arguments of `dbdump export`
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Database to export (defaults to `connection.database`)
    #[arg(short = 'D', long, value_name = "NAME")]
    pub database: Option<String>,

    /// Tables to export, repeated or comma separated
    #[arg(short = 't', long = "tables", value_name = "TABLES", required = true)]
    pub tables: Vec<String>,

    /// Artifact kinds (structure, data); both when omitted
    #[arg(short = 'k', long = "kind", value_name = "KIND")]
    pub kinds: Vec<ArtifactKind>,

    /// Output mode (inline-stream, inline-download, background-file)
    #[arg(short = 'm', long, value_name = "MODE", default_value = "background-file")]
    pub mode: OutputMode,

    /// Keep AUTO_INCREMENT counters in structure files
    #[arg(long)]
    pub no_reset_auto_increment: bool,

    /// Destination for inline-download output
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Server to connect to (`host[:port]`)
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Username for authentication
    #[arg(short = 'u', long, value_name = "USERNAME")]
    pub user: Option<String>,

    /// Password for authentication
    #[arg(short = 'p', long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Connection character set
    #[arg(long, value_name = "CHARSET")]
    pub charset: Option<String>,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Parse process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and environment, then apply arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply CLI arguments to configuration
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);
        if let Commands::Export(export) = &args.command {
            Self::apply_connection_args(config, export);
        }
    }

    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    fn apply_connection_args(config: &mut Config, export: &ExportArgs) {
        if let Some(host) = &export.host {
            config.connection.address = host.clone();
        }
        if let Some(user) = &export.user {
            config.connection.user = user.clone();
        }
        if let Some(password) = &export.password {
            config.connection.password = password.clone();
        }
        if let Some(charset) = &export.charset {
            config.connection.charset = charset.clone();
        }
        if let Some(database) = &export.database {
            config.connection.database = database.clone();
        }
    }

    /// Build the dump request described by `export`
    pub fn build_request(&self, export: &ExportArgs) -> Result<DumpRequest> {
        let database = self.config.connection.database.trim();
        if database.is_empty() {
            return Err(ValidationError::MissingDatabase.into());
        }

        let tables = split_table_list(&export.tables);
        let kinds = if export.kinds.is_empty() {
            vec![ArtifactKind::Structure, ArtifactKind::Data]
        } else {
            export.kinds.clone()
        };
        let reset = self.config.dump.reset_auto_increment && !export.no_reset_auto_increment;

        Ok(DumpRequest::new(self.config.connection.params(database), tables)
            .with_kinds(kinds)
            .with_mode(export.mode)
            .with_reset_auto_increment(reset))
    }

    /// Handle the informational subcommands
    ///
    /// Returns `false` for `export`, which the caller runs.
    pub async fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Commands::Version => {
                self.show_version();
                Ok(true)
            }
            Commands::Completion { shell } => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Commands::Config { show, validate } => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            Commands::Manifest { path } => {
                self.show_manifest(path).await?;
                Ok(true)
            }
            Commands::Export(_) => Ok(false),
        }
    }

    fn show_version(&self) {
        println!("dbdump version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("❌ Configuration file does not exist");
            return;
        }

        match Config::from_file(&path) {
            Ok(config) => match config.validate() {
                Ok(()) => println!("✅ Configuration is valid"),
                Err(e) => println!("❌ Configuration validation failed: {}", e),
            },
            Err(e) => println!("❌ Failed to load configuration: {}", e),
        }
    }

    fn show_config(&self) -> Result<()> {
        println!("Configuration file: {}", self.get_config_path().display());
        println!();
        println!("=== Effective Configuration ===");
        println!();
        println!("{}", self.config.to_toml_string()?);
        Ok(())
    }

    async fn show_manifest(&self, path: &Path) -> Result<()> {
        let manifest = JobManifest::load(path).await?;
        println!("{}", ManifestTable::new().render(&manifest));
        Ok(())
    }

    /// Configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}
