//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Load Cloud Storage uploads into BigQuery, with an audit trail
#[derive(Parser, Debug)]
#[command(name = "bq-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Load policy file (YAML); overrides LOAD_POLICY_FILE
    #[arg(long, global = true)]
    pub policy: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP trigger endpoint
    Serve {
        /// Port to listen on (default: PORT or 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Handle a single trigger payload
    Handle(EventSource),

    /// Show what would be loaded for an object, without calling any service
    Plan {
        /// Bucket holding the object
        #[arg(long)]
        bucket: String,

        /// Object name
        #[arg(long)]
        name: String,
    },

    /// Print the effective load policy
    Policy,

    /// Print the audit table schema as BigQuery JSON
    AuditSchema,
}

/// Where a one-off event comes from
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct EventSource {
    /// Trigger payload file (JSON)
    #[arg(long)]
    pub event: Option<PathBuf>,

    /// Inline trigger payload JSON
    #[arg(long)]
    pub event_json: Option<String>,
}
