//! bq-ingest CLI
//!
//! Serves the storage trigger endpoint, or runs one-off commands.

use clap::Parser;
use bq_ingest::cli::{Cli, Runner};
use bq_ingest::logging::{format_from_env, init_logging};

#[tokio::main]
async fn main() {
    init_logging(format_from_env());

    let cli = Cli::parse();
    let runner = Runner::new(cli);

    if let Err(e) = runner.run().await {
        tracing::error!("{}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
