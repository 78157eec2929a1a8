//! CLI runner - executes commands

use crate::audit::audit_table_schema;
use crate::cli::commands::{Cli, Commands, EventSource};
use crate::cli::server::serve;
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::event::decode_event;
use crate::ingest::LoadPlan;
use crate::policy::{builtin_policy, load_policy, LoadPolicy};
use crate::types::{JsonValue, OptionStringExt};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Serve { port } => self.serve(*port).await,
            Commands::Handle(source) => self.handle(source).await,
            Commands::Plan { bucket, name } => self.plan(bucket, name),
            Commands::Policy => self.policy(),
            Commands::AuditSchema => self.audit_schema(),
        }
    }

    /// Environment configuration with the `--policy` flag applied
    fn config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::from_env()?;
        if let Some(path) = &self.cli.policy {
            config.policy_file = Some(path.clone());
        }
        Ok(config)
    }

    async fn serve(&self, port: Option<u16>) -> Result<()> {
        let config = self.config()?;
        let handler = Arc::new(config.build_handler()?);
        serve(handler, port.unwrap_or(config.port)).await
    }

    async fn handle(&self, source: &EventSource) -> Result<()> {
        let body = read_event(source)?;
        let event = decode_event(&body, None)?;

        let handler = self.config()?.build_handler()?;
        let outcome = handler.handle(&event).await?;

        info!(
            event_id = %event.event_id,
            status = %outcome.record.status,
            "Handled event"
        );
        print_json(&json!({
            "record": outcome.record,
            "job_id": outcome.job.job_id,
            "destination": outcome.plan.destination.to_string(),
            "num_rows": outcome.num_rows,
            "audit_written": outcome.audit.is_written(),
        }))
    }

    fn plan(&self, bucket: &str, name: &str) -> Result<()> {
        let config = self.config()?;
        let plan = LoadPlan::new(
            &config.handler_settings(),
            &config.load_policy()?,
            bucket,
            name,
        );
        print_json(&json!({
            "table_name": plan.table_name,
            "destination": plan.destination.to_string(),
            "source_uri": plan.source_uri,
            "config": plan.config,
        }))
    }

    fn policy(&self) -> Result<()> {
        let policy = self.policy_only()?;
        print!("{}", serde_yaml::to_string(&policy)?);
        Ok(())
    }

    fn audit_schema(&self) -> Result<()> {
        print_json(&serde_json::to_value(audit_table_schema())?)
    }

    /// The policy without requiring the rest of the configuration
    fn policy_only(&self) -> Result<LoadPolicy> {
        let path = self
            .cli
            .policy
            .clone()
            .or_else(|| {
                std::env::var("LOAD_POLICY_FILE")
                    .ok()
                    .none_if_empty()
                    .map(PathBuf::from)
            });

        match path {
            Some(path) => load_policy(path),
            None => builtin_policy(),
        }
    }
}

fn read_event(source: &EventSource) -> Result<JsonValue> {
    let text = match (&source.event, &source.event_json) {
        (_, Some(inline)) => inline.clone(),
        (Some(path), None) => fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?,
        (None, None) => return Err(Error::invalid_event("no event given")),
    };

    Ok(serde_json::from_str(&text)?)
}

fn print_json(value: &JsonValue) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
