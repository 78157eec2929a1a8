//! Event handling

use super::naming::{derive_table_name, destination_table_id};
use crate::audit::{AuditLogger, AuditRecord, AuditWriteResult};
use crate::error::Result;
use crate::event::IngestionEvent;
use crate::policy::{LoadConfiguration, LoadPolicy};
use crate::storage::SourceStore;
use crate::warehouse::{render_errors, CompletedJob, LoadJob, TableRef, Warehouse};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where loads go and where audit rows are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSettings {
    pub project_id: String,
    pub dataset_id: String,
    pub audit_table: TableRef,
}

/// Everything decided about an event before any service is called
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadPlan {
    pub table_name: String,
    pub destination: TableRef,
    pub source_uri: String,
    pub config: LoadConfiguration,
}

impl LoadPlan {
    /// Plan the load of `gs://{bucket}/{file_name}`
    pub fn new(
        settings: &HandlerSettings,
        policy: &LoadPolicy,
        bucket: &str,
        file_name: &str,
    ) -> Self {
        let table_name = derive_table_name(file_name);
        let destination = TableRef::new(
            &settings.project_id,
            &settings.dataset_id,
            destination_table_id(&table_name),
        );

        Self {
            source_uri: format!("gs://{bucket}/{file_name}"),
            config: policy.select(&table_name),
            table_name,
            destination,
        }
    }
}

/// Result of a handled event that did not fail exceptionally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionOutcome {
    pub plan: LoadPlan,
    /// The record as written to the audit table (Success or Failure)
    pub record: AuditRecord,
    pub job: LoadJob,
    /// Destination row count after the load, when reported
    pub num_rows: Option<u64>,
    pub audit: AuditWriteResult,
}

/// Loads newly arrived files and audits the outcome
pub struct IngestionHandler {
    warehouse: Arc<dyn Warehouse>,
    policy: LoadPolicy,
    settings: HandlerSettings,
    audit: AuditLogger,
    source_store: Option<SourceStore>,
}

impl IngestionHandler {
    pub fn new(warehouse: Arc<dyn Warehouse>, policy: LoadPolicy, settings: HandlerSettings) -> Self {
        let audit = AuditLogger::new(warehouse.clone(), settings.audit_table.clone());
        Self {
            warehouse,
            policy,
            settings,
            audit,
            source_store: None,
        }
    }

    /// Check that the source object exists before loading it
    pub fn with_source_store(mut self, store: SourceStore) -> Self {
        self.source_store = Some(store);
        self
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    pub fn policy(&self) -> &LoadPolicy {
        &self.policy
    }

    /// Derive table, URI and load configuration for an event
    pub fn plan(&self, event: &IngestionEvent) -> LoadPlan {
        LoadPlan::new(&self.settings, &self.policy, &event.bucket, &event.file_name)
    }

    /// Handle one event
    ///
    /// Exactly one audit write is attempted per call. Errors raised while
    /// loading are returned after that write; audit failures are only logged.
    pub async fn handle(&self, event: &IngestionEvent) -> Result<IngestionOutcome> {
        let plan = self.plan(event);
        let mut record = AuditRecord::pending(event);

        info!(
            event_id = %event.event_id,
            uri = %plan.source_uri,
            table = %plan.destination,
            "Starting load for {} into {}",
            plan.source_uri,
            plan.destination
        );

        let result = self.load(event, &plan).await;

        match &result {
            Ok((completed, _)) if completed.is_clean() => {
                record.mark_success();
                info!(
                    event_id = %event.event_id,
                    "Successfully loaded {} into {}",
                    event.file_name,
                    plan.destination
                );
            }
            Ok((completed, _)) => {
                let message = render_errors(&completed.errors);
                error!(event_id = %event.event_id, job_id = %completed.job.job_id, "Load job errors: {}", message);
                record.mark_failure(message);
            }
            Err(e) => {
                error!(
                    event_id = %event.event_id,
                    "Failed to load data from {} to BigQuery: {}",
                    plan.source_uri,
                    e
                );
                record.mark_failure(e.to_string());
            }
        }

        let audit = self.audit.log(&record).await;
        if !audit.is_written() {
            warn!(event_id = %event.event_id, "Audit record for {} was not stored", event.file_name);
        }

        let (completed, num_rows) = result?;
        Ok(IngestionOutcome {
            plan,
            record,
            job: completed.job,
            num_rows,
            audit,
        })
    }

    async fn load(
        &self,
        event: &IngestionEvent,
        plan: &LoadPlan,
    ) -> Result<(CompletedJob, Option<u64>)> {
        if let Some(store) = &self.source_store {
            store.verify(&event.bucket, &event.file_name).await?;
        }

        let job = self
            .warehouse
            .load_table_from_uri(&plan.source_uri, &plan.destination, &plan.config)
            .await?;

        let completed = self.warehouse.wait_for_job(&job).await?;
        info!(job_id = %job.job_id, "Job {} completed", job.job_id);

        let table = self.warehouse.get_table(&plan.destination).await?;
        match table.num_rows {
            Some(n) => info!(table = %plan.destination, "Loaded {} rows into {}", n, plan.destination),
            None => info!(table = %plan.destination, "Row count unavailable for {}", plan.destination),
        }

        Ok((completed, table.num_rows))
    }
}

impl std::fmt::Debug for IngestionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionHandler")
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .field("source_store", &self.source_store)
            .finish_non_exhaustive()
    }
}
