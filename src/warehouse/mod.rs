//! Warehouse access
//!
//! The [`Warehouse`] trait is the seam between the ingestion handler and the
//! data warehouse. [`BigQueryClient`] implements it over the BigQuery REST API;
//! tests substitute their own implementations.

mod bigquery;
mod types;

pub use bigquery::{BigQueryClient, BigQueryConfig, DEFAULT_ENDPOINT};
pub use types::{
    render_errors, CompletedJob, JobError, LoadJob, RowError, TableInfo, TableRef,
};

use crate::error::Result;
use crate::policy::LoadConfiguration;
use crate::types::JsonValue;
use async_trait::async_trait;

/// Operations the ingestion handler needs from the warehouse
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Submit a job loading `source_uri` into `destination`
    async fn load_table_from_uri(
        &self,
        source_uri: &str,
        destination: &TableRef,
        config: &LoadConfiguration,
    ) -> Result<LoadJob>;

    /// Block until the job is finished
    ///
    /// A job that finished with a fatal error result fails with
    /// [`crate::Error::LoadJob`]; non-fatal problems come back in
    /// [`CompletedJob::errors`].
    async fn wait_for_job(&self, job: &LoadJob) -> Result<CompletedJob>;

    /// Fetch table metadata
    async fn get_table(&self, table: &TableRef) -> Result<TableInfo>;

    /// Stream JSON rows into a table, returning per-row rejections
    async fn insert_rows_json(&self, table: &TableRef, rows: &[JsonValue])
        -> Result<Vec<RowError>>;
}

#[cfg(test)]
pub(crate) mod stub;

#[cfg(test)]
mod tests;
