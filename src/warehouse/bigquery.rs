//! BigQuery REST implementation of [`Warehouse`]
//!
//! Uses `jobs.insert` / `jobs.get` for loads, `tables.get` for metadata and
//! `tabledata.insertAll` for streaming inserts.

use super::types::{CompletedJob, JobError, LoadJob, RowError, TableInfo, TableRef};
use super::Warehouse;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RequestConfig};
use crate::policy::LoadConfiguration;
use crate::types::{BackoffType, JsonValue};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// Public BigQuery v2 endpoint
pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Connection and job-wait settings
#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    /// API root, up to and including `/bigquery/v2`
    pub endpoint: String,
    /// Job location (e.g. `US`, `europe-west2`); the dataset's region when unset
    pub location: Option<String>,
    /// First delay between `jobs.get` polls
    pub poll_interval: Duration,
    /// Longest delay between polls
    pub max_poll_interval: Duration,
    /// Give up waiting after this long; wait forever when unset
    pub job_timeout: Option<Duration>,
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            location: None,
            poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(10),
            job_timeout: None,
        }
    }
}

/// BigQuery client
#[derive(Debug, Clone)]
pub struct BigQueryClient {
    http: HttpClient,
    config: BigQueryConfig,
}

impl BigQueryClient {
    /// Create a client over an (authenticated) HTTP client
    pub fn new(http: HttpClient, config: BigQueryConfig) -> Self {
        Self { http, config }
    }

    /// Client settings
    pub fn config(&self) -> &BigQueryConfig {
        &self.config
    }

    /// Build an endpoint URL from path segments, escaping each one
    fn url(&self, segments: &[&str]) -> Result<String> {
        let mut url = Url::parse(&self.config.endpoint)?;
        url.path_segments_mut()
            .map_err(|()| {
                Error::invalid_value("BIGQUERY_ENDPOINT", "endpoint cannot be a base URL")
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    fn table_url(&self, table: &TableRef, suffix: Option<&str>) -> Result<String> {
        let mut segments = vec![
            "projects",
            table.project_id.as_str(),
            "datasets",
            table.dataset_id.as_str(),
            "tables",
            table.table_id.as_str(),
        ];
        segments.extend(suffix);
        self.url(&segments)
    }

    async fn get_job(&self, job: &LoadJob) -> Result<JobResource> {
        let url = self.url(&["projects", &job.project_id, "jobs", &job.job_id])?;
        let mut request = RequestConfig::new();
        if let Some(location) = &job.location {
            request = request.query("location", location);
        }
        self.http.get_json(&url, request).await
    }
}

/// Request body for a load job
pub(crate) fn load_job_body(
    job_id: &str,
    source_uri: &str,
    destination: &TableRef,
    config: &LoadConfiguration,
    location: Option<&str>,
) -> JsonValue {
    let mut load = json!({
        "sourceUris": [source_uri],
        "destinationTable": {
            "projectId": destination.project_id,
            "datasetId": destination.dataset_id,
            "tableId": destination.table_id,
        },
        "sourceFormat": config.source_format.as_str(),
        "skipLeadingRows": config.skip_leading_rows,
        "fieldDelimiter": config.field_delimiter,
        "allowQuotedNewlines": config.allow_quoted_newlines,
        "quote": config.quote,
        "writeDisposition": config.write_disposition.as_str(),
    });

    if config.autodetect {
        load["autodetect"] = json!(true);
    }
    if let Some(schema) = &config.schema {
        load["schema"] = json!({ "fields": schema });
    }

    let mut job_reference = json!({
        "projectId": destination.project_id,
        "jobId": job_id,
    });
    if let Some(location) = location {
        job_reference["location"] = json!(location);
    }

    json!({
        "jobReference": job_reference,
        "configuration": { "load": load },
    })
}

/// Client-generated job id
fn new_job_id() -> String {
    format!("bq_ingest_{}", uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn load_table_from_uri(
        &self,
        source_uri: &str,
        destination: &TableRef,
        config: &LoadConfiguration,
    ) -> Result<LoadJob> {
        let job_id = new_job_id();
        let body = load_job_body(
            &job_id,
            source_uri,
            destination,
            config,
            self.config.location.as_deref(),
        );
        let url = self.url(&["projects", &destination.project_id, "jobs"])?;

        let resource: JobResource = self
            .http
            .post_json(&url, RequestConfig::new().json(body).no_retry())
            .await?;

        let job = resource.job_reference.map_or_else(
            || LoadJob {
                project_id: destination.project_id.clone(),
                job_id: job_id.clone(),
                location: self.config.location.clone(),
            },
            |r| LoadJob {
                project_id: r.project_id,
                job_id: r.job_id,
                location: r.location.or_else(|| self.config.location.clone()),
            },
        );

        info!(job_id = %job.job_id, uri = source_uri, table = %destination, "Submitted load job");
        Ok(job)
    }

    async fn wait_for_job(&self, job: &LoadJob) -> Result<CompletedJob> {
        let started = Instant::now();
        let mut attempt = 0;

        loop {
            let resource = self.get_job(job).await?;
            let status = resource.status.unwrap_or_default();

            if status.state.as_deref() == Some("DONE") {
                let errors = status.errors.unwrap_or_default();

                if let Some(fatal) = status.error_result {
                    let message = if errors.is_empty() {
                        fatal.to_string()
                    } else {
                        super::render_errors(&errors)
                    };
                    return Err(Error::load_job(&job.job_id, message));
                }

                let output_rows = resource
                    .statistics
                    .and_then(|s| s.load)
                    .and_then(|l| l.output_rows)
                    .and_then(|n| n.parse().ok());

                debug!(job_id = %job.job_id, "Load job finished");
                return Ok(CompletedJob {
                    job: job.clone(),
                    errors,
                    output_rows,
                });
            }

            let mut delay = BackoffType::Exponential.delay(
                attempt,
                self.config.poll_interval,
                self.config.max_poll_interval,
            );

            if let Some(timeout) = self.config.job_timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(Error::JobTimeout {
                        job_id: job.job_id.clone(),
                        waited_secs: elapsed.as_secs(),
                    });
                }
                // Last poll lands on the deadline
                delay = delay.min(timeout - elapsed);
            }

            debug!(
                job_id = %job.job_id,
                state = status.state.as_deref().unwrap_or("UNKNOWN"),
                "Load job still running, polling again in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
            attempt = attempt.saturating_add(1);
        }
    }

    async fn get_table(&self, table: &TableRef) -> Result<TableInfo> {
        let url = self.table_url(table, None)?;
        let resource: TableResource = self.http.get_json(&url, RequestConfig::new()).await?;

        Ok(TableInfo {
            table: table.clone(),
            num_rows: resource.num_rows.and_then(|n| n.parse().ok()),
        })
    }

    async fn insert_rows_json(
        &self,
        table: &TableRef,
        rows: &[JsonValue],
    ) -> Result<Vec<RowError>> {
        let url = self.table_url(table, Some("insertAll"))?;
        let body = json!({
            "rows": rows.iter().map(|row| json!({ "json": row })).collect::<Vec<_>>(),
        });

        let response: InsertAllResponse = self
            .http
            .post_json(&url, RequestConfig::new().json(body).no_retry())
            .await?;

        Ok(response
            .insert_errors
            .unwrap_or_default()
            .into_iter()
            .map(|e| RowError {
                index: e.index,
                errors: e.errors,
            })
            .collect())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    status: Option<JobStatus>,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error_result: Option<JobError>,
    #[serde(default)]
    errors: Option<Vec<JobError>>,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    #[serde(default)]
    output_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableResource {
    #[serde(default)]
    num_rows: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Option<Vec<InsertError>>,
}

#[derive(Debug, Deserialize)]
struct InsertError {
    index: usize,
    #[serde(default)]
    errors: Vec<JobError>,
}
