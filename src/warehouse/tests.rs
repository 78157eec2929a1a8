//! Tests for the BigQuery client

use super::bigquery::load_job_body;
use super::*;
use crate::error::Error;
use crate::http::{HttpClient, HttpClientConfig};
use crate::policy::builtin_policy;
use crate::types::BackoffType;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, config: BigQueryConfig) -> BigQueryClient {
    let http = HttpClient::with_config(
        HttpClientConfig::builder()
            .backoff(
                BackoffType::Constant,
                Duration::from_millis(5),
                Duration::from_millis(5),
            )
            .no_rate_limit()
            .build(),
    )
    .unwrap();

    BigQueryClient::new(
        http,
        BigQueryConfig {
            endpoint: format!("{}/bigquery/v2", server.uri()),
            poll_interval: Duration::from_millis(5),
            max_poll_interval: Duration::from_millis(20),
            ..config
        },
    )
}

fn destination() -> TableRef {
    TableRef::new("proj", "raw", "100_sales")
}

fn job() -> LoadJob {
    LoadJob {
        project_id: "proj".to_string(),
        job_id: "job_1".to_string(),
        location: Some("EU".to_string()),
    }
}

#[test]
fn test_table_ref_display_and_parse() {
    let table = destination();
    assert_eq!(table.to_string(), "proj.raw.100_sales");
    assert_eq!("proj.raw.100_sales".parse::<TableRef>().unwrap(), table);

    assert!("proj.raw".parse::<TableRef>().is_err());
    assert!("proj..t".parse::<TableRef>().is_err());
}

#[test]
fn test_job_error_display() {
    let err = JobError {
        reason: Some("invalid".to_string()),
        location: Some("gs://b/f.csv".to_string()),
        message: "bad row 3".to_string(),
    };
    assert_eq!(err.to_string(), "invalid at gs://b/f.csv: bad row 3");
    assert_eq!(JobError::message("plain").to_string(), "plain");

    let rendered = render_errors(&[JobError::message("a"), JobError::message("b")]);
    assert_eq!(rendered, "a; b");
}

#[test]
fn test_load_job_body_autodetect() {
    let config = builtin_policy().unwrap().select("sales");
    let body = load_job_body("job_1", "gs://landing/sales.csv", &destination(), &config, None);

    assert_eq!(
        body,
        json!({
            "jobReference": {"projectId": "proj", "jobId": "job_1"},
            "configuration": {
                "load": {
                    "sourceUris": ["gs://landing/sales.csv"],
                    "destinationTable": {
                        "projectId": "proj",
                        "datasetId": "raw",
                        "tableId": "100_sales"
                    },
                    "sourceFormat": "CSV",
                    "skipLeadingRows": 1,
                    "fieldDelimiter": ",",
                    "allowQuotedNewlines": true,
                    "quote": "\"",
                    "writeDisposition": "WRITE_TRUNCATE",
                    "autodetect": true
                }
            }
        })
    );
}

#[test]
fn test_load_job_body_fixed_schema() {
    let config = builtin_policy().unwrap().select("vehicle_line_mapping");
    let table = TableRef::new("proj", "raw", "100_vehicle_line_mapping");
    let body = load_job_body("job_2", "gs://b/vehicle_line_mapping.csv", &table, &config, Some("EU"));

    let load = &body["configuration"]["load"];
    assert!(load.get("autodetect").is_none());
    assert_eq!(
        load["schema"],
        json!({"fields": [
            {"name": "nameplate_code", "type": "STRING"},
            {"name": "brand", "type": "STRING"},
            {"name": "platform", "type": "STRING"},
            {"name": "nameplate_display", "type": "STRING"}
        ]})
    );
    assert_eq!(body["jobReference"]["location"], "EU");
}

#[tokio::test]
async fn test_submit_load_job() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/proj/jobs"))
        .and(body_partial_json(json!({
            "configuration": {"load": {"sourceUris": ["gs://landing/sales.csv"]}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobReference": {"projectId": "proj", "jobId": "server_job", "location": "US"},
            "status": {"state": "RUNNING"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, BigQueryConfig::default());
    let config = builtin_policy().unwrap().select("sales");

    let job = client
        .load_table_from_uri("gs://landing/sales.csv", &destination(), &config)
        .await
        .unwrap();

    assert_eq!(job.job_id, "server_job");
    assert_eq!(job.location.as_deref(), Some("US"));
}

#[tokio::test]
async fn test_submit_load_job_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/proj/jobs"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": 503, "message": "Service unavailable"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, BigQueryConfig::default());
    let config = builtin_policy().unwrap().select("sales");

    let err = client
        .load_table_from_uri("gs://landing/sales.csv", &destination(), &config)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Service unavailable"));
}

#[tokio::test]
async fn test_wait_polls_until_done() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/job_1"))
        .and(query_param("location", "EU"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"state": "RUNNING"}
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/job_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"state": "DONE"},
            "statistics": {"load": {"outputRows": "120"}}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, BigQueryConfig::default());
    let completed = client.wait_for_job(&job()).await.unwrap();

    assert!(completed.is_clean());
    assert_eq!(completed.output_rows, Some(120));
    assert_eq!(completed.job, job());
}

#[tokio::test]
async fn test_wait_returns_non_fatal_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/job_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {
                "state": "DONE",
                "errors": [{"reason": "invalid", "message": "bad row 3"}]
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, BigQueryConfig::default());
    let completed = client.wait_for_job(&job()).await.unwrap();

    assert!(!completed.is_clean());
    assert_eq!(completed.errors[0].message, "bad row 3");
}

#[tokio::test]
async fn test_wait_fails_on_error_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/job_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {
                "state": "DONE",
                "errorResult": {"reason": "notFound", "message": "Not found: URI gs://landing/gone.csv"}
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, BigQueryConfig::default());
    let err = client.wait_for_job(&job()).await.unwrap_err();

    match err {
        Error::LoadJob { job_id, message } => {
            assert_eq!(job_id, "job_1");
            assert_eq!(message, "notFound: Not found: URI gs://landing/gone.csv");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_wait_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/bigquery/v2/projects/proj/jobs/.*$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"state": "PENDING"}
        })))
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        BigQueryConfig {
            job_timeout: Some(Duration::from_millis(30)),
            ..BigQueryConfig::default()
        },
    );
    let err = client.wait_for_job(&job()).await.unwrap_err();

    assert!(matches!(err, Error::JobTimeout { .. }));
}

#[tokio::test]
async fn test_wait_does_not_sleep_past_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/jobs/job_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"state": "RUNNING"}
        })))
        .mount(&server)
        .await;

    let http = HttpClient::with_config(HttpClientConfig::builder().no_rate_limit().build()).unwrap();
    let client = BigQueryClient::new(
        http,
        BigQueryConfig {
            endpoint: format!("{}/bigquery/v2", server.uri()),
            poll_interval: Duration::from_secs(30),
            max_poll_interval: Duration::from_secs(30),
            job_timeout: Some(Duration::from_millis(100)),
            ..BigQueryConfig::default()
        },
    );

    let err = tokio::time::timeout(Duration::from_secs(5), client.wait_for_job(&job()))
        .await
        .expect("wait overran the job timeout")
        .unwrap_err();

    assert!(matches!(err, Error::JobTimeout { ref job_id, .. } if job_id == "job_1"));
}

#[tokio::test]
async fn test_get_table_row_count() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/datasets/raw/tables/100_sales"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tableReference": {"projectId": "proj", "datasetId": "raw", "tableId": "100_sales"},
            "numRows": "4521"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, BigQueryConfig::default());
    let info = client.get_table(&destination()).await.unwrap();

    assert_eq!(info.num_rows, Some(4521));
}

#[tokio::test]
async fn test_table_ids_are_path_escaped() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bigquery/v2/projects/proj/datasets/raw/tables/100_Q1%23draft"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, BigQueryConfig::default());
    let info = client
        .get_table(&TableRef::new("proj", "raw", "100_Q1#draft"))
        .await
        .unwrap();

    assert_eq!(info.num_rows, None);
}

#[tokio::test]
async fn test_insert_rows() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/bigquery/v2/projects/proj/datasets/raw/tables/ingest_audit/insertAll"))
        .and(body_partial_json(json!({
            "rows": [{"json": {"event_id": "1", "status": "Success"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "bigquery#tableDataInsertAllResponse"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, BigQueryConfig::default());
    let errors = client
        .insert_rows_json(
            &TableRef::new("proj", "raw", "ingest_audit"),
            &[json!({"event_id": "1", "status": "Success"})],
        )
        .await
        .unwrap();

    assert!(errors.is_empty());
}

#[tokio::test]
async fn test_insert_rows_reports_row_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "insertErrors": [{
                "index": 0,
                "errors": [{"reason": "invalid", "location": "status", "message": "no such field"}]
            }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, BigQueryConfig::default());
    let errors = client
        .insert_rows_json(
            &TableRef::new("proj", "raw", "ingest_audit"),
            &[json!({"event_id": "1"})],
        )
        .await
        .unwrap();

    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].to_string(),
        "row 0: invalid at status: no such field"
    );
}
