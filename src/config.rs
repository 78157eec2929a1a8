//! Service configuration
//!
//! Everything is read from the environment once, at startup. Required:
//! `PROJECT_ID`, `DATASET_ID` and `AUDIT_TABLE_ID`. The rest have defaults.

use crate::auth::{Authenticator, Credentials};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig};
use crate::ingest::{HandlerSettings, IngestionHandler};
use crate::policy::{builtin_policy, load_policy, LoadPolicy};
use crate::storage::SourceStore;
use crate::types::{LogFormat, OptionStringExt};
use crate::warehouse::{BigQueryClient, BigQueryConfig, TableRef, DEFAULT_ENDPOINT};
use regex::Regex;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::info;

// ============================================================================
// Defaults
// ============================================================================

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default first delay between job polls
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default longest delay between job polls
pub const DEFAULT_MAX_POLL_INTERVAL_MS: u64 = 10_000;

/// Default per-request timeout for BigQuery and token calls
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default retries for idempotent BigQuery calls
pub const DEFAULT_HTTP_MAX_RETRIES: u32 = 3;

/// Default client-side API request rate; 0 disables the limiter
pub const DEFAULT_API_REQUESTS_PER_SECOND: u32 = 50;

/// Longest dataset or table id BigQuery accepts, in characters
pub const MAX_ID_CHARS: usize = 1024;

type Pattern = std::result::Result<Regex, regex::Error>;

static PROJECT_ID_RE: LazyLock<Pattern> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9.:-]{4,61}[a-z0-9]$"));

static DATASET_ID_RE: LazyLock<Pattern> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$"));

static TABLE_ID_RE: LazyLock<Pattern> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{M}\p{N}\p{Pc}\p{Pd}\p{Zs}]+$"));

/// Match `value` against an id pattern; ids longer than [`MAX_ID_CHARS`] never match
fn matches_id(pattern: &Pattern, value: &str) -> Result<bool> {
    let re = pattern
        .as_ref()
        .map_err(|e| Error::config(format!("Identifier pattern does not compile: {e}")))?;
    Ok(value.chars().count() <= MAX_ID_CHARS && re.is_match(value))
}

// ============================================================================
// AppConfig
// ============================================================================

/// Runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub project_id: String,
    pub dataset_id: String,
    /// Audit table; a bare `AUDIT_TABLE_ID` lives in the load dataset
    pub audit_table: TableRef,
    pub port: u16,
    /// Operator load policy; the embedded one when unset
    pub policy_file: Option<PathBuf>,
    pub endpoint: String,
    pub location: Option<String>,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub job_timeout: Option<Duration>,
    /// HEAD the source object before loading it
    pub verify_source: bool,
    pub log_format: LogFormat,
    pub http_timeout: Duration,
    pub http_max_retries: u32,
    /// Client-side request rate limit; `None` when disabled
    pub api_requests_per_second: Option<u32>,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, treating blank values as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).none_if_empty();
        let require = |key: &str| get(key).ok_or_else(|| Error::missing_field(key));

        let project_id = require("PROJECT_ID")?;
        let dataset_id = require("DATASET_ID")?;
        let audit_table_id = require("AUDIT_TABLE_ID")?;

        let audit_table = if audit_table_id.contains('.') {
            audit_table_id
                .parse::<TableRef>()
                .map_err(|e| Error::invalid_value("AUDIT_TABLE_ID", e.to_string()))?
        } else {
            TableRef::new(&project_id, &dataset_id, audit_table_id)
        };

        let poll_interval_ms = parse_or(
            get("JOB_POLL_INTERVAL_MS"),
            "JOB_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL_MS,
        )?;
        let max_poll_interval_ms = parse_or(
            get("JOB_MAX_POLL_INTERVAL_MS"),
            "JOB_MAX_POLL_INTERVAL_MS",
            DEFAULT_MAX_POLL_INTERVAL_MS,
        )?;
        let job_timeout_secs: Option<u64> =
            parse_opt(get("JOB_TIMEOUT_SECS"), "JOB_TIMEOUT_SECS")?;
        let http_timeout_secs = parse_or(
            get("HTTP_TIMEOUT_SECS"),
            "HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        let requests_per_second = parse_or(
            get("API_REQUESTS_PER_SECOND"),
            "API_REQUESTS_PER_SECOND",
            DEFAULT_API_REQUESTS_PER_SECOND,
        )?;

        let config = Self {
            project_id,
            dataset_id,
            audit_table,
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            policy_file: get("LOAD_POLICY_FILE").map(PathBuf::from),
            endpoint: get("BIGQUERY_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            location: get("BIGQUERY_LOCATION"),
            poll_interval: Duration::from_millis(poll_interval_ms),
            max_poll_interval: Duration::from_millis(max_poll_interval_ms),
            job_timeout: job_timeout_secs.map(Duration::from_secs),
            verify_source: parse_bool(get("VERIFY_SOURCE"), "VERIFY_SOURCE")?,
            log_format: parse_or(get("LOG_FORMAT"), "LOG_FORMAT", LogFormat::Text)?,
            http_timeout: Duration::from_secs(http_timeout_secs),
            http_max_retries: parse_or(
                get("HTTP_MAX_RETRIES"),
                "HTTP_MAX_RETRIES",
                DEFAULT_HTTP_MAX_RETRIES,
            )?,
            api_requests_per_second: Some(requests_per_second).filter(|n| *n > 0),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check identifiers and intervals
    pub fn validate(&self) -> Result<()> {
        if !matches_id(&PROJECT_ID_RE, &self.project_id)? {
            return Err(Error::invalid_value(
                "PROJECT_ID",
                format!("'{}' is not a valid project id", self.project_id),
            ));
        }
        for (field, dataset) in [
            ("DATASET_ID", &self.dataset_id),
            ("AUDIT_TABLE_ID", &self.audit_table.dataset_id),
        ] {
            if !matches_id(&DATASET_ID_RE, dataset)? {
                return Err(Error::invalid_value(
                    field,
                    format!("'{dataset}' is not a valid dataset id"),
                ));
            }
        }
        if !matches_id(&TABLE_ID_RE, &self.audit_table.table_id)? {
            return Err(Error::invalid_value(
                "AUDIT_TABLE_ID",
                format!("'{}' is not a valid table id", self.audit_table.table_id),
            ));
        }
        if self.http_timeout.is_zero() {
            return Err(Error::invalid_value("HTTP_TIMEOUT_SECS", "must be positive"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_value("JOB_POLL_INTERVAL_MS", "must be positive"));
        }
        if self.max_poll_interval < self.poll_interval {
            return Err(Error::invalid_value(
                "JOB_MAX_POLL_INTERVAL_MS",
                "must not be below JOB_POLL_INTERVAL_MS",
            ));
        }
        Ok(())
    }

    /// Settings the handler needs
    pub fn handler_settings(&self) -> HandlerSettings {
        HandlerSettings {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
            audit_table: self.audit_table.clone(),
        }
    }

    /// BigQuery client settings
    pub fn bigquery_config(&self) -> BigQueryConfig {
        BigQueryConfig {
            endpoint: self.endpoint.clone(),
            location: self.location.clone(),
            poll_interval: self.poll_interval,
            max_poll_interval: self.max_poll_interval,
            job_timeout: self.job_timeout,
        }
    }

    /// Transport settings for BigQuery calls
    pub fn http_config(&self) -> HttpClientConfig {
        let builder = HttpClientConfig::builder()
            .timeout(self.http_timeout)
            .max_retries(self.http_max_retries);
        let builder = match self.api_requests_per_second {
            Some(n) => builder.rate_limit(RateLimiterConfig::per_second(n)),
            None => builder.no_rate_limit(),
        };
        builder.build()
    }

    /// The operator policy file, or the embedded policy
    pub fn load_policy(&self) -> Result<LoadPolicy> {
        match &self.policy_file {
            Some(path) => {
                let policy = load_policy(path)
                    .with_context(|| format!("LOAD_POLICY_FILE {}", path.display()))?;
                info!(path = %path.display(), overrides = policy.overrides.len(), "Loaded load policy");
                Ok(policy)
            }
            None => builtin_policy(),
        }
    }

    /// Build the long-lived handler: credentials, HTTP client, BigQuery client
    pub fn build_handler(&self) -> Result<IngestionHandler> {
        let credentials = Credentials::from_env()?;
        info!(credentials = credentials.kind(), "Resolved Google credentials");

        let authenticator = Arc::new(Authenticator::with_timeout(credentials, self.http_timeout)?);
        let http = HttpClient::with_auth(self.http_config(), authenticator)?;
        let warehouse = Arc::new(BigQueryClient::new(http, self.bigquery_config()));

        let handler = IngestionHandler::new(warehouse, self.load_policy()?, self.handler_settings());
        Ok(if self.verify_source {
            handler.with_source_store(SourceStore::gcs())
        } else {
            handler
        })
    }
}

// ============================================================================
// Value parsing
// ============================================================================

fn parse_opt<T>(value: Option<String>, field: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| Error::invalid_value(field, format!("'{v}': {e}")))
        })
        .transpose()
}

fn parse_or<T>(value: Option<String>, field: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(value, field)?.unwrap_or(default))
}

fn parse_bool(value: Option<String>, field: &str) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::invalid_value(field, format!("'{v}' is not a boolean"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("PROJECT_ID", "acme-data"),
        ("DATASET_ID", "raw_landing"),
        ("AUDIT_TABLE_ID", "ingest_audit"),
    ];

    #[test]
    fn test_defaults() {
        let config = config_from(&REQUIRED).unwrap();

        assert_eq!(config.audit_table, TableRef::new("acme-data", "raw_landing", "ingest_audit"));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_poll_interval, Duration::from_secs(10));
        assert_eq!(config.job_timeout, None);
        assert_eq!(config.policy_file, None);
        assert!(!config.verify_source);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_missing_required() {
        let err = config_from(&REQUIRED[..2]).unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "AUDIT_TABLE_ID"));

        let mut vars = REQUIRED.to_vec();
        vars[0] = ("PROJECT_ID", "  ");
        let err = config_from(&vars).unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "PROJECT_ID"));
    }

    #[test]
    fn test_optional_values() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PORT", "9000"),
            ("BIGQUERY_LOCATION", "EU"),
            ("JOB_POLL_INTERVAL_MS", "250"),
            ("JOB_MAX_POLL_INTERVAL_MS", "2000"),
            ("JOB_TIMEOUT_SECS", "600"),
            ("VERIFY_SOURCE", "true"),
            ("LOG_FORMAT", "json"),
            ("LOAD_POLICY_FILE", "/etc/bq-ingest/policy.yaml"),
        ]);
        let config = config_from(&vars).unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.location.as_deref(), Some("EU"));
        assert_eq!(config.job_timeout, Some(Duration::from_secs(600)));
        assert!(config.verify_source);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.policy_file,
            Some(PathBuf::from("/etc/bq-ingest/policy.yaml"))
        );

        let bq = config.bigquery_config();
        assert_eq!(bq.poll_interval, Duration::from_millis(250));
        assert_eq!(bq.max_poll_interval, Duration::from_secs(2));
    }

    #[test]
    fn test_http_settings() {
        let config = config_from(&REQUIRED).unwrap();
        let http = config.http_config();
        assert_eq!(http.timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
        assert_eq!(http.max_retries, DEFAULT_HTTP_MAX_RETRIES);
        assert_eq!(http.rate_limit, Some(RateLimiterConfig::per_second(50)));

        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("HTTP_TIMEOUT_SECS", "5"),
            ("HTTP_MAX_RETRIES", "0"),
            ("API_REQUESTS_PER_SECOND", "0"),
        ]);
        let http = config_from(&vars).unwrap().http_config();
        assert_eq!(http.timeout, Duration::from_secs(5));
        assert_eq!(http.max_retries, 0);
        assert_eq!(http.rate_limit, None);
    }

    #[test]
    fn test_qualified_audit_table() {
        let mut vars = REQUIRED.to_vec();
        vars[2] = ("AUDIT_TABLE_ID", "ops-project.audit.ingest_events");
        let config = config_from(&vars).unwrap();

        assert_eq!(
            config.audit_table,
            TableRef::new("ops-project", "audit", "ingest_events")
        );
        assert_eq!(config.handler_settings().dataset_id, "raw_landing");
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("PORT", "eighty"),
            ("JOB_TIMEOUT_SECS", "-1"),
            ("VERIFY_SOURCE", "maybe"),
            ("LOG_FORMAT", "xml"),
            ("JOB_POLL_INTERVAL_MS", "0"),
            ("DATASET_ID", "raw-landing"),
            ("PROJECT_ID", "Acme"),
            ("HTTP_TIMEOUT_SECS", "0"),
            ("HTTP_MAX_RETRIES", "many"),
        ];

        for (key, value) in cases {
            let mut vars = REQUIRED.to_vec();
            vars.retain(|(k, _)| *k != key);
            vars.push((key, value));

            let err = config_from(&vars).unwrap_err();
            assert!(
                matches!(err, Error::InvalidConfigValue { ref field, .. } if field == key),
                "{key}={value} gave {err}"
            );
        }
    }

    #[test]
    fn test_id_patterns_compile() {
        for pattern in [&*PROJECT_ID_RE, &*DATASET_ID_RE, &*TABLE_ID_RE] {
            assert!(pattern.is_ok(), "{pattern:?}");
        }
    }

    #[test]
    fn test_audit_table_id_length_and_charset() {
        fn table(id: &str) -> Result<AppConfig> {
            let mut vars: Vec<(&str, &str)> = REQUIRED[..2].to_vec();
            vars.push(("AUDIT_TABLE_ID", id));
            config_from(&vars)
        }

        assert!(table("Ingest Audit-2024").is_ok());
        assert!(table("données_chargées").is_ok());
        assert!(table(&"t".repeat(MAX_ID_CHARS)).is_ok());

        let err = table(&"t".repeat(MAX_ID_CHARS + 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "AUDIT_TABLE_ID"));
        assert!(table("audit#1").is_err());
    }

    #[test]
    fn test_max_poll_below_initial() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("JOB_POLL_INTERVAL_MS", "5000"));
        vars.push(("JOB_MAX_POLL_INTERVAL_MS", "100"));

        assert!(config_from(&vars).is_err());
    }

    #[test]
    fn test_policy_defaults_to_builtin() {
        let config = config_from(&REQUIRED).unwrap();
        let policy = config.load_policy().unwrap();
        assert!(policy.has_override("vehicle_line_mapping"));
    }
}
