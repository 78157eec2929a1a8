//! Warehouse handle and result types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fully qualified table identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    /// Create a table reference
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

impl FromStr for TableRef {
    type Err = Error;

    /// Parse `project.dataset.table`; the table part may itself contain dots
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(d), Some(t)) if !p.is_empty() && !d.is_empty() && !t.is_empty() => {
                Ok(Self::new(p, d, t))
            }
            _ => Err(Error::invalid_value(
                "table",
                format!("expected 'project.dataset.table', got '{s}'"),
            )),
        }
    }
}

/// Handle to a submitted load job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadJob {
    pub project_id: String,
    pub job_id: String,
    /// Region the job runs in, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// One problem reported by the warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl JobError {
    /// Error with only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            reason: None,
            location: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reason, &self.location) {
            (Some(reason), Some(location)) => {
                write!(f, "{reason} at {location}: {}", self.message)
            }
            (Some(reason), None) => write!(f, "{reason}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Render a list of job errors on one line
pub fn render_errors(errors: &[JobError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A load job that reached its terminal state without a fatal error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    pub job: LoadJob,
    /// Non-fatal problems the job reported; empty on a clean load
    pub errors: Vec<JobError>,
    /// Rows written, when the warehouse reports it
    pub output_rows: Option<u64>,
}

impl CompletedJob {
    /// True when the job reported no errors at all
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Table metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub table: TableRef,
    pub num_rows: Option<u64>,
}

/// Rejection of one row in a streaming insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Position of the row in the request
    pub index: usize,
    pub errors: Vec<JobError>,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.index, render_errors(&self.errors))
    }
}
