//! Audit record types

use crate::event::IngestionEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome recorded for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditStatus {
    Pending,
    Success,
    Failure,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "Pending",
            AuditStatus::Success => "Success",
            AuditStatus::Failure => "Failure",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the audit table
///
/// Field names are the audit table's column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: String,
    pub timestamp: String,
    pub event_type: String,
    pub resource_name: String,
    pub bucket_name: String,
    pub file_name: String,
    pub status: AuditStatus,
    pub error_message: Option<String>,
}

impl AuditRecord {
    /// A pending record for an event that is about to be handled
    pub fn pending(event: &IngestionEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            timestamp: event.timestamp.clone(),
            event_type: event.event_type.clone(),
            resource_name: event.resource_name.clone(),
            bucket_name: event.bucket.clone(),
            file_name: event.file_name.clone(),
            status: AuditStatus::Pending,
            error_message: None,
        }
    }

    pub fn mark_success(&mut self) {
        self.status = AuditStatus::Success;
        self.error_message = None;
    }

    pub fn mark_failure(&mut self, message: impl Into<String>) {
        self.status = AuditStatus::Failure;
        self.error_message = Some(message.into());
    }

    pub fn is_success(&self) -> bool {
        self.status == AuditStatus::Success
    }
}
