//! Best-effort audit writer

use super::types::AuditRecord;
use crate::policy::{FieldType, SchemaField};
use crate::warehouse::{RowError, TableRef, Warehouse};
use std::sync::Arc;
use tracing::{debug, error};

/// What became of an audit write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditWriteResult {
    /// The row was accepted
    Written,
    /// The warehouse answered with row-level rejections
    Rejected(Vec<RowError>),
    /// The insert request itself failed
    Failed(String),
}

impl AuditWriteResult {
    pub fn is_written(&self) -> bool {
        matches!(self, AuditWriteResult::Written)
    }
}

/// Writes audit records to a fixed table
#[derive(Clone)]
pub struct AuditLogger {
    warehouse: Arc<dyn Warehouse>,
    table: TableRef,
}

impl AuditLogger {
    pub fn new(warehouse: Arc<dyn Warehouse>, table: TableRef) -> Self {
        Self { warehouse, table }
    }

    /// Audit table
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Insert one record. Problems are logged, never returned.
    pub async fn log(&self, record: &AuditRecord) -> AuditWriteResult {
        let row = match serde_json::to_value(record) {
            Ok(row) => row,
            Err(e) => {
                error!(event_id = %record.event_id, "Failed to serialize audit record: {}", e);
                return AuditWriteResult::Failed(e.to_string());
            }
        };

        match self.warehouse.insert_rows_json(&self.table, &[row]).await {
            Ok(errors) if errors.is_empty() => {
                debug!(
                    event_id = %record.event_id,
                    status = %record.status,
                    table = %self.table,
                    "Audit record written"
                );
                AuditWriteResult::Written
            }
            Ok(errors) => {
                for e in &errors {
                    error!(event_id = %record.event_id, table = %self.table, "Audit row rejected: {}", e);
                }
                AuditWriteResult::Rejected(errors)
            }
            Err(e) => {
                error!(event_id = %record.event_id, table = %self.table, "Audit insert failed: {}", e);
                AuditWriteResult::Failed(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

/// Column layout of the audit table
pub fn audit_table_schema() -> Vec<SchemaField> {
    vec![
        SchemaField::string("event_id").required(),
        SchemaField::new("timestamp", FieldType::Timestamp),
        SchemaField::string("event_type"),
        SchemaField::string("resource_name"),
        SchemaField::string("bucket_name").required(),
        SchemaField::string("file_name").required(),
        SchemaField::string("status").required(),
        SchemaField::string("error_message"),
    ]
}
