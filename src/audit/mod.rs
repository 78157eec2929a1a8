//! Audit trail
//!
//! Every handled event leaves exactly one row in the audit table. The write is
//! best effort: [`AuditLogger::log`] reports what happened through
//! [`AuditWriteResult`] and never fails.

mod logger;
mod types;

pub use logger::{audit_table_schema, AuditLogger, AuditWriteResult};
pub use types::{AuditRecord, AuditStatus};
