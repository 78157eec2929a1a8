// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # bq-ingest
//!
//! Loads files into BigQuery as they land in Cloud Storage, and records one
//! audit row per upload.
//!
//! ## Flow
//!
//! ```text
//!  storage trigger ──► event::decode_event ──► IngestionEvent
//!                                                   │
//!                                    ingest::IngestionHandler::handle
//!                                                   │
//!          ┌────────────────────┬──────────────────┴──────────┬─────────────────┐
//!          │ derive table name  │ policy::LoadPolicy::select  │ Warehouse load  │
//!          │ 100_{stem}         │ fixed schema | autodetect   │ + wait + count  │
//!          └────────────────────┴─────────────────────────────┴─────────────────┘
//!                                                   │
//!                                   audit::AuditLogger::log (always)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bq_ingest::{AppConfig, decode_event, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let handler = config.build_handler()?;
//!
//!     let body = serde_json::json!({
//!         "data": {"bucket": "landing", "name": "sales.csv"},
//!         "context": {"eventId": "1", "eventType": "google.storage.object.finalize"}
//!     });
//!     let outcome = handler.handle(&decode_event(&body, None)?).await?;
//!     println!("{}", outcome.record.status);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Google OAuth2 credentials and token caching
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Trigger payload decoding
pub mod event;

/// Load configuration policy
pub mod policy;

/// Warehouse trait and BigQuery client
pub mod warehouse;

/// Audit records and the audit writer
pub mod audit;

/// Source object checks
pub mod storage;

/// The ingestion handler
pub mod ingest;

/// Environment configuration
pub mod config;

/// Logging setup
pub mod logging;

/// Command-line interface and HTTP endpoint
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};

pub use audit::{audit_table_schema, AuditLogger, AuditRecord, AuditStatus, AuditWriteResult};
pub use config::AppConfig;
pub use event::{decode_event, IngestionEvent};
pub use ingest::{derive_table_name, IngestionHandler, IngestionOutcome, LoadPlan};
pub use policy::{LoadConfiguration, LoadPolicy};
pub use warehouse::{BigQueryClient, TableRef, Warehouse};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
