//! Ingestion handler
//!
//! Turns one storage notification into one load job and one audit row:
//!
//! 1. derive the destination table from the file name
//! 2. pick the load configuration from the [`LoadPolicy`](crate::policy::LoadPolicy)
//! 3. submit the load and wait for it
//! 4. record the outcome in the audit table, whatever it was
//!
//! Job-level errors only mark the audit record as failed. Anything else
//! (transport, auth, fatal job result) is recorded and then returned.

mod handler;
mod naming;

pub use handler::{HandlerSettings, IngestionHandler, IngestionOutcome, LoadPlan};
pub use naming::{derive_table_name, destination_table_id, TABLE_PREFIX};
