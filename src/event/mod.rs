//! Trigger events
//!
//! Decodes storage notifications into [`IngestionEvent`] values.

mod payload;
mod types;

pub use payload::{decode_event, detect_kind, from_cloud_event, PayloadKind};
pub use types::{CloudEventAttributes, IngestionEvent};
