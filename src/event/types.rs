//! Ingestion event types

use serde::{Deserialize, Serialize};

/// A newly arrived object, as delivered by the storage trigger
///
/// Immutable once decoded; each event is handled once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionEvent {
    /// Bucket holding the object
    pub bucket: String,
    /// Object name within the bucket
    pub file_name: String,
    /// Trigger-assigned event id
    pub event_id: String,
    /// Event time as sent by the trigger (RFC 3339)
    pub timestamp: String,
    /// Trigger event type, e.g. `google.storage.object.finalize`
    pub event_type: String,
    /// Full resource name of the object (empty when the trigger omits it)
    #[serde(default)]
    pub resource_name: String,
}

impl IngestionEvent {
    /// Object URI of the source file
    pub fn source_uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.file_name)
    }
}

/// CloudEvents context attributes carried in `ce-*` headers (binary mode)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudEventAttributes {
    /// `ce-id`
    pub id: Option<String>,
    /// `ce-time`
    pub time: Option<String>,
    /// `ce-type`
    pub event_type: Option<String>,
    /// `ce-source`, e.g. `//storage.googleapis.com/projects/_/buckets/b`
    pub source: Option<String>,
    /// `ce-subject`, e.g. `objects/file.csv`
    pub subject: Option<String>,
}

impl CloudEventAttributes {
    /// True when no `ce-*` attribute was present
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.time.is_none()
            && self.event_type.is_none()
            && self.source.is_none()
            && self.subject.is_none()
    }
}
